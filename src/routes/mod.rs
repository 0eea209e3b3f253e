pub mod announcements;
pub mod attendance;
pub mod audit_log;
pub mod auth;
pub mod dashboard;
pub mod extract;
pub mod forms;
pub mod grades;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod progression;
pub mod schools;
pub mod students;
pub mod subscription;
pub mod tenants;
pub mod users;
pub mod websocket;

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

const MAX_PAGE_LIMIT: i64 = 200;

/// `?limit=` on list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn resolve(&self, state: &AppState) -> i64 {
        self.limit
            .unwrap_or(state.config.default_page_limit)
            .clamp(1, MAX_PAGE_LIMIT)
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.app_base_url);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Auth
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/{id}", put(users::update_user).delete(users::deactivate_user))
        // Schools and classrooms
        .route("/schools", get(schools::list_schools).post(schools::create_school))
        .route("/classrooms", get(schools::list_classrooms).post(schools::create_classroom))
        .route("/classrooms/{id}/enrollments", post(schools::enroll_student))
        // Students
        .route("/students", get(students::list_students).post(students::create_student))
        .route("/students/{id}", get(students::get_student))
        .route("/students/{id}/parents", get(students::list_parents).post(students::link_parent))
        .route("/students/{id}/attendance", get(attendance::student_attendance))
        .route("/students/{id}/grades", get(grades::student_grades))
        .route("/students/{id}/progression", get(progression::student_progression))
        // Announcements
        .route("/announcements", get(announcements::list_announcements).post(announcements::create_announcement))
        .route(
            "/announcements/{id}",
            get(announcements::get_announcement)
                .put(announcements::update_announcement)
                .delete(announcements::delete_announcement),
        )
        // Attendance
        .route("/attendance", get(attendance::list_attendance).post(attendance::record_attendance))
        .route("/attendance/{id}", put(attendance::update_attendance))
        // Messaging
        .route("/conversations", get(messages::list_conversations).post(messages::create_conversation))
        .route("/conversations/{id}/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/{id}/read", post(messages::mark_read))
        // Grades
        .route("/grade-categories", post(grades::create_category))
        .route("/assignments", get(grades::list_assignments).post(grades::create_assignment))
        .route("/assignments/{id}/scores/{student_id}", put(grades::record_score))
        // Forms
        .route("/forms", get(forms::list_forms).post(forms::create_form))
        .route("/forms/{id}", get(forms::get_form).put(forms::process_form))
        // Progression
        .route("/progression", post(progression::create_snapshot))
        // Billing, audit, dashboard
        .route("/subscription", get(subscription::get_subscription).put(subscription::upsert_subscription))
        .route("/audit-log", get(audit_log::list_audit_log))
        .route("/dashboard/stats", get(dashboard::stats))
        // Platform operator
        .route("/platform/tenants", post(tenants::create_tenant))
        // WebSocket
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Allows the app base URL, its subdomains (one per tenant) and localhost.
fn cors_layer(base_url: &str) -> CorsLayer {
    let base = base_url.trim_end_matches('/').to_string();
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        origin_allowed(&base, o)
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("x-tenant"),
            HeaderName::from_static("x-platform-key"),
        ]))
        .allow_origin(origin)
}

fn origin_allowed(base: &str, origin: &str) -> bool {
    if origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1") {
        return true;
    }
    if origin == base {
        return true;
    }
    let Some((scheme, rest)) = base.split_once("://") else {
        return false;
    };
    let domain = rest.split('/').next().unwrap_or(rest);
    origin
        .strip_prefix(scheme)
        .and_then(|o| o.strip_prefix("://"))
        .is_some_and(|host| host.ends_with(&format!(".{domain}")))
}
