#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use schoolhub_api::{
    config::Config,
    db::{MemoryStorage, Storage},
    models::{
        tenant::{CreateTenantRequest, Tenant},
        user::{RegisterRequest, Role, User},
    },
    routes, AppState,
};

pub const PASSWORD: &str = "correct-horse";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        redis_url: None,
        jwt_secret: "integration-test-secret".into(),
        session_ttl_seconds: 3600,
        // Below the production floor to keep the suite fast.
        bcrypt_cost: 4,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost:5173".into(),
        platform_key: Some("platform-test-key".into()),
        default_page_limit: 50,
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

/// A seeded user with a ready session token.
pub struct Account {
    pub user: User,
    pub token: String,
    pub tenant: String,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::new(Arc::new(MemoryStorage::new()), test_config());
        let router = routes::router(state.clone());
        Self { state, router }
    }

    pub fn store(&self) -> &dyn Storage {
        self.state.storage.as_ref()
    }

    pub async fn tenant(&self, subdomain: &str) -> Tenant {
        self.store()
            .create_tenant(&CreateTenantRequest {
                name: format!("{subdomain} school"),
                subdomain: subdomain.to_string(),
                contact_email: format!("office@{subdomain}.example"),
                phone: None,
                address: None,
            })
            .await
            .unwrap()
    }

    pub async fn account(&self, tenant: &Tenant, email: &str, role: Role) -> Account {
        let req = RegisterRequest {
            email: email.to_string(),
            password: PASSWORD.to_string(),
            first_name: "Sam".to_string(),
            last_name: email.split('@').next().unwrap().to_string(),
            role: Some(role),
            phone: None,
            address: None,
        };
        let user = self.state.auth.register(self.store(), tenant, &req, role).await.unwrap();
        let token = self.state.auth.issue_session(user.id, tenant.id, role).unwrap();
        Account {
            user,
            token,
            tenant: tenant.subdomain.clone(),
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        tenant: Option<&str>,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = tenant {
            req = req.header("X-Tenant", t);
        }
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&b).unwrap()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Request as `who`, in their own tenant.
    pub async fn as_user(&self, who: &Account, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call(method, uri, Some(&who.tenant), Some(&who.token), body).await
    }
}

/// One tenant with an admin, a teacher, a parent linked to one student, and
/// that student enrolled in a classroom.
pub struct School {
    pub admin: Account,
    pub teacher: Account,
    pub parent: Account,
    pub student_id: String,
    pub classroom_id: String,
}

pub async fn seed_school(app: &TestApp, subdomain: &str) -> School {
    let tenant = app.tenant(subdomain).await;
    let admin = app.account(&tenant, &format!("admin@{subdomain}.example"), Role::Admin).await;
    let teacher = app.account(&tenant, &format!("teacher@{subdomain}.example"), Role::Teacher).await;
    let parent = app.account(&tenant, &format!("parent@{subdomain}.example"), Role::Parent).await;

    let (status, school) = app
        .as_user(&admin, Method::POST, "/schools", Some(json!({ "name": "Main campus" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, classroom) = app
        .as_user(
            &admin,
            Method::POST,
            "/classrooms",
            Some(json!({
                "schoolId": school["id"],
                "teacherId": teacher.user.id,
                "name": "3B",
                "grade": "3",
                "academicYear": "2024-2025",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, student) = app
        .as_user(
            &admin,
            Method::POST,
            "/students",
            Some(json!({
                "studentNumber": "S-001",
                "firstName": "Mia",
                "lastName": "Lopez",
                "dateOfBirth": "2016-04-02",
                "grade": "3",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let student_id = student["id"].as_str().unwrap().to_string();
    let classroom_id = classroom["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .as_user(
            &admin,
            Method::POST,
            &format!("/classrooms/{classroom_id}/enrollments"),
            Some(json!({ "studentId": student_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .as_user(
            &admin,
            Method::POST,
            &format!("/students/{student_id}/parents"),
            Some(json!({ "parentId": parent.user.id, "relationship": "mother", "isPrimary": true })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    School {
        admin,
        teacher,
        parent,
        student_id,
        classroom_id,
    }
}
