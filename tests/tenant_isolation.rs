mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{seed_school, TestApp, PASSWORD};
use schoolhub_api::models::user::Role;

#[tokio::test]
async fn admin_lists_only_own_tenant_users() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let b = app.tenant("school-b").await;
    let admin_a = app.account(&a, "admin@a.example", Role::Admin).await;
    app.account(&b, "admin@b.example", Role::Admin).await;
    app.account(&b, "teacher@b.example", Role::Teacher).await;
    app.account(&b, "parent@b.example", Role::Parent).await;

    let (status, body) = app.as_user(&admin_a, Method::GET, "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["email"], "admin@a.example");
    assert!(users[0].get("passwordHash").is_none());
}

#[tokio::test]
async fn session_for_another_tenant_is_forbidden() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    app.tenant("school-b").await;
    let admin_a = app.account(&a, "admin@a.example", Role::Admin).await;

    let (status, body) = app
        .call(Method::GET, "/users", Some("school-b"), Some(&admin_a.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");
}

#[tokio::test]
async fn rows_of_another_tenant_are_not_found() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let b = app.tenant("school-b").await;
    let admin_a = app.account(&a, "admin@a.example", Role::Admin).await;
    let admin_b = app.account(&b, "admin@b.example", Role::Admin).await;

    let (status, created) = app
        .as_user(
            &admin_b,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "B only", "content": "secret", "category": "general" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let uri = format!("/announcements/{id}");
    let (status, _) = app.as_user(&admin_a, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .as_user(&admin_a, Method::PUT, &uri, Some(json!({ "title": "hijacked" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.as_user(&admin_a, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let user_uri = format!("/users/{}", admin_b.user.id);
    let (status, _) = app
        .as_user(&admin_a, Method::PUT, &user_uri, Some(json!({ "firstName": "Mallory" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Still intact for its owner.
    let (status, body) = app.as_user(&admin_b, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "B only");
}

#[tokio::test]
async fn every_school_record_is_invisible_to_other_tenants() {
    let app = TestApp::new();
    let a = seed_school(&app, "school-a").await;
    let b = seed_school(&app, "school-b").await;

    let (status, form) = app
        .as_user(
            &b.parent,
            Method::POST,
            "/forms",
            Some(json!({
                "studentId": b.student_id,
                "formType": "sick_leave",
                "title": "Flu",
                "reason": "Staying home",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let form_uri = format!("/forms/{}", form["id"].as_str().unwrap());

    let (status, record) = app
        .as_user(
            &b.teacher,
            Method::POST,
            "/attendance",
            Some(json!({ "studentId": b.student_id, "classroomId": b.classroom_id, "status": "present" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, conversation) = app
        .as_user(
            &b.teacher,
            Method::POST,
            "/conversations",
            Some(json!({ "participantIds": [b.parent.user.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let messages_uri = format!("/conversations/{}/messages", conversation["id"].as_str().unwrap());
    let (status, message) = app
        .as_user(&b.teacher, Method::POST, &messages_uri, Some(json!({ "content": "See you Monday" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, category) = app
        .as_user(
            &b.teacher,
            Method::POST,
            "/grade-categories",
            Some(json!({ "classroomId": b.classroom_id, "name": "Tests", "weight": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, assignment) = app
        .as_user(
            &b.teacher,
            Method::POST,
            "/assignments",
            Some(json!({
                "classroomId": b.classroom_id,
                "categoryId": category["id"],
                "title": "Spelling",
                "maxPoints": 20,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let student = &b.student_id;
    let attempts = [
        (Method::GET, form_uri.clone(), None),
        (Method::PUT, form_uri.clone(), Some(json!({ "status": "approved" }))),
        (
            Method::PUT,
            format!("/attendance/{}", record["id"].as_str().unwrap()),
            Some(json!({ "status": "absent" })),
        ),
        (
            Method::POST,
            "/attendance".to_string(),
            Some(json!({ "studentId": student, "classroomId": b.classroom_id, "status": "absent" })),
        ),
        (Method::GET, format!("/students/{student}"), None),
        (Method::GET, format!("/students/{student}/attendance"), None),
        (Method::GET, format!("/students/{student}/grades"), None),
        (Method::GET, format!("/students/{student}/progression"), None),
        (Method::GET, format!("/students/{student}/parents"), None),
        (Method::GET, messages_uri.clone(), None),
        (Method::POST, messages_uri.clone(), Some(json!({ "content": "hello from a" }))),
        (Method::POST, format!("/messages/{}/read", message["id"].as_str().unwrap()), None),
        (
            Method::POST,
            format!("/classrooms/{}/enrollments", b.classroom_id),
            Some(json!({ "studentId": a.student_id })),
        ),
        (
            Method::POST,
            format!("/classrooms/{}/enrollments", a.classroom_id),
            Some(json!({ "studentId": student })),
        ),
        (
            Method::POST,
            "/grade-categories".to_string(),
            Some(json!({ "classroomId": b.classroom_id, "name": "Stolen", "weight": 10 })),
        ),
        (
            Method::PUT,
            format!("/assignments/{}/scores/{}", assignment["id"].as_str().unwrap(), a.student_id),
            Some(json!({ "points": 20 })),
        ),
        (
            Method::POST,
            "/progression".to_string(),
            Some(json!({
                "studentId": student,
                "classroomId": b.classroom_id,
                "reportingPeriod": "quarter_1",
                "goals": [],
            })),
        ),
    ];
    for (method, uri, body) in attempts {
        let (status, reply) = app.as_user(&a.admin, method.clone(), &uri, body).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{method} {uri}");
        assert!(reply["error"].is_string(), "{method} {uri}");
    }

    // Nothing changed on school-b's side.
    let (_, form) = app.as_user(&b.admin, Method::GET, &form_uri, None).await;
    assert_eq!(form["status"], "pending");
    let (_, history) = app
        .as_user(&b.admin, Method::GET, &format!("/students/{student}/attendance"), None)
        .await;
    assert_eq!(history[0]["status"], "present");
    let (_, thread) = app.as_user(&b.parent, Method::GET, &messages_uri, None).await;
    assert_eq!(thread.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_input_is_a_json_validation_error() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let admin = app.account(&a, "admin@a.example", Role::Admin).await;

    let attempts = [
        (Method::POST, "/announcements", Some(json!({ "title": "t", "content": "c" })), "body"),
        (
            Method::POST,
            "/announcements",
            Some(json!({ "title": "t", "content": "c", "category": "gossip" })),
            "body",
        ),
        (Method::GET, "/announcements/not-a-uuid", None, "path"),
        (Method::GET, "/announcements?limit=abc", None, "query"),
    ];
    for (method, uri, body, field) in attempts {
        let (status, reply) = app.as_user(&admin, method.clone(), uri, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(reply["error"], "Validation failed", "{method} {uri}");
        assert!(reply["fields"][field].is_string(), "{method} {uri}");
    }

    let (status, reply) = app
        .call(Method::POST, "/auth/login", Some("school-a"), None, Some(json!({ "email": "x@y" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(reply["fields"]["body"].is_string());
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    app.account(&a, "parent@a.example", Role::Parent).await;

    let wrong_password = app
        .call(
            Method::POST,
            "/auth/login",
            Some("school-a"),
            None,
            Some(json!({ "email": "parent@a.example", "password": "not-the-password" })),
        )
        .await;
    let unknown_email = app
        .call(
            Method::POST,
            "/auth/login",
            Some("school-a"),
            None,
            Some(json!({ "email": "nobody@a.example", "password": PASSWORD })),
        )
        .await;

    assert_eq!(wrong_password.0, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn login_is_scoped_to_the_named_tenant() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    app.tenant("school-b").await;
    app.account(&a, "parent@a.example", Role::Parent).await;

    let body = json!({ "email": "parent@a.example", "password": PASSWORD });
    let (status, ok) = app
        .call(Method::POST, "/auth/login", Some("school-a"), None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ok["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(ok["user"]["role"], "parent");

    let (status, _) = app
        .call(Method::POST, "/auth/login", Some("school-b"), None, Some(body))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tenant_resolution_errors() {
    let app = TestApp::new();

    let body = json!({ "email": "x@y.z", "password": PASSWORD });
    let (status, _) = app
        .call(Method::POST, "/auth/login", None, None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::POST, "/auth/login", Some("ghost-school"), None, Some(body))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Tenant not found");
}

#[tokio::test]
async fn missing_or_revoked_tokens_are_rejected() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let parent = app.account(&a, "parent@a.example", Role::Parent).await;

    let (status, _) = app.call(Method::GET, "/auth/me", Some("school-a"), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, me) = app.as_user(&parent, Method::GET, "/auth/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "parent@a.example");

    let (status, _) = app.as_user(&parent, Method::POST, "/auth/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.as_user(&parent, Method::GET, "/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_supplied_identity_fields_are_ignored() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let b = app.tenant("school-b").await;
    let teacher = app.account(&a, "teacher@a.example", Role::Teacher).await;
    let other = app.account(&b, "admin@b.example", Role::Admin).await;

    let (status, created) = app
        .as_user(
            &teacher,
            Method::POST,
            "/announcements",
            Some(json!({
                "title": "Field trip",
                "content": "Bring lunch",
                "category": "events",
                "tenantId": b.id,
                "authorId": other.user.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["tenantId"], json!(a.id));
    assert_eq!(created["authorId"], json!(teacher.user.id));
}

#[tokio::test]
async fn roles_are_enforced_after_tenant_checks() {
    let app = TestApp::new();
    let a = app.tenant("school-a").await;
    let parent = app.account(&a, "parent@a.example", Role::Parent).await;
    let teacher = app.account(&a, "teacher@a.example", Role::Teacher).await;

    let (status, _) = app.as_user(&parent, Method::GET, "/users", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .as_user(
            &parent,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "t", "content": "c", "category": "general" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.as_user(&teacher, Method::GET, "/audit-log", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn self_registration_only_creates_parents_after_bootstrap() {
    let app = TestApp::new();
    app.tenant("school-a").await;

    let register = |email: &str, role: &str| {
        json!({
            "email": email,
            "password": PASSWORD,
            "firstName": "Ana",
            "lastName": "Diaz",
            "role": role,
        })
    };

    // First account of an empty tenant may be its admin.
    let (status, body) = app
        .call(Method::POST, "/auth/register", Some("school-a"), None, Some(register("first@a.example", "admin")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "admin");

    let (status, _) = app
        .call(Method::POST, "/auth/register", Some("school-a"), None, Some(register("second@a.example", "admin")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call(Method::POST, "/auth/register", Some("school-a"), None, Some(register("t@a.example", "teacher")))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(Method::POST, "/auth/register", Some("school-a"), None, Some(register("p@a.example", "parent")))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], "parent");

    let (status, body) = app
        .call(Method::POST, "/auth/register", Some("school-a"), None, Some(register("P@a.example", "parent")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "User already exists");
}

#[tokio::test]
async fn concurrent_bootstrap_registrations_yield_one_admin() {
    let app = TestApp::new();
    app.tenant("school-a").await;

    let app = &app;
    let attempt = move |email: &'static str| {
        app.call(
            Method::POST,
            "/auth/register",
            Some("school-a"),
            None,
            Some(json!({
                "email": email,
                "password": PASSWORD,
                "firstName": "Ana",
                "lastName": "Diaz",
                "role": "admin",
            })),
        )
    };
    let results = tokio::join!(
        attempt("one@a.example"),
        attempt("two@a.example"),
        attempt("three@a.example"),
    );

    let statuses = [results.0 .0, results.1 .0, results.2 .0];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::CREATED).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 2);

    let tenant = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();
    let admins = app.store().list_users(tenant.id, Some(Role::Admin), 10).await.unwrap();
    assert_eq!(admins.len(), 1);
}

#[tokio::test]
async fn platform_provisioning_requires_the_operator_key() {
    let app = TestApp::new();
    let body = json!({ "name": "Lincoln", "subdomain": "Lincoln", "contactEmail": "office@lincoln.example" });

    let (status, _) = app
        .call(Method::POST, "/platform/tenants", None, None, Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/platform/tenants")
        .header("X-Platform-Key", "platform-test-key")
        .header("Content-Type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let resp = tower::ServiceExt::oneshot(app.router.clone(), req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let tenant = app.store().tenant_by_subdomain("lincoln").await.unwrap();
    assert!(tenant.is_some());
    let sub = app.store().subscription(tenant.unwrap().id).await.unwrap().unwrap();
    assert_eq!(sub.plan_name, "trial");
}
