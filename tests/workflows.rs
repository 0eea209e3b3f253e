mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{seed_school, TestApp};
use schoolhub_api::models::{message::WsEnvelope, user::Role};

fn frame(raw: String) -> WsEnvelope {
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn early_pickup_request_is_approved_once() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, form) = app
        .as_user(
            &s.parent,
            Method::POST,
            "/forms",
            Some(json!({
                "studentId": s.student_id,
                "formType": "early_pickup",
                "title": "Dentist",
                "reason": "Appointment at 2pm",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(form["status"], "pending");
    let uri = format!("/forms/{}", form["id"].as_str().unwrap());

    let (status, _) = app
        .as_user(&s.parent, Method::PUT, &uri, Some(json!({ "status": "approved" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .as_user(&s.teacher, Method::PUT, &uri, Some(json!({ "status": "approved", "adminNotes": "ok" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, fetched) = app.as_user(&s.parent, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "approved");
    assert_eq!(fetched["processedBy"], json!(s.teacher.user.id));
    assert!(!fetched["processedAt"].is_null());

    let (status, body) = app
        .as_user(&s.admin, Method::PUT, &uri, Some(json!({ "status": "rejected" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Form request already processed");

    let (_, pending) = app.as_user(&s.admin, Method::GET, "/forms?status=pending", None).await;
    assert_eq!(pending.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn parents_cannot_file_forms_for_other_children() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;
    let tenant = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();
    let stranger = app.account(&tenant, "stranger@school-a.example", Role::Parent).await;

    let (status, _) = app
        .as_user(
            &stranger,
            Method::POST,
            "/forms",
            Some(json!({
                "studentId": s.student_id,
                "formType": "sick_leave",
                "title": "Flu",
                "reason": "Fever",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .as_user(&stranger, Method::GET, &format!("/students/{}", s.student_id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.as_user(&s.parent, Method::GET, "/students", None).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    let (_, theirs) = app.as_user(&stranger, Method::GET, "/students", None).await;
    assert_eq!(theirs.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn announcement_round_trip_and_repeatable_delete() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, created) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "Picture day", "content": "Wear blue", "category": "events", "priority": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, list) = app.as_user(&s.parent, Method::GET, "/announcements", None).await;
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["title"], "Picture day");
    assert_eq!(list[0]["content"], "Wear blue");
    assert_eq!(list[0]["category"], "events");
    assert_eq!(list[0]["viewCount"], 0);

    let uri = format!("/announcements/{}", created["id"].as_str().unwrap());
    let (_, viewed) = app.as_user(&s.parent, Method::GET, &uri, None).await;
    assert_eq!(viewed["viewCount"], 1);

    let (status, _) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "x", "content": "y", "category": "general", "priority": 7 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for _ in 0..2 {
        let (status, body) = app.as_user(&s.admin, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
    }
    let (_, list) = app.as_user(&s.parent, Method::GET, "/announcements", None).await;
    assert!(list.as_array().unwrap().is_empty());

    let (_, audit) = app.as_user(&s.admin, Method::GET, "/audit-log", None).await;
    let deletes = audit
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["action"] == "announcement.delete")
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn expired_announcements_are_hidden_and_not_counted() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, created) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/announcements",
            Some(json!({
                "title": "Book fair",
                "content": "Last week",
                "category": "events",
                "expiresAt": "2020-01-01T00:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (_, list) = app.as_user(&s.parent, Method::GET, "/announcements", None).await;
    assert!(list.as_array().unwrap().is_empty());
    let (status, _) = app
        .as_user(&s.parent, Method::GET, &format!("/announcements/{id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let tenant = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();
    let stored = app
        .store()
        .announcement(tenant.id, id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.view_count, 0);
}

#[tokio::test]
async fn announcements_reach_the_tenant_but_not_the_author_or_other_tenants() {
    let app = TestApp::new();
    let a = seed_school(&app, "school-a").await;
    let b = seed_school(&app, "school-b").await;
    let tenant_a = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();
    let tenant_b = app.store().tenant_by_subdomain("school-b").await.unwrap().unwrap();

    let mut author = app.state.hub.register(a.teacher.user.id, tenant_a.id, Role::Teacher).await;
    let mut parent_a = app.state.hub.register(a.parent.user.id, tenant_a.id, Role::Parent).await;
    let mut parent_b = app.state.hub.register(b.parent.user.id, tenant_b.id, Role::Parent).await;

    let (status, _) = app
        .as_user(
            &a.teacher,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "Snow day", "content": "School closed", "category": "urgent" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let got = frame(parent_a.rx.try_recv().unwrap());
    assert_eq!(got.kind, "announcement");
    assert_eq!(got.data["title"], "Snow day");
    assert!(author.rx.try_recv().is_err());
    assert!(parent_b.rx.try_recv().is_err());
}

#[tokio::test]
async fn messages_reach_conversation_participants_only() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;
    let tenant = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();

    let mut sender = app.state.hub.register(s.teacher.user.id, tenant.id, Role::Teacher).await;
    let mut peer = app.state.hub.register(s.parent.user.id, tenant.id, Role::Parent).await;
    let mut bystander = app.state.hub.register(s.admin.user.id, tenant.id, Role::Admin).await;

    let (status, conversation) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/conversations",
            Some(json!({ "participantIds": [s.parent.user.id, s.parent.user.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(conversation["isGroup"], false);
    let messages_uri = format!("/conversations/{}/messages", conversation["id"].as_str().unwrap());

    let (status, message) = app
        .as_user(&s.teacher, Method::POST, &messages_uri, Some(json!({ "content": "Mia did great today" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["senderId"], json!(s.teacher.user.id));
    assert_eq!(message["messageType"], "text");

    let got = frame(peer.rx.try_recv().unwrap());
    assert_eq!(got.kind, "new_message");
    assert_eq!(got.data["content"], "Mia did great today");
    assert!(sender.rx.try_recv().is_err());
    assert!(bystander.rx.try_recv().is_err());

    // Outsiders cannot read or post.
    let (status, _) = app.as_user(&s.admin, Method::GET, &messages_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .as_user(&s.admin, Method::POST, &messages_uri, Some(json!({ "content": "hi" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, stats) = app.as_user(&s.parent, Method::GET, "/dashboard/stats", None).await;
    assert_eq!(stats["unreadMessages"], 1);

    let read_uri = format!("/messages/{}/read", message["id"].as_str().unwrap());
    for _ in 0..2 {
        let (status, _) = app.as_user(&s.parent, Method::POST, &read_uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }
    let (_, stats) = app.as_user(&s.parent, Method::GET, "/dashboard/stats", None).await;
    assert_eq!(stats["unreadMessages"], 0);
}

#[tokio::test]
async fn conversation_participants_must_belong_to_the_tenant() {
    let app = TestApp::new();
    let a = seed_school(&app, "school-a").await;
    let b = seed_school(&app, "school-b").await;

    let (status, body) = app
        .as_user(
            &a.teacher,
            Method::POST,
            "/conversations",
            Some(json!({ "participantIds": [b.parent.user.id] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["participantIds"].is_string());
}

#[tokio::test]
async fn attendance_updates_go_to_staff_and_linked_parents() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;
    let tenant = app.store().tenant_by_subdomain("school-a").await.unwrap().unwrap();
    let other_parent = app.account(&tenant, "other@school-a.example", Role::Parent).await;

    let mut admin = app.state.hub.register(s.admin.user.id, tenant.id, Role::Admin).await;
    let mut parent = app.state.hub.register(s.parent.user.id, tenant.id, Role::Parent).await;
    let mut other = app.state.hub.register(other_parent.user.id, tenant.id, Role::Parent).await;

    let (status, record) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/attendance",
            Some(json!({ "studentId": s.student_id, "classroomId": s.classroom_id, "status": "absent" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(record["arrivalTime"].is_null());
    assert_eq!(record["markedBy"], json!(s.teacher.user.id));

    assert_eq!(frame(admin.rx.try_recv().unwrap()).kind, "attendance_update");
    assert_eq!(frame(parent.rx.try_recv().unwrap()).data["status"], "absent");
    assert!(other.rx.try_recv().is_err());

    // Re-marking the same day replaces the row.
    let (_, again) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/attendance",
            Some(json!({ "studentId": s.student_id, "classroomId": s.classroom_id, "status": "late" })),
        )
        .await;
    assert_eq!(again["id"], record["id"]);
    assert!(!again["arrivalTime"].is_null());

    let (status, _) = app.as_user(&s.parent, Method::GET, "/attendance", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, history) = app
        .as_user(&s.parent, Method::GET, &format!("/students/{}/attendance", s.student_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn progression_snapshot_rolls_up_grades_and_attendance() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, category) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/grade-categories",
            Some(json!({ "classroomId": s.classroom_id, "name": "Quizzes", "weight": 100 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, assignment) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/assignments",
            Some(json!({
                "classroomId": s.classroom_id,
                "categoryId": category["id"],
                "title": "Fractions quiz",
                "maxPoints": 10,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app.as_user(&s.teacher, Method::GET, "/assignments", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let score_uri = format!("/assignments/{}/scores/{}", assignment["id"].as_str().unwrap(), s.student_id);
    let (status, _) = app
        .as_user(&s.teacher, Method::PUT, &score_uri, Some(json!({ "points": 11 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, score) = app
        .as_user(&s.teacher, Method::PUT, &score_uri, Some(json!({ "points": 9, "feedback": "Nice" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(score["gradedBy"], json!(s.teacher.user.id));

    for status in ["present", "late"] {
        let date = if status == "present" { "2024-09-02" } else { "2024-09-03" };
        let (code, _) = app
            .as_user(
                &s.teacher,
                Method::POST,
                "/attendance",
                Some(json!({
                    "studentId": s.student_id,
                    "classroomId": s.classroom_id,
                    "date": date,
                    "status": status,
                })),
            )
            .await;
        assert_eq!(code, StatusCode::OK);
    }

    let body = json!({
        "studentId": s.student_id,
        "classroomId": s.classroom_id,
        "reportingPeriod": "quarter_1",
        "goals": [{ "description": "Read 10 books", "achieved": false, "notes": null }],
    });
    let (status, snapshot) = app
        .as_user(&s.teacher, Method::POST, "/progression", Some(body.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(snapshot["overallGrade"], 90.0);
    assert_eq!(snapshot["attendanceRate"], 100.0);

    let (status, _) = app.as_user(&s.teacher, Method::POST, "/progression", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, grades) = app
        .as_user(&s.parent, Method::GET, &format!("/students/{}/grades", s.student_id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(grades[0]["points"], 9.0);

    let (_, history) = app
        .as_user(&s.parent, Method::GET, &format!("/students/{}/progression", s.student_id), None)
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn seat_limit_blocks_new_students() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, _) = app
        .as_user(
            &s.admin,
            Method::PUT,
            "/subscription",
            Some(json!({
                "planName": "starter",
                "status": "active",
                "studentLimit": 1,
                "monthlyPrice": 49.0,
                "billingEmail": "billing@school-a.example",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .as_user(
            &s.admin,
            Method::POST,
            "/students",
            Some(json!({
                "studentNumber": "S-002",
                "firstName": "Leo",
                "lastName": "Kim",
                "dateOfBirth": "2016-01-20",
                "grade": "3",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, stats) = app.as_user(&s.admin, Method::GET, "/dashboard/stats", None).await;
    assert_eq!(stats["totalStudents"], 1);
}

#[tokio::test]
async fn deactivated_and_demoted_users_lose_access() {
    let app = TestApp::new();
    let s = seed_school(&app, "school-a").await;

    let (status, _) = app
        .as_user(&s.admin, Method::DELETE, &format!("/users/{}", s.parent.user.id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            Method::POST,
            "/auth/login",
            Some("school-a"),
            None,
            Some(json!({ "email": "parent@school-a.example", "password": common::PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A token issued before deactivation stops working too.
    let (status, _) = app.as_user(&s.parent, Method::GET, "/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .as_user(
            &s.admin,
            Method::PUT,
            &format!("/users/{}", s.teacher.user.id),
            Some(json!({ "role": "parent" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .as_user(
            &s.teacher,
            Method::POST,
            "/announcements",
            Some(json!({ "title": "Field trip", "content": "Friday", "category": "events" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, me) = app.as_user(&s.teacher, Method::GET, "/auth/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["role"], "parent");
}
