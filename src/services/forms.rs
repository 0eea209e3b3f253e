use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::{
        auth::Session,
        form::{CreateFormRequest, FormDecision, FormRequest, FormStatus, NewFormRequest, ProcessFormRequest},
        user::Role,
    },
    services::audit,
};

pub struct FormService;

impl FormService {
    /// Parents submit requests for their own children only.
    pub async fn create(
        store: &dyn Storage,
        session: &Session,
        req: &CreateFormRequest,
    ) -> Result<FormRequest, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.title.trim().is_empty(), "title", "Title is required")
            .check(!req.reason.trim().is_empty(), "reason", "Reason is required")
            .check(
                match (req.request_date, req.end_date) {
                    (Some(start), Some(end)) => end >= start,
                    _ => true,
                },
                "endDate",
                "End date must not be before the request date",
            );
        errors.finish()?;

        if !store.is_parent_of(session.tenant_id, session.user_id, req.student_id).await? {
            return Err(AppError::NotFound("Student"));
        }

        let new = NewFormRequest {
            parent_id: session.user_id,
            student_id: req.student_id,
            form_type: req.form_type,
            title: req.title.trim().to_string(),
            reason: req.reason.clone(),
            request_date: req.request_date,
            end_date: req.end_date,
        };
        let form = store.create_form(session.tenant_id, &new).await?;

        audit::log(store, session, audit::entry(session, "form.create", "form_request", form.id).after(&form)).await;
        Ok(form)
    }

    pub async fn list(
        store: &dyn Storage,
        session: &Session,
        status: Option<FormStatus>,
        limit: i64,
    ) -> Result<Vec<FormRequest>, AppError> {
        let parent = (session.role == Role::Parent).then_some(session.user_id);
        Ok(store.list_forms(session.tenant_id, status, parent, limit).await?)
    }

    pub async fn get(store: &dyn Storage, session: &Session, id: Uuid) -> Result<FormRequest, AppError> {
        store
            .form(session.tenant_id, id)
            .await?
            .filter(|f| session.role != Role::Parent || f.parent_id == session.user_id)
            .ok_or(AppError::NotFound("Form request"))
    }

    /// `pending -> approved | rejected`. Both targets are terminal; deciding
    /// an already processed request fails with `Conflict`.
    pub async fn decide(
        store: &dyn Storage,
        session: &Session,
        id: Uuid,
        req: &ProcessFormRequest,
    ) -> Result<FormRequest, AppError> {
        if !req.status.is_terminal() {
            return Err(AppError::validation("status", "Status must be approved or rejected"));
        }

        let before = store
            .form(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Form request"))?;
        if before.status.is_terminal() {
            return Err(AppError::Conflict("Form request already processed".into()));
        }

        let decision = FormDecision {
            status: req.status,
            admin_notes: req.admin_notes.clone(),
            processed_by: session.user_id,
            processed_at: Utc::now(),
        };
        let after = store
            .decide_form(session.tenant_id, id, &decision)
            .await?
            .ok_or_else(|| AppError::Conflict("Form request already processed".into()))?;

        tracing::info!(form = %id, status = %after.status, "form request processed");
        audit::log(
            store,
            session,
            audit::entry(session, &format!("form.{}", after.status), "form_request", id)
                .before(&before)
                .after(&after),
        )
        .await;
        Ok(after)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FormStore, MemoryStorage, StudentStore, TenantStore, UserStore};
    use crate::models::{
        form::FormType,
        student::{CreateStudentRequest, LinkParentRequest},
        tenant::CreateTenantRequest,
        user::NewUser,
    };

    struct Fixture {
        store: MemoryStorage,
        parent: Session,
        teacher: Session,
        student_id: Uuid,
    }

    fn session(tenant_id: Uuid, user_id: Uuid, role: Role) -> Session {
        Session {
            user_id,
            tenant_id,
            subdomain: "school-a".into(),
            role,
            jti: Uuid::new_v4(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
            client_ip: None,
            user_agent: None,
        }
    }

    async fn fixture() -> Fixture {
        let store = MemoryStorage::new();
        let tenant = store
            .create_tenant(&CreateTenantRequest {
                name: "School A".into(),
                subdomain: "school-a".into(),
                contact_email: "office@a.example".into(),
                phone: None,
                address: None,
            })
            .await
            .unwrap();
        let mut ids = Vec::new();
        for (email, role) in [("p@a.example", Role::Parent), ("t@a.example", Role::Teacher)] {
            let user = store
                .create_user(
                    tenant.id,
                    &NewUser {
                        email: email.into(),
                        password_hash: "x".into(),
                        first_name: "F".into(),
                        last_name: "L".into(),
                        role,
                        phone: None,
                        address: None,
                    },
                )
                .await
                .unwrap();
            ids.push(user.id);
        }
        let student = store
            .create_student(
                tenant.id,
                &CreateStudentRequest {
                    student_number: "S-1".into(),
                    first_name: "Kim".into(),
                    last_name: "L".into(),
                    date_of_birth: chrono::NaiveDate::from_ymd_opt(2015, 4, 2).unwrap(),
                    grade: "3".into(),
                    emergency_contact: None,
                    medical_info: None,
                },
            )
            .await
            .unwrap();
        store
            .link_parent(
                tenant.id,
                student.id,
                &LinkParentRequest {
                    parent_id: ids[0],
                    relationship: "mother".into(),
                    is_primary: true,
                },
            )
            .await
            .unwrap();

        Fixture {
            parent: session(tenant.id, ids[0], Role::Parent),
            teacher: session(tenant.id, ids[1], Role::Teacher),
            student_id: student.id,
            store,
        }
    }

    fn pickup(student_id: Uuid) -> CreateFormRequest {
        CreateFormRequest {
            student_id,
            form_type: FormType::EarlyPickup,
            title: "Dentist".into(),
            reason: "Appointment at 2pm".into(),
            request_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn approval_stamps_processor_and_time() {
        let f = fixture().await;
        let form = FormService::create(&f.store, &f.parent, &pickup(f.student_id)).await.unwrap();
        assert_eq!(form.status, FormStatus::Pending);
        assert_eq!(form.parent_id, f.parent.user_id);

        let decided = FormService::decide(
            &f.store,
            &f.teacher,
            form.id,
            &ProcessFormRequest { status: FormStatus::Approved, admin_notes: Some("ok".into()) },
        )
        .await
        .unwrap();
        assert_eq!(decided.status, FormStatus::Approved);
        assert_eq!(decided.processed_by, Some(f.teacher.user_id));
        assert!(decided.processed_at.is_some());

        let fetched = f.store.form(f.parent.tenant_id, form.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, FormStatus::Approved);
    }

    #[tokio::test]
    async fn terminal_requests_cannot_be_decided_again() {
        let f = fixture().await;
        let form = FormService::create(&f.store, &f.parent, &pickup(f.student_id)).await.unwrap();
        let reject = ProcessFormRequest { status: FormStatus::Rejected, admin_notes: None };
        FormService::decide(&f.store, &f.teacher, form.id, &reject).await.unwrap();

        for status in [FormStatus::Approved, FormStatus::Rejected] {
            let again = ProcessFormRequest { status, admin_notes: None };
            let err = FormService::decide(&f.store, &f.teacher, form.id, &again).await.unwrap_err();
            assert!(matches!(err, AppError::Conflict(_)));
        }
        let stored = f.store.form(f.parent.tenant_id, form.id).await.unwrap().unwrap();
        assert_eq!(stored.status, FormStatus::Rejected);
    }

    #[tokio::test]
    async fn pending_is_not_a_valid_target() {
        let f = fixture().await;
        let form = FormService::create(&f.store, &f.parent, &pickup(f.student_id)).await.unwrap();
        let err = FormService::decide(
            &f.store,
            &f.teacher,
            form.id,
            &ProcessFormRequest { status: FormStatus::Pending, admin_notes: None },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn parents_cannot_file_for_other_children() {
        let f = fixture().await;
        let err = FormService::create(&f.store, &f.parent, &pickup(Uuid::new_v4())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
