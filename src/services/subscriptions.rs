use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::{
        auth::Session,
        tenant::{Subscription, UpsertSubscriptionRequest},
    },
    services::audit,
};

pub struct SubscriptionService;

impl SubscriptionService {
    pub async fn get(store: &dyn Storage, session: &Session) -> Result<Subscription, AppError> {
        store
            .subscription(session.tenant_id)
            .await?
            .ok_or(AppError::NotFound("Subscription"))
    }

    pub async fn upsert(
        store: &dyn Storage,
        session: &Session,
        req: &UpsertSubscriptionRequest,
    ) -> Result<Subscription, AppError> {
        validate_subscription(req)?;

        let before = store.subscription(session.tenant_id).await?;
        let after = store.upsert_subscription(session.tenant_id, req).await?;

        let mut entry = audit::entry(session, "subscription.update", "subscription", after.id).after(&after);
        if let Some(before) = &before {
            entry = entry.before(before);
        }
        audit::log(store, session, entry).await;
        Ok(after)
    }
}

/// Shared by the API and the operator CLI.
pub fn validate_subscription(req: &UpsertSubscriptionRequest) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();
    errors
        .check(!req.plan_name.trim().is_empty(), "planName", "Plan name is required")
        .check(req.student_limit >= 0, "studentLimit", "Student limit cannot be negative")
        .check(req.monthly_price >= 0.0, "monthlyPrice", "Monthly price cannot be negative")
        .check(req.billing_email.contains('@'), "billingEmail", "Billing email is invalid");
    errors.finish()
}
