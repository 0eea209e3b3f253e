use chrono::{Duration, Utc};

use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::tenant::{CreateTenantRequest, Subscription, SubscriptionStatus, Tenant, UpsertSubscriptionRequest},
};

pub const TRIAL_DAYS: i64 = 30;
pub const TRIAL_STUDENT_LIMIT: i32 = 50;

/// Tenant identifiers: 2 to 63 chars of `[a-z0-9-]`, no leading or
/// trailing hyphen.
pub fn is_valid_subdomain(s: &str) -> bool {
    (2..=63).contains(&s.len())
        && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}

pub struct TenantService;

impl TenantService {
    /// Provisions a tenant with a trial subscription.
    pub async fn provision(
        store: &dyn Storage,
        req: &CreateTenantRequest,
    ) -> Result<(Tenant, Subscription), AppError> {
        let subdomain = req.subdomain.trim().to_lowercase();
        let mut errors = FieldErrors::new();
        errors
            .check(!req.name.trim().is_empty(), "name", "Name is required")
            .check(is_valid_subdomain(&subdomain), "subdomain", "Subdomain must be 2-63 characters of a-z, 0-9 and -")
            .check(req.contact_email.contains('@'), "contactEmail", "Contact email is invalid");
        errors.finish()?;

        let req = CreateTenantRequest {
            subdomain,
            ..req.clone()
        };
        let tenant = store.create_tenant(&req).await?;

        let now = Utc::now();
        let trial = UpsertSubscriptionRequest {
            plan_name: "trial".into(),
            status: SubscriptionStatus::Trial,
            student_limit: TRIAL_STUDENT_LIMIT,
            monthly_price: 0.0,
            billing_email: tenant.contact_email.clone(),
            start_date: Some(now),
            end_date: None,
            trial_ends_at: Some(now + Duration::days(TRIAL_DAYS)),
        };
        let subscription = store.upsert_subscription(tenant.id, &trial).await?;

        tracing::info!(tenant = %tenant.subdomain, id = %tenant.id, "tenant provisioned");
        Ok((tenant, subscription))
    }
}
