use async_trait::async_trait;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{BillingStore, StoreResult},
    models::tenant::{Subscription, UpsertSubscriptionRequest},
};

#[async_trait]
impl BillingStore for PgStorage {
    async fn subscription(&self, tenant: Uuid) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE tenant_id = $1")
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn upsert_subscription(&self, tenant: Uuid, req: &UpsertSubscriptionRequest) -> StoreResult<Subscription> {
        let row = sqlx::query_as::<_, Subscription>(
            "INSERT INTO subscriptions
                 (tenant_id, plan_name, status, student_limit, monthly_price, billing_email,
                  start_date, end_date, trial_ends_at)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, NOW()), $8, $9)
             ON CONFLICT (tenant_id) DO UPDATE SET
                 plan_name     = EXCLUDED.plan_name,
                 status        = EXCLUDED.status,
                 student_limit = EXCLUDED.student_limit,
                 monthly_price = EXCLUDED.monthly_price,
                 billing_email = EXCLUDED.billing_email,
                 start_date    = COALESCE($7, subscriptions.start_date),
                 end_date      = EXCLUDED.end_date,
                 trial_ends_at = EXCLUDED.trial_ends_at,
                 updated_at    = NOW()
             RETURNING *",
        )
        .bind(tenant)
        .bind(&req.plan_name)
        .bind(req.status)
        .bind(req.student_limit)
        .bind(req.monthly_price)
        .bind(&req.billing_email)
        .bind(req.start_date)
        .bind(req.end_date)
        .bind(req.trial_ends_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
