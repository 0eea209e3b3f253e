use async_trait::async_trait;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{FormStore, StoreResult},
    models::form::{FormDecision, FormRequest, FormStatus, NewFormRequest},
};

#[async_trait]
impl FormStore for PgStorage {
    async fn create_form(&self, tenant: Uuid, new: &NewFormRequest) -> StoreResult<FormRequest> {
        let row = sqlx::query_as::<_, FormRequest>(
            "INSERT INTO form_requests
                 (tenant_id, student_id, parent_id, form_type, title, reason, request_date, end_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING *",
        )
        .bind(tenant)
        .bind(new.student_id)
        .bind(new.parent_id)
        .bind(new.form_type)
        .bind(&new.title)
        .bind(&new.reason)
        .bind(new.request_date)
        .bind(new.end_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn form(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<FormRequest>> {
        let row = sqlx::query_as::<_, FormRequest>("SELECT * FROM form_requests WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_forms(
        &self,
        tenant: Uuid,
        status: Option<FormStatus>,
        parent: Option<Uuid>,
        limit: i64,
    ) -> StoreResult<Vec<FormRequest>> {
        let rows = sqlx::query_as::<_, FormRequest>(
            "SELECT * FROM form_requests
             WHERE tenant_id = $1
               AND ($2::form_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR parent_id = $3)
             ORDER BY created_at DESC
             LIMIT $4",
        )
        .bind(tenant)
        .bind(status)
        .bind(parent)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn decide_form(&self, tenant: Uuid, id: Uuid, decision: &FormDecision) -> StoreResult<Option<FormRequest>> {
        let row = sqlx::query_as::<_, FormRequest>(
            "UPDATE form_requests SET
                 status       = $3,
                 admin_notes  = $4,
                 processed_by = $5,
                 processed_at = $6,
                 updated_at   = NOW()
             WHERE tenant_id = $1 AND id = $2 AND status = 'pending'
             RETURNING *",
        )
        .bind(tenant)
        .bind(id)
        .bind(decision.status)
        .bind(&decision.admin_notes)
        .bind(decision.processed_by)
        .bind(decision.processed_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn count_pending_forms(&self, tenant: Uuid) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM form_requests WHERE tenant_id = $1 AND status = 'pending'",
        )
        .bind(tenant)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}
