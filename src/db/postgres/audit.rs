use async_trait::async_trait;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{AuditStore, StoreResult},
    models::audit::{AuditEntry, AuditLog},
};

#[async_trait]
impl AuditStore for PgStorage {
    async fn append_audit(&self, tenant: Uuid, entry: &AuditEntry) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO audit_logs
                 (tenant_id, user_id, action, entity_type, entity_id, old_values, new_values,
                  ip_address, user_agent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(tenant)
        .bind(entry.user_id)
        .bind(&entry.action)
        .bind(&entry.entity_type)
        .bind(entry.entity_id)
        .bind(&entry.old_values)
        .bind(&entry.new_values)
        .bind(&entry.ip_address)
        .bind(&entry.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, tenant: Uuid, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let rows = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs WHERE tenant_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(tenant)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
