use async_trait::async_trait;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{StoreError, StoreResult, TenantStore},
    models::tenant::{CreateTenantRequest, Tenant},
};

#[async_trait]
impl TenantStore for PgStorage {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn tenant_by_subdomain(&self, subdomain: &str) -> StoreResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE subdomain = $1")
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>("SELECT * FROM tenants WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }

    async fn create_tenant(&self, req: &CreateTenantRequest) -> StoreResult<Tenant> {
        sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (name, subdomain, contact_email, phone, address)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&req.name)
        .bind(&req.subdomain)
        .bind(&req.contact_email)
        .bind(&req.phone)
        .bind(&req.address)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => StoreError::Conflict("Subdomain already exists".into()),
            other => other,
        })
    }
}
