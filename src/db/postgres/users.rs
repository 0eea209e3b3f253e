use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{StoreError, StoreResult, UserStore},
    models::user::{NewUser, Role, User, UserPatch},
};

#[async_trait]
impl UserStore for PgStorage {
    async fn user_by_email(&self, tenant: Uuid, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND lower(email) = lower($2)",
        )
        .bind(tenant)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn user_by_id(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE tenant_id = $1 AND id = $2")
            .bind(tenant)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn create_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<User> {
        insert_user(&self.pool, tenant, user).await
    }

    async fn create_first_user(&self, tenant: Uuid, user: &NewUser) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        // The tenant row lock serializes concurrent first registrations.
        sqlx::query("SELECT id FROM tenants WHERE id = $1 FOR UPDATE")
            .bind(tenant)
            .fetch_optional(&mut *tx)
            .await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_id = $1")
            .bind(tenant)
            .fetch_one(&mut *tx)
            .await?;
        if existing > 0 {
            return Ok(None);
        }

        let created = insert_user(&mut *tx, tenant, user).await?;
        tx.commit().await?;
        Ok(Some(created))
    }

    async fn list_users(&self, tenant: Uuid, role: Option<Role>, limit: i64) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users
             WHERE tenant_id = $1 AND ($2::user_role IS NULL OR role = $2)
             ORDER BY role, last_name, first_name
             LIMIT $3",
        )
        .bind(tenant)
        .bind(role)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn update_user(&self, tenant: Uuid, id: Uuid, patch: &UserPatch) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users
             SET first_name = COALESCE($3, first_name),
                 last_name  = COALESCE($4, last_name),
                 phone      = COALESCE($5, phone),
                 address    = COALESCE($6, address),
                 role       = COALESCE($7, role),
                 is_active  = COALESCE($8, is_active),
                 updated_at = NOW()
             WHERE tenant_id = $1 AND id = $2
             RETURNING *",
        )
        .bind(tenant)
        .bind(id)
        .bind(&patch.first_name)
        .bind(&patch.last_name)
        .bind(&patch.phone)
        .bind(&patch.address)
        .bind(patch.role)
        .bind(patch.is_active)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn record_login(&self, tenant: Uuid, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET last_login_at = $3, updated_at = NOW() WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_active_users(&self, tenant: Uuid, ids: &[Uuid]) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND is_active = TRUE AND id = ANY($2)",
        )
        .bind(tenant)
        .bind(ids)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }

    async fn revoke_session(&self, tenant: Uuid, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO revoked_sessions (jti, tenant_id, expires_at) VALUES ($1, $2, $3)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(tenant)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_session_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        let revoked: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM revoked_sessions WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?;
        Ok(revoked)
    }
}

async fn insert_user<'e, E>(executor: E, tenant: Uuid, user: &NewUser) -> StoreResult<User>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query_as::<_, User>(
        "INSERT INTO users (tenant_id, email, password_hash, first_name, last_name, role, phone, address)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(tenant)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.role)
    .bind(&user.phone)
    .bind(&user.address)
    .fetch_one(executor)
    .await
    .map_err(|e| match StoreError::from(e) {
        StoreError::Conflict(_) => StoreError::Conflict("User already exists".into()),
        other => other,
    })
}
