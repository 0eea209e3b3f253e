use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{AnnouncementStore, StoreResult},
    models::announcement::{Announcement, NewAnnouncement, UpdateAnnouncementRequest},
};

#[async_trait]
impl AnnouncementStore for PgStorage {
    async fn list_announcements(&self, tenant: Uuid, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Announcement>> {
        let rows = sqlx::query_as::<_, Announcement>(
            "SELECT * FROM announcements
             WHERE tenant_id = $1 AND is_active = TRUE
               AND (expires_at IS NULL OR expires_at > $2)
             ORDER BY created_at DESC
             LIMIT $3",
        )
        .bind(tenant)
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>> {
        let row = sqlx::query_as::<_, Announcement>(
            "SELECT * FROM announcements WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn view_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<Announcement>> {
        let row = sqlx::query_as::<_, Announcement>(
            "UPDATE announcements SET view_count = view_count + 1
             WHERE tenant_id = $1 AND id = $2 AND is_active = TRUE
               AND (expires_at IS NULL OR expires_at > NOW())
             RETURNING *",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn create_announcement(&self, tenant: Uuid, new: &NewAnnouncement) -> StoreResult<Announcement> {
        let row = sqlx::query_as::<_, Announcement>(
            "INSERT INTO announcements (tenant_id, author_id, title, content, category, priority, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(tenant)
        .bind(new.author_id)
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.category)
        .bind(new.priority)
        .bind(new.expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_announcement(
        &self,
        tenant: Uuid,
        id: Uuid,
        patch: &UpdateAnnouncementRequest,
    ) -> StoreResult<Option<Announcement>> {
        let row = sqlx::query_as::<_, Announcement>(
            "UPDATE announcements SET
                 title      = COALESCE($3, title),
                 content    = COALESCE($4, content),
                 category   = COALESCE($5, category),
                 priority   = COALESCE($6, priority),
                 expires_at = COALESCE($7, expires_at),
                 updated_at = NOW()
             WHERE tenant_id = $1 AND id = $2 AND is_active = TRUE
             RETURNING *",
        )
        .bind(tenant)
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.content)
        .bind(patch.category)
        .bind(patch.priority)
        .bind(patch.expires_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn deactivate_announcement(&self, tenant: Uuid, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE announcements SET is_active = FALSE, updated_at = NOW()
             WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
