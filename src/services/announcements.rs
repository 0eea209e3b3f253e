use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::Storage,
    error::{AppError, FieldErrors},
    models::{
        announcement::{Announcement, CreateAnnouncementRequest, NewAnnouncement, UpdateAnnouncementRequest},
        auth::Session,
    },
    services::{
        audit,
        realtime::{Audience, Event, Hub},
    },
};

fn valid_priority(p: Option<i32>) -> bool {
    p.map_or(true, |p| (1..=3).contains(&p))
}

pub struct AnnouncementService;

impl AnnouncementService {
    pub async fn list(store: &dyn Storage, session: &Session, limit: i64) -> Result<Vec<Announcement>, AppError> {
        Ok(store.list_announcements(session.tenant_id, Utc::now(), limit).await?)
    }

    /// Returns the announcement and counts the view.
    pub async fn view(store: &dyn Storage, session: &Session, id: Uuid) -> Result<Announcement, AppError> {
        store
            .view_announcement(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Announcement"))
    }

    pub async fn create(
        store: &dyn Storage,
        hub: &Hub,
        session: &Session,
        req: &CreateAnnouncementRequest,
    ) -> Result<Announcement, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(!req.title.trim().is_empty(), "title", "Title is required")
            .check(!req.content.trim().is_empty(), "content", "Content is required")
            .check(valid_priority(req.priority), "priority", "Priority must be between 1 and 3");
        errors.finish()?;

        let new = NewAnnouncement {
            author_id: session.user_id,
            title: req.title.trim().to_string(),
            content: req.content.clone(),
            category: req.category,
            priority: req.priority.unwrap_or(1),
            expires_at: req.expires_at,
        };
        let announcement = store.create_announcement(session.tenant_id, &new).await?;

        audit::log(
            store,
            session,
            audit::entry(session, "announcement.create", "announcement", announcement.id).after(&announcement),
        )
        .await;

        hub.publish(
            Event::new(
                session.tenant_id,
                Audience::Tenant { roles: None },
                "announcement",
                json!(announcement),
            )
            .excluding(session.user_id),
        )
        .await;

        Ok(announcement)
    }

    pub async fn update(
        store: &dyn Storage,
        session: &Session,
        id: Uuid,
        patch: &UpdateAnnouncementRequest,
    ) -> Result<Announcement, AppError> {
        let mut errors = FieldErrors::new();
        errors
            .check(patch.title.as_deref().map_or(true, |t| !t.trim().is_empty()), "title", "Title cannot be empty")
            .check(patch.content.as_deref().map_or(true, |c| !c.trim().is_empty()), "content", "Content cannot be empty")
            .check(valid_priority(patch.priority), "priority", "Priority must be between 1 and 3");
        errors.finish()?;

        let before = store
            .announcement(session.tenant_id, id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(AppError::NotFound("Announcement"))?;

        let after = store
            .update_announcement(session.tenant_id, id, patch)
            .await?
            .ok_or(AppError::NotFound("Announcement"))?;

        audit::log(
            store,
            session,
            audit::entry(session, "announcement.update", "announcement", id).before(&before).after(&after),
        )
        .await;
        Ok(after)
    }

    /// Soft delete. Deleting an already inactive announcement succeeds.
    pub async fn delete(store: &dyn Storage, session: &Session, id: Uuid) -> Result<(), AppError> {
        let before = store
            .announcement(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Announcement"))?;

        if !store.deactivate_announcement(session.tenant_id, id).await? {
            return Err(AppError::NotFound("Announcement"));
        }

        if before.is_active {
            audit::log(
                store,
                session,
                audit::entry(session, "announcement.delete", "announcement", id).before(&before),
            )
            .await;
        }
        Ok(())
    }
}
