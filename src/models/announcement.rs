use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "announcement_category", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Events,
    Urgent,
    Academic,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Category,
    /// 1 = low, 2 = medium, 3 = high
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub view_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub content: String,
    pub category: Category,
    pub priority: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<Category>,
    pub priority: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Insert shape with the server-derived author.
#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub priority: i32,
    pub expires_at: Option<DateTime<Utc>>,
}
