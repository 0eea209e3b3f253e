use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "form_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    EarlyPickup,
    SickLeave,
    PermissionSlip,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "form_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    Pending,
    Approved,
    Rejected,
}

impl FormStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, FormStatus::Pending)
    }
}

impl std::fmt::Display for FormStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormStatus::Pending => "pending",
            FormStatus::Approved => "approved",
            FormStatus::Rejected => "rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FormRequest {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub parent_id: Uuid,
    pub form_type: FormType,
    pub title: String,
    pub reason: String,
    pub request_date: Option<DateTime<Utc>>,
    /// For multi-day requests.
    pub end_date: Option<DateTime<Utc>>,
    pub status: FormStatus,
    pub admin_notes: Option<String>,
    pub processed_by: Option<Uuid>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFormRequest {
    pub student_id: Uuid,
    pub form_type: FormType,
    pub title: String,
    pub reason: String,
    pub request_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewFormRequest {
    pub parent_id: Uuid,
    pub student_id: Uuid,
    pub form_type: FormType,
    pub title: String,
    pub reason: String,
    pub request_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFormRequest {
    pub status: FormStatus,
    pub admin_notes: Option<String>,
}

/// A pending -> terminal transition, stamped by the service.
#[derive(Debug, Clone)]
pub struct FormDecision {
    pub status: FormStatus,
    pub admin_notes: Option<String>,
    pub processed_by: Uuid,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FormListQuery {
    pub status: Option<FormStatus>,
}
