use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GradeCategory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub classroom_id: Uuid,
    pub name: String,
    /// Percentage weight in the final grade.
    pub weight: f64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGradeCategoryRequest {
    pub classroom_id: Uuid,
    pub name: String,
    pub weight: f64,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub classroom_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub max_points: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_date: DateTime<Utc>,
    pub instructions: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub classroom_id: Uuid,
    pub category_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub max_points: f64,
    pub due_date: Option<DateTime<Utc>>,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentQuery {
    pub classroom_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentScore {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    /// `None` until graded.
    pub points: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordScoreRequest {
    pub points: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Score row with grader stamp resolved by the service.
#[derive(Debug, Clone)]
pub struct ScoreEntry {
    pub assignment_id: Uuid,
    pub student_id: Uuid,
    pub points: Option<f64>,
    pub feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub graded_at: Option<DateTime<Utc>>,
    pub graded_by: Option<Uuid>,
}

/// One line of a student's grade report.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub assignment_id: Uuid,
    pub assignment_title: String,
    pub classroom_id: Uuid,
    pub category_id: Uuid,
    pub category_weight: f64,
    pub points: Option<f64>,
    pub max_points: f64,
    pub feedback: Option<String>,
    pub graded_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}
