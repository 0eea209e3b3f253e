use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub description: String,
    pub achieved: bool,
    pub notes: Option<String>,
}

/// Write-once rollup of a student's standing for one reporting period.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionSnapshot {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    /// quarter_1, semester_1, ...
    pub reporting_period: String,
    pub overall_grade: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub behavior_notes: Option<String>,
    pub academic_notes: Option<String>,
    pub goals: Json<Vec<Goal>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSnapshotRequest {
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    pub reporting_period: String,
    pub behavior_notes: Option<String>,
    pub academic_notes: Option<String>,
    #[serde(default)]
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    pub reporting_period: String,
    pub overall_grade: Option<f64>,
    pub attendance_rate: Option<f64>,
    pub behavior_notes: Option<String>,
    pub academic_notes: Option<String>,
    pub goals: Vec<Goal>,
}
