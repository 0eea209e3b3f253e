use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    /// Only a student who showed up has an arrival time.
    pub fn has_arrival(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub arrival_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub marked_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAttendanceRequest {
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    pub date: Option<NaiveDate>,
    pub status: AttendanceStatus,
    pub arrival_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAttendanceRequest {
    pub status: Option<AttendanceStatus>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

/// Fully resolved row contents, written by insert-or-update.
#[derive(Debug, Clone)]
pub struct AttendanceMark {
    pub student_id: Uuid,
    pub classroom_id: Uuid,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub arrival_time: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub marked_by: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceQuery {
    pub date: Option<NaiveDate>,
    pub classroom_id: Option<Uuid>,
}
