use async_trait::async_trait;
use sqlx::types::Json;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{ProgressionStore, StoreError, StoreResult},
    models::progression::{NewSnapshot, ProgressionSnapshot},
};

#[async_trait]
impl ProgressionStore for PgStorage {
    async fn create_snapshot(&self, tenant: Uuid, new: &NewSnapshot) -> StoreResult<ProgressionSnapshot> {
        sqlx::query_as::<_, ProgressionSnapshot>(
            "INSERT INTO progression_snapshots
                 (tenant_id, student_id, classroom_id, reporting_period, overall_grade,
                  attendance_rate, behavior_notes, academic_notes, goals)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
        )
        .bind(tenant)
        .bind(new.student_id)
        .bind(new.classroom_id)
        .bind(&new.reporting_period)
        .bind(new.overall_grade)
        .bind(new.attendance_rate)
        .bind(&new.behavior_notes)
        .bind(&new.academic_notes)
        .bind(Json(&new.goals))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict("Snapshot already exists for this reporting period".into())
            }
            other => other,
        })
    }

    async fn snapshots_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<ProgressionSnapshot>> {
        let rows = sqlx::query_as::<_, ProgressionSnapshot>(
            "SELECT * FROM progression_snapshots
             WHERE tenant_id = $1 AND student_id = $2
             ORDER BY created_at DESC",
        )
        .bind(tenant)
        .bind(student)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
