use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::PgStorage;
use crate::{
    db::{AttendanceStore, StoreResult},
    models::attendance::{AttendanceMark, AttendanceRecord},
};

#[async_trait]
impl AttendanceStore for PgStorage {
    async fn upsert_attendance(&self, tenant: Uuid, mark: &AttendanceMark) -> StoreResult<AttendanceRecord> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "INSERT INTO attendance_records
                 (tenant_id, student_id, classroom_id, date, status, arrival_time, notes, marked_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (tenant_id, student_id, date, classroom_id) DO UPDATE SET
                 status       = EXCLUDED.status,
                 arrival_time = EXCLUDED.arrival_time,
                 notes        = EXCLUDED.notes,
                 marked_by    = EXCLUDED.marked_by,
                 updated_at   = NOW()
             RETURNING *",
        )
        .bind(tenant)
        .bind(mark.student_id)
        .bind(mark.classroom_id)
        .bind(mark.date)
        .bind(mark.status)
        .bind(mark.arrival_time)
        .bind(&mark.notes)
        .bind(mark.marked_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn attendance_record(&self, tenant: Uuid, id: Uuid) -> StoreResult<Option<AttendanceRecord>> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records WHERE tenant_id = $1 AND id = $2",
        )
        .bind(tenant)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn attendance_by_date(
        &self,
        tenant: Uuid,
        date: NaiveDate,
        classroom: Option<Uuid>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records
             WHERE tenant_id = $1 AND date = $2 AND ($3::uuid IS NULL OR classroom_id = $3)
             ORDER BY created_at",
        )
        .bind(tenant)
        .bind(date)
        .bind(classroom)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn attendance_by_student(&self, tenant: Uuid, student: Uuid) -> StoreResult<Vec<AttendanceRecord>> {
        let records = sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance_records
             WHERE tenant_id = $1 AND student_id = $2
             ORDER BY date DESC",
        )
        .bind(tenant)
        .bind(student)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn count_present_on(&self, tenant: Uuid, date: NaiveDate) -> StoreResult<i64> {
        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM attendance_records
             WHERE tenant_id = $1 AND date = $2 AND status = 'present'",
        )
        .bind(tenant)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(n)
    }
}
