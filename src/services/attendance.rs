use chrono::{NaiveDate, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::{
    db::Storage,
    error::AppError,
    models::{
        attendance::{AttendanceMark, AttendanceRecord, RecordAttendanceRequest, UpdateAttendanceRequest},
        auth::Session,
        user::Role,
    },
    services::{
        realtime::{Audience, Event, Hub},
        students::StudentService,
    },
};

pub struct AttendanceService;

impl AttendanceService {
    /// Insert-or-update the day's row for (student, date, classroom).
    pub async fn record(
        store: &dyn Storage,
        hub: &Hub,
        session: &Session,
        req: &RecordAttendanceRequest,
    ) -> Result<AttendanceRecord, AppError> {
        store
            .student(session.tenant_id, req.student_id)
            .await?
            .ok_or(AppError::NotFound("Student"))?;
        store
            .classroom(session.tenant_id, req.classroom_id)
            .await?
            .ok_or(AppError::NotFound("Classroom"))?;

        let arrival_time = if req.status.has_arrival() {
            req.arrival_time.or_else(|| Some(Utc::now()))
        } else {
            None
        };

        let mark = AttendanceMark {
            student_id: req.student_id,
            classroom_id: req.classroom_id,
            date: req.date.unwrap_or_else(|| Utc::now().date_naive()),
            status: req.status,
            arrival_time,
            notes: req.notes.clone(),
            marked_by: session.user_id,
        };
        let record = store.upsert_attendance(session.tenant_id, &mark).await?;
        Self::broadcast(store, hub, session, &record).await?;
        Ok(record)
    }

    pub async fn update(
        store: &dyn Storage,
        hub: &Hub,
        session: &Session,
        id: Uuid,
        req: &UpdateAttendanceRequest,
    ) -> Result<AttendanceRecord, AppError> {
        let existing = store
            .attendance_record(session.tenant_id, id)
            .await?
            .ok_or(AppError::NotFound("Attendance record"))?;

        let status = req.status.unwrap_or(existing.status);
        let arrival_time = if status.has_arrival() {
            req.arrival_time
                .or(existing.arrival_time)
                .or_else(|| Some(Utc::now()))
        } else {
            None
        };

        let mark = AttendanceMark {
            student_id: existing.student_id,
            classroom_id: existing.classroom_id,
            date: existing.date,
            status,
            arrival_time,
            notes: req.notes.clone().or(existing.notes),
            marked_by: session.user_id,
        };
        let record = store.upsert_attendance(session.tenant_id, &mark).await?;
        Self::broadcast(store, hub, session, &record).await?;
        Ok(record)
    }

    pub async fn by_date(
        store: &dyn Storage,
        session: &Session,
        date: Option<NaiveDate>,
        classroom: Option<Uuid>,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        Ok(store.attendance_by_date(session.tenant_id, date, classroom).await?)
    }

    pub async fn by_student(
        store: &dyn Storage,
        session: &Session,
        student_id: Uuid,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        StudentService::visible(store, session, student_id).await?;
        Ok(store.attendance_by_student(session.tenant_id, student_id).await?)
    }

    /// Staff of the tenant and the student's own parents hear about it.
    async fn broadcast(
        store: &dyn Storage,
        hub: &Hub,
        session: &Session,
        record: &AttendanceRecord,
    ) -> Result<(), AppError> {
        let data = json!(record);
        hub.publish(
            Event::new(
                session.tenant_id,
                Audience::Tenant { roles: Some(vec![Role::Admin, Role::Teacher]) },
                "attendance_update",
                data.clone(),
            )
            .excluding(session.user_id),
        )
        .await;

        let parents = store.parents_of(session.tenant_id, record.student_id).await?;
        if !parents.is_empty() {
            hub.publish(Event::new(
                session.tenant_id,
                Audience::Users { ids: parents },
                "attendance_update",
                data,
            ))
            .await;
        }
        Ok(())
    }
}
