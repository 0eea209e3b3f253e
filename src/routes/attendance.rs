use axum::extract::State;
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        attendance::{AttendanceQuery, AttendanceRecord, RecordAttendanceRequest, UpdateAttendanceRequest},
        auth::Session,
    },
    services::{
        attendance::AttendanceService,
        policy::{Action, Resource},
    },
    AppState,
};

pub async fn list_attendance(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<AttendanceQuery>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    session.require(Resource::Attendance, Action::Read)?;
    let rows =
        AttendanceService::by_date(state.storage.as_ref(), &session, params.date, params.classroom_id).await?;
    Ok(Json(rows))
}

/// POST /attendance — one row per student, date and classroom; re-marking overwrites.
pub async fn record_attendance(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RecordAttendanceRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    session.require(Resource::Attendance, Action::Create)?;
    Ok(Json(AttendanceService::record(state.storage.as_ref(), &state.hub, &session, &body).await?))
}

pub async fn update_attendance(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAttendanceRequest>,
) -> Result<Json<AttendanceRecord>, AppError> {
    session.require(Resource::Attendance, Action::Update)?;
    let record = AttendanceService::update(state.storage.as_ref(), &state.hub, &session, id, &body).await?;
    Ok(Json(record))
}

/// GET /students/{id}/attendance — parents may read their own children's history.
pub async fn student_attendance(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    session.require(Resource::Students, Action::Read)?;
    Ok(Json(AttendanceService::by_student(state.storage.as_ref(), &session, id).await?))
}
