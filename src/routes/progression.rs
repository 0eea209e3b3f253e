use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        progression::{CreateSnapshotRequest, ProgressionSnapshot},
    },
    services::{
        policy::{Action, Resource},
        progression::ProgressionService,
    },
    AppState,
};

pub async fn create_snapshot(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateSnapshotRequest>,
) -> Result<(StatusCode, Json<ProgressionSnapshot>), AppError> {
    session.require(Resource::Progression, Action::Create)?;
    let snapshot = ProgressionService::create(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn student_progression(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ProgressionSnapshot>>, AppError> {
    session.require(Resource::Progression, Action::Read)?;
    Ok(Json(ProgressionService::for_student(state.storage.as_ref(), &session, id).await?))
}
