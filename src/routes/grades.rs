use axum::{extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        grade::{
            Assignment, AssignmentQuery, AssignmentScore, CreateAssignmentRequest, CreateGradeCategoryRequest,
            GradeCategory, GradeEntry, RecordScoreRequest,
        },
    },
    services::{
        grades::GradeService,
        policy::{Action, Resource},
    },
    AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradesQuery {
    pub classroom_id: Option<Uuid>,
}

pub async fn create_category(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateGradeCategoryRequest>,
) -> Result<(StatusCode, Json<GradeCategory>), AppError> {
    session.require(Resource::GradeCategories, Action::Create)?;
    let category = GradeService::create_category(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// GET /assignments?classroomId= — 400 without a classroom.
pub async fn list_assignments(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<AssignmentQuery>,
) -> Result<Json<Vec<Assignment>>, AppError> {
    session.require(Resource::Assignments, Action::Read)?;
    Ok(Json(GradeService::assignments(state.storage.as_ref(), &session, params.classroom_id).await?))
}

pub async fn create_assignment(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateAssignmentRequest>,
) -> Result<(StatusCode, Json<Assignment>), AppError> {
    session.require(Resource::Assignments, Action::Create)?;
    let assignment = GradeService::create_assignment(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn record_score(
    State(state): State<AppState>,
    session: Session,
    Path((assignment_id, student_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<RecordScoreRequest>,
) -> Result<Json<AssignmentScore>, AppError> {
    session.require(Resource::Scores, Action::Update)?;
    let score =
        GradeService::record_score(state.storage.as_ref(), &session, assignment_id, student_id, &body).await?;
    Ok(Json(score))
}

pub async fn student_grades(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Query(params): Query<GradesQuery>,
) -> Result<Json<Vec<GradeEntry>>, AppError> {
    session.require(Resource::Grades, Action::Read)?;
    let grades = GradeService::student_grades(state.storage.as_ref(), &session, id, params.classroom_id).await?;
    Ok(Json(grades))
}
