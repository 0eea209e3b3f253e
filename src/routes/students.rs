use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        student::{CreateStudentRequest, LinkParentRequest, ParentLink, Student},
        user::UserProfile,
    },
    routes::PageQuery,
    services::{
        policy::{Action, Resource},
        students::StudentService,
    },
    AppState,
};

pub async fn list_students(
    State(state): State<AppState>,
    session: Session,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Student>>, AppError> {
    session.require(Resource::Students, Action::Read)?;
    Ok(Json(StudentService::list(state.storage.as_ref(), &session, page.resolve(&state)).await?))
}

pub async fn get_student(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Student>, AppError> {
    session.require(Resource::Students, Action::Read)?;
    Ok(Json(StudentService::visible(state.storage.as_ref(), &session, id).await?))
}

pub async fn create_student(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateStudentRequest>,
) -> Result<(StatusCode, Json<Student>), AppError> {
    session.require(Resource::Students, Action::Create)?;
    let student = StudentService::create(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_parents(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<UserProfile>>, AppError> {
    session.require(Resource::ParentLinks, Action::Read)?;
    Ok(Json(StudentService::parents(state.storage.as_ref(), &session, id).await?))
}

pub async fn link_parent(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<LinkParentRequest>,
) -> Result<(StatusCode, Json<ParentLink>), AppError> {
    session.require(Resource::ParentLinks, Action::Create)?;
    let link = StudentService::link_parent(state.storage.as_ref(), &session, id, &body).await?;
    Ok((StatusCode::CREATED, Json(link)))
}
