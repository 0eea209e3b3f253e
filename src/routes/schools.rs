use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        student::{Classroom, CreateClassroomRequest, CreateSchoolRequest, EnrollRequest, Enrollment, School},
    },
    services::{
        policy::{Action, Resource},
        students::SchoolService,
    },
    AppState,
};

pub async fn list_schools(State(state): State<AppState>, session: Session) -> Result<Json<Vec<School>>, AppError> {
    session.require(Resource::Schools, Action::Read)?;
    Ok(Json(SchoolService::list_schools(state.storage.as_ref(), &session).await?))
}

pub async fn create_school(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateSchoolRequest>,
) -> Result<(StatusCode, Json<School>), AppError> {
    session.require(Resource::Schools, Action::Create)?;
    let school = SchoolService::create_school(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(school)))
}

pub async fn list_classrooms(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Classroom>>, AppError> {
    session.require(Resource::Classrooms, Action::Read)?;
    Ok(Json(SchoolService::list_classrooms(state.storage.as_ref(), &session).await?))
}

pub async fn create_classroom(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateClassroomRequest>,
) -> Result<(StatusCode, Json<Classroom>), AppError> {
    session.require(Resource::Classrooms, Action::Create)?;
    let classroom = SchoolService::create_classroom(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(classroom)))
}

pub async fn enroll_student(
    State(state): State<AppState>,
    session: Session,
    Path(classroom_id): Path<Uuid>,
    Json(body): Json<EnrollRequest>,
) -> Result<(StatusCode, Json<Enrollment>), AppError> {
    session.require(Resource::Enrollments, Action::Create)?;
    let enrollment =
        SchoolService::enroll(state.storage.as_ref(), &session, classroom_id, body.student_id).await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}
