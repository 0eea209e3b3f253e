use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        form::{CreateFormRequest, FormListQuery, FormRequest, ProcessFormRequest},
    },
    routes::PageQuery,
    services::{
        forms::FormService,
        policy::{Action, Resource},
    },
    AppState,
};

/// GET /forms?status= — parents only see the requests they filed.
pub async fn list_forms(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<FormListQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<FormRequest>>, AppError> {
    session.require(Resource::Forms, Action::Read)?;
    let forms = FormService::list(state.storage.as_ref(), &session, filter.status, page.resolve(&state)).await?;
    Ok(Json(forms))
}

pub async fn get_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<FormRequest>, AppError> {
    session.require(Resource::Forms, Action::Read)?;
    Ok(Json(FormService::get(state.storage.as_ref(), &session, id).await?))
}

pub async fn create_form(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateFormRequest>,
) -> Result<(StatusCode, Json<FormRequest>), AppError> {
    session.require(Resource::Forms, Action::Create)?;
    let form = FormService::create(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(form)))
}

/// PUT /forms/{id} — approve or reject a pending request.
pub async fn process_form(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<ProcessFormRequest>,
) -> Result<Json<FormRequest>, AppError> {
    session.require(Resource::FormDecisions, Action::Update)?;
    Ok(Json(FormService::decide(state.storage.as_ref(), &session, id, &body).await?))
}
