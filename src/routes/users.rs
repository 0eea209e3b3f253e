use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    middleware::tenant::TenantContext,
    models::{
        auth::Session,
        user::{RegisterRequest, User, UserListQuery, UserPatch},
    },
    routes::PageQuery,
    services::{
        policy::{Action, Resource},
        users::UserService,
    },
    AppState,
};

pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(filter): Query<UserListQuery>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    session.require(Resource::Users, Action::Read)?;
    let users = UserService::list(state.storage.as_ref(), &session, filter.role, page.resolve(&state)).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    session: Session,
    TenantContext(tenant): TenantContext,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    session.require(Resource::Users, Action::Create)?;
    let user = UserService::create(&state.auth, state.storage.as_ref(), &tenant, &session, &body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    session.require(Resource::Users, Action::Update)?;
    Ok(Json(UserService::update(state.storage.as_ref(), &session, id, &body).await?))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session.require(Resource::Users, Action::Delete)?;
    UserService::deactivate(state.storage.as_ref(), &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
