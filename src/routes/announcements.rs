use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        announcement::{Announcement, CreateAnnouncementRequest, UpdateAnnouncementRequest},
        auth::Session,
    },
    routes::PageQuery,
    services::{
        announcements::AnnouncementService,
        policy::{Action, Resource},
    },
    AppState,
};

/// GET /announcements — active, unexpired, newest first.
pub async fn list_announcements(
    State(state): State<AppState>,
    session: Session,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    session.require(Resource::Announcements, Action::Read)?;
    let list = AnnouncementService::list(state.storage.as_ref(), &session, page.resolve(&state)).await?;
    Ok(Json(list))
}

/// GET /announcements/{id} — counts as a view.
pub async fn get_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<Json<Announcement>, AppError> {
    session.require(Resource::Announcements, Action::Read)?;
    Ok(Json(AnnouncementService::view(state.storage.as_ref(), &session, id).await?))
}

pub async fn create_announcement(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    session.require(Resource::Announcements, Action::Create)?;
    let announcement =
        AnnouncementService::create(state.storage.as_ref(), &state.hub, &session, &body).await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn update_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>, AppError> {
    session.require(Resource::Announcements, Action::Update)?;
    Ok(Json(AnnouncementService::update(state.storage.as_ref(), &session, id, &body).await?))
}

/// DELETE /announcements/{id} — soft delete, repeatable.
pub async fn delete_announcement(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session.require(Resource::Announcements, Action::Delete)?;
    AnnouncementService::delete(state.storage.as_ref(), &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
