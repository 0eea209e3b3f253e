use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::routes::extract::{Json, Path, Query};
use crate::{
    error::AppError,
    models::{
        auth::Session,
        message::{Conversation, CreateConversationRequest, CreateMessageRequest, Message},
    },
    routes::PageQuery,
    services::{
        messaging::MessagingService,
        policy::{Action, Resource},
    },
    AppState,
};

/// GET /conversations — the caller's conversations, most recently active first.
pub async fn list_conversations(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<Conversation>>, AppError> {
    session.require(Resource::Conversations, Action::Read)?;
    Ok(Json(MessagingService::list_conversations(state.storage.as_ref(), &session).await?))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<Conversation>), AppError> {
    session.require(Resource::Conversations, Action::Create)?;
    let conversation = MessagingService::create_conversation(state.storage.as_ref(), &session, &body).await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /conversations/{id}/messages — oldest first, the latest `limit` only.
pub async fn list_messages(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    session.require(Resource::Messages, Action::Read)?;
    let messages = MessagingService::messages(state.storage.as_ref(), &session, id, page.resolve(&state)).await?;
    Ok(Json(messages))
}

pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    session.require(Resource::Messages, Action::Create)?;
    let message = MessagingService::send(state.storage.as_ref(), &state.hub, &session, id, &body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn mark_read(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    session.require(Resource::Messages, Action::Update)?;
    MessagingService::mark_read(state.storage.as_ref(), &session, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
