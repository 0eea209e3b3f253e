use axum::extract::State;

use crate::routes::extract::Json;
use crate::{
    error::AppError,
    models::{
        auth::Session,
        tenant::{Subscription, UpsertSubscriptionRequest},
    },
    services::{
        policy::{Action, Resource},
        subscriptions::SubscriptionService,
    },
    AppState,
};

pub async fn get_subscription(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Subscription>, AppError> {
    session.require(Resource::Subscription, Action::Read)?;
    Ok(Json(SubscriptionService::get(state.storage.as_ref(), &session).await?))
}

pub async fn upsert_subscription(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<UpsertSubscriptionRequest>,
) -> Result<Json<Subscription>, AppError> {
    session.require(Resource::Subscription, Action::Update)?;
    Ok(Json(SubscriptionService::upsert(state.storage.as_ref(), &session, &body).await?))
}
