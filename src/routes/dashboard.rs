use axum::extract::State;

use crate::routes::extract::Json;
use crate::{
    error::AppError,
    models::{auth::Session, dashboard::DashboardStats},
    services::{
        dashboard::DashboardService,
        policy::{Action, Resource},
    },
    AppState,
};

pub async fn stats(State(state): State<AppState>, session: Session) -> Result<Json<DashboardStats>, AppError> {
    session.require(Resource::Dashboard, Action::Read)?;
    Ok(Json(DashboardService::stats(state.storage.as_ref(), &session).await?))
}
