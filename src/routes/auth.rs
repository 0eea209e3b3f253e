use axum::{extract::State, http::StatusCode};

use crate::routes::extract::Json;
use crate::{
    error::AppError,
    middleware::{
        rate_limit::{check_rate_limit, login_key, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECS},
        tenant::TenantContext,
    },
    models::{
        auth::Session,
        user::{LoginRequest, LoginResponse, RegisterRequest, UserProfile},
    },
    services::users::UserService,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    if let Some(redis) = &state.redis {
        let mut redis = redis.clone();
        let key = login_key(&tenant.subdomain, &body.email);
        check_rate_limit(&mut redis, &key, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW_SECS).await?;
    }

    let response = state
        .auth
        .login(state.storage.as_ref(), &tenant, &body.email, &body.password)
        .await?;
    Ok(Json(response))
}

/// Creates the account and signs it in.
pub async fn register(
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    let user = UserService::self_register(&state.auth, state.storage.as_ref(), &tenant, &body).await?;
    let token = state.auth.issue_session(user.id, tenant.id, user.role)?;
    Ok((
        StatusCode::CREATED,
        Json(LoginResponse {
            token,
            user: UserProfile::from(user),
        }),
    ))
}

/// Revokes the presented token until its natural expiry.
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<StatusCode, AppError> {
    state
        .storage
        .revoke_session(session.tenant_id, session.jti, session.expires_at)
        .await?;
    tracing::info!(tenant = %session.subdomain, user = %session.user_id, "session revoked");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(State(state): State<AppState>, session: Session) -> Result<Json<UserProfile>, AppError> {
    Ok(Json(UserService::me(state.storage.as_ref(), &session).await?))
}
