use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{error::AppError, AppState};

/// Operator access for tenant provisioning, checked against `PLATFORM_KEY`.
/// Always rejects when no key is configured.
pub struct PlatformAuth;

impl FromRequestParts<AppState> for PlatformAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let expected = state
            .config
            .platform_key
            .as_deref()
            .ok_or(AppError::RoleNotPermitted)?;

        let key = parts
            .headers
            .get("X-Platform-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        if key != expected {
            return Err(AppError::RoleNotPermitted);
        }
        Ok(PlatformAuth)
    }
}
