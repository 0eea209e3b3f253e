use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    error::AppError,
    middleware::tenant::TenantContext,
    models::auth::Session,
    AppState,
};

/// Access chain for every tenant-scoped route: bearer token, tenant
/// resolution, then session tenant == request tenant with no bypass, then
/// revocation and the account's current status and role.
/// Role checks follow in the handler through `Session::require`.
impl FromRequestParts<AppState> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AppError::Unauthenticated)?;
        let identity = state.auth.verify_session(token)?;

        let TenantContext(tenant) = TenantContext::from_request_parts(parts, state).await?;
        if identity.tenant_id != tenant.id {
            tracing::warn!(
                user = %identity.user_id,
                tenant = %tenant.subdomain,
                "session presented for a different tenant"
            );
            return Err(AppError::TenantMismatch);
        }

        if state.storage.is_session_revoked(identity.jti).await? {
            return Err(AppError::InvalidSession);
        }

        // Deactivation and role changes apply to tokens already issued.
        let user = state
            .storage
            .user_by_id(tenant.id, identity.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::InvalidSession)?;

        Ok(Session {
            user_id: identity.user_id,
            tenant_id: tenant.id,
            subdomain: tenant.subdomain,
            role: user.role,
            jti: identity.jti,
            expires_at: identity.expires_at,
            client_ip: client_ip(&parts.headers),
            user_agent: parts
                .headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Client address as reported by the reverse proxy.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(|s| s.trim().to_string())
        })
}
