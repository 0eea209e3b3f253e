use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{error::AppError, models::tenant::Tenant, services::tenants::is_valid_subdomain, AppState};

/// The tenant named by the request, looked up in storage.
#[derive(Debug, Clone)]
pub struct TenantContext(pub Tenant);

impl FromRequestParts<AppState> for TenantContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let subdomain = tenant_identifier(parts)?;
        let tenant = state
            .storage
            .tenant_by_subdomain(&subdomain)
            .await?
            .ok_or(AppError::TenantNotFound)?;
        Ok(TenantContext(tenant))
    }
}

#[derive(Debug, Deserialize)]
struct TenantParam {
    tenant: Option<String>,
}

/// Reads the tenant identifier from the `X-Tenant` header, falling back to
/// the `tenant` query parameter (used by browsers opening the socket).
pub fn tenant_identifier(parts: &Parts) -> Result<String, AppError> {
    let header = parts
        .headers
        .get("X-Tenant")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty());

    let slug = match header {
        Some(s) => s,
        None => Query::<TenantParam>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(p)| p.tenant)
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .ok_or(AppError::TenantIdentifierMissing)?,
    };

    if !is_valid_subdomain(&slug) {
        return Err(AppError::InvalidTenantIdentifier);
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn header_wins_over_query() {
        let p = parts(
            Request::builder()
                .uri("/ws?tenant=school-b")
                .header("X-Tenant", "School-A")
                .body(())
                .unwrap(),
        );
        assert_eq!(tenant_identifier(&p).unwrap(), "school-a");
    }

    #[test]
    fn query_param_is_the_fallback() {
        let p = parts(Request::builder().uri("/ws?tenant=school-b&x=1").body(()).unwrap());
        assert_eq!(tenant_identifier(&p).unwrap(), "school-b");
    }

    #[test]
    fn missing_and_malformed_identifiers() {
        let p = parts(Request::builder().uri("/students").body(()).unwrap());
        assert!(matches!(tenant_identifier(&p), Err(AppError::TenantIdentifierMissing)));

        let p = parts(
            Request::builder()
                .uri("/students")
                .header("X-Tenant", "school_a;drop")
                .body(())
                .unwrap(),
        );
        assert!(matches!(tenant_identifier(&p), Err(AppError::InvalidTenantIdentifier)));
    }
}
