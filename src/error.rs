use std::collections::BTreeMap;

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::StoreError;

/// Every failure a request can end in. Each variant maps to one fixed status
/// and a client-safe message; internal details are only logged.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: BTreeMap<String, String>,
    },

    #[error("Tenant identifier required")]
    TenantIdentifierMissing,

    #[error("Invalid tenant identifier")]
    InvalidTenantIdentifier,

    #[error("Tenant not found")]
    TenantNotFound,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Rendered as a generic "Forbidden" so the response does not reveal
    /// which tenant the session belongs to.
    #[error("Forbidden")]
    TenantMismatch,

    #[error("Forbidden")]
    RoleNotPermitted,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("User already exists")]
    UserAlreadyExists,

    #[error("{0}")]
    Conflict(String),

    #[error("Too many attempts, try again later")]
    RateLimited,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.to_string());
        AppError::Validation {
            message: "Validation failed".to_string(),
            fields,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::TenantIdentifierMissing
            | AppError::InvalidTenantIdentifier => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated | AppError::InvalidSession | AppError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            AppError::TenantMismatch | AppError::RoleNotPermitted => StatusCode::FORBIDDEN,
            AppError::TenantNotFound | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UserAlreadyExists | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            AppError::Validation { message, fields } => {
                json!({ "error": message, "fields": fields })
            }
            AppError::Internal(e) => {
                tracing::error!("internal error: {e:#}");
                json!({ "error": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

// Malformed bodies, query strings and path segments are validation failures,
// keyed by the part of the request that failed to parse.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", &rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", &rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("path", &rejection.body_text())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Internal(e)
    }
}

/// Accumulates field-level validation failures.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.0.entry(field.to_string()).or_insert_with(|| message.to_string());
        }
        self
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation {
                message: "Validation failed".to_string(),
                fields: self.0,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_mismatch_and_role_denial_look_identical() {
        assert_eq!(AppError::TenantMismatch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::TenantMismatch.to_string(), AppError::RoleNotPermitted.to_string());
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused on 10.0.0.3"));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn field_errors_keep_first_message_per_field() {
        let mut errors = FieldErrors::new();
        errors
            .check(false, "email", "Email is invalid")
            .check(false, "email", "second")
            .check(true, "password", "never");
        match errors.finish() {
            Err(AppError::Validation { fields, .. }) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields["email"], "Email is invalid");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
