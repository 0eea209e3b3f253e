use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Role;

/// Claims embedded in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,       // user UUID
    pub tenant_id: String, // tenant UUID
    pub role: Role,
    pub jti: String, // token UUID (logout denylist key)
    pub exp: usize,
    pub iat: usize,
}

/// Identity asserted by a verified session token.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// An authenticated caller whose session tenant matches the request tenant.
/// Produced by the access-control extractor; every tenant-scoped handler
/// takes its tenant id from here and nowhere else.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub subdomain: String,
    pub role: Role,
    pub jti: Uuid,
    pub expires_at: DateTime<Utc>,
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
}
