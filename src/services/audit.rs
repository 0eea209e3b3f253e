use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::Storage,
    models::{audit::AuditEntry, auth::Session},
};

/// Appends an audit entry for a mutation performed by `session`.
/// Failures are logged and never fail the request that triggered them.
pub async fn log(store: &dyn Storage, session: &Session, entry: AuditEntry) {
    if let Err(e) = store.append_audit(session.tenant_id, &entry).await {
        tracing::warn!(
            tenant = %session.subdomain,
            action = %entry.action,
            "audit log insert failed: {e}"
        );
    }
}

/// Builds an entry stamped with the caller's identity and client metadata.
pub fn entry(session: &Session, action: &str, entity_type: &str, entity_id: Uuid) -> AuditEntry {
    AuditEntry {
        user_id: Some(session.user_id),
        action: action.to_string(),
        entity_type: entity_type.to_string(),
        entity_id: Some(entity_id),
        old_values: None,
        new_values: None,
        ip_address: session.client_ip.clone(),
        user_agent: session.user_agent.clone(),
    }
}

pub fn snapshot<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

impl AuditEntry {
    pub fn before<T: Serialize>(mut self, value: &T) -> Self {
        self.old_values = snapshot(value);
        self
    }

    pub fn after<T: Serialize>(mut self, value: &T) -> Self {
        self.new_values = snapshot(value);
        self
    }
}
