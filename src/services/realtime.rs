//! Real-time fan-out. Each process keeps a registry of authenticated
//! sockets; an event names its tenant and audience and is delivered only to
//! matching connections. With Redis configured, events go through a shared
//! channel so every process delivers to its own sockets.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    models::{message::WsEnvelope, user::Role},
    services::metrics::EVENTS_DELIVERED_COUNTER,
};

pub const RELAY_CHANNEL: &str = "school:events";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    /// Every connection of the tenant, optionally only some roles.
    Tenant { roles: Option<Vec<Role>> },
    Users { ids: Vec<Uuid> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub tenant_id: Uuid,
    pub audience: Audience,
    /// Usually the originator.
    pub exclude: Option<Uuid>,
    pub envelope: WsEnvelope,
}

impl Event {
    pub fn new(tenant_id: Uuid, audience: Audience, kind: &str, data: Value) -> Self {
        Self {
            tenant_id,
            audience,
            exclude: None,
            envelope: WsEnvelope {
                kind: kind.to_string(),
                data,
            },
        }
    }

    pub fn excluding(mut self, user_id: Uuid) -> Self {
        self.exclude = Some(user_id);
        self
    }

    fn reaches(&self, conn: &Connection) -> bool {
        if conn.tenant_id != self.tenant_id || self.exclude == Some(conn.user_id) {
            return false;
        }
        match &self.audience {
            Audience::Tenant { roles: None } => true,
            Audience::Tenant { roles: Some(roles) } => roles.contains(&conn.role),
            Audience::Users { ids } => ids.contains(&conn.user_id),
        }
    }
}

struct Connection {
    user_id: Uuid,
    tenant_id: Uuid,
    role: Role,
    tx: mpsc::UnboundedSender<String>,
}

/// Handle returned by `Hub::register`; frames for the socket arrive on `rx`.
pub struct Registration {
    pub id: Uuid,
    pub rx: mpsc::UnboundedReceiver<String>,
}

#[derive(Default)]
pub struct Hub {
    connections: RwLock<HashMap<Uuid, Connection>>,
    relay: Option<redis::aio::MultiplexedConnection>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes through Redis instead of delivering directly. Pair with
    /// `spawn_relay_listener` so relayed events reach local sockets.
    pub fn with_relay(relay: redis::aio::MultiplexedConnection) -> Self {
        Self {
            connections: RwLock::default(),
            relay: Some(relay),
        }
    }

    pub async fn register(&self, user_id: Uuid, tenant_id: Uuid, role: Role) -> Registration {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections.write().await.insert(
            id,
            Connection {
                user_id,
                tenant_id,
                role,
                tx,
            },
        );
        Registration { id, rx }
    }

    pub async fn unregister(&self, id: Uuid) {
        self.connections.write().await.remove(&id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn publish(&self, event: Event) {
        if let Some(conn) = &self.relay {
            match serde_json::to_string(&event) {
                Ok(payload) => {
                    let mut conn = conn.clone();
                    let res: redis::RedisResult<i64> = redis::cmd("PUBLISH")
                        .arg(RELAY_CHANNEL)
                        .arg(payload)
                        .query_async(&mut conn)
                        .await;
                    match res {
                        Ok(_) => return,
                        Err(e) => warn!("event relay publish failed, delivering locally: {e}"),
                    }
                }
                Err(e) => warn!("event serialization failed: {e}"),
            }
        }
        self.deliver_local(&event).await;
    }

    /// Sends the event to matching sockets of this process. Returns how
    /// many received it.
    pub async fn deliver_local(&self, event: &Event) -> usize {
        let frame = match serde_json::to_string(&event.envelope) {
            Ok(f) => f,
            Err(e) => {
                warn!("envelope serialization failed: {e}");
                return 0;
            }
        };

        let connections = self.connections.read().await;
        let delivered = connections
            .values()
            .filter(|c| event.reaches(c))
            .filter(|c| c.tx.send(frame.clone()).is_ok())
            .count();

        EVENTS_DELIVERED_COUNTER
            .with_label_values(&[event.envelope.kind.as_str()])
            .inc_by(delivered as f64);
        delivered
    }

    /// Subscribes to the relay channel and delivers every relayed event to
    /// local sockets. Runs until the subscription ends.
    pub fn spawn_relay_listener(self: Arc<Self>, client: redis::Client) {
        tokio::spawn(async move {
            let mut pubsub = match client.get_async_pubsub().await {
                Ok(p) => p,
                Err(e) => {
                    warn!("Redis pubsub error: {e}");
                    return;
                }
            };
            if let Err(e) = pubsub.subscribe(RELAY_CHANNEL).await {
                warn!("Redis subscribe error: {e}");
                return;
            }
            info!("Relaying real-time events through {RELAY_CHANNEL}");

            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                match serde_json::from_str::<Event>(&payload) {
                    Ok(event) => {
                        self.deliver_local(&event).await;
                    }
                    Err(e) => warn!("dropping malformed relayed event: {e}"),
                }
            }
            warn!("event relay subscription ended");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn delivery_never_crosses_tenants() {
        let hub = Hub::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut in_a = hub.register(Uuid::new_v4(), a, Role::Parent).await;
        let mut in_b = hub.register(Uuid::new_v4(), b, Role::Parent).await;

        let sent = hub
            .deliver_local(&Event::new(a, Audience::Tenant { roles: None }, "announcement", json!({})))
            .await;

        assert_eq!(sent, 1);
        assert!(in_a.rx.try_recv().is_ok());
        assert!(in_b.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn user_audience_skips_everyone_else_and_the_excluded_sender() {
        let hub = Hub::new();
        let tenant = Uuid::new_v4();
        let (sender, peer, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut s = hub.register(sender, tenant, Role::Teacher).await;
        let mut p = hub.register(peer, tenant, Role::Parent).await;
        let mut o = hub.register(outsider, tenant, Role::Parent).await;

        let event = Event::new(
            tenant,
            Audience::Users { ids: vec![sender, peer] },
            "new_message",
            json!({ "content": "hi" }),
        )
        .excluding(sender);
        assert_eq!(hub.deliver_local(&event).await, 1);

        let frame: WsEnvelope = serde_json::from_str(&p.rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame.kind, "new_message");
        assert_eq!(frame.data["content"], "hi");
        assert!(s.rx.try_recv().is_err());
        assert!(o.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn role_audience_filters_by_role() {
        let hub = Hub::new();
        let tenant = Uuid::new_v4();
        let mut teacher = hub.register(Uuid::new_v4(), tenant, Role::Teacher).await;
        let mut parent = hub.register(Uuid::new_v4(), tenant, Role::Parent).await;

        let event = Event::new(
            tenant,
            Audience::Tenant { roles: Some(vec![Role::Admin, Role::Teacher]) },
            "attendance_update",
            json!({}),
        );
        assert_eq!(hub.deliver_local(&event).await, 1);
        assert!(teacher.rx.try_recv().is_ok());
        assert!(parent.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregistered_sockets_receive_nothing() {
        let hub = Hub::new();
        let tenant = Uuid::new_v4();
        let reg = hub.register(Uuid::new_v4(), tenant, Role::Admin).await;
        hub.unregister(reg.id).await;

        assert_eq!(hub.connection_count().await, 0);
        let event = Event::new(tenant, Audience::Tenant { roles: None }, "announcement", json!({}));
        assert_eq!(hub.deliver_local(&event).await, 0);
    }

    #[test]
    fn relayed_event_survives_serialization() {
        let event = Event::new(
            Uuid::new_v4(),
            Audience::Tenant { roles: Some(vec![Role::Teacher]) },
            "attendance_update",
            json!({ "status": "late" }),
        )
        .excluding(Uuid::new_v4());
        let back: Event = serde_json::from_str(&serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!(back.audience, event.audience);
        assert_eq!(back.exclude, event.exclude);
        assert_eq!(back.envelope.data["status"], "late");
    }
}
