use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitStream, SinkExt, StreamExt};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    middleware::tenant::TenantContext,
    models::{auth::SessionIdentity, message::ClientFrame, tenant::Tenant},
    services::{metrics::OPEN_SOCKETS_GAUGE, realtime::Registration},
    AppState,
};

const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// GET /ws — the tenant comes from the upgrade request, the identity from
/// the first frame.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    TenantContext(tenant): TenantContext,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, tenant))
}

async fn handle_socket(socket: WebSocket, state: AppState, tenant: Tenant) {
    let (mut sender, mut receiver) = socket.split();

    let identity = match authenticate(&mut receiver, &state, &tenant).await {
        Ok(identity) => identity,
        Err(reason) => {
            warn!(tenant = %tenant.subdomain, "WebSocket auth failed: {reason}");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    let Registration { id, mut rx } = state.hub.register(identity.user_id, tenant.id, identity.role).await;
    OPEN_SOCKETS_GAUGE.inc();
    info!("WebSocket connected: user={} tenant={}", identity.user_id, tenant.subdomain);

    let auth_ok = json!({ "type": "auth_ok" }).to_string();
    if sender.send(Message::Text(auth_ok.into())).await.is_ok() {
        let pong = json!({ "type": "pong" }).to_string();
        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if matches!(serde_json::from_str::<ClientFrame>(text.as_str()), Ok(ClientFrame::Ping))
                            && sender.send(Message::Text(pong.clone().into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    state.hub.unregister(id).await;
    OPEN_SOCKETS_GAUGE.dec();
    info!("WebSocket disconnected: user={} tenant={}", identity.user_id, tenant.subdomain);
}

/// Waits for the `{type:"auth", token}` frame. Nothing is delivered to the
/// socket before this succeeds.
async fn authenticate(
    receiver: &mut SplitStream<WebSocket>,
    state: &AppState,
    tenant: &Tenant,
) -> Result<SessionIdentity, &'static str> {
    let first = tokio::time::timeout(AUTH_TIMEOUT, receiver.next())
        .await
        .map_err(|_| "no auth frame before timeout")?;

    let token = match first {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(ClientFrame::Auth { token }) => token,
            _ => return Err("first frame was not an auth frame"),
        },
        _ => return Err("first frame was not an auth frame"),
    };

    let mut identity = state.auth.verify_session(&token).map_err(|_| "invalid or expired token")?;
    if identity.tenant_id != tenant.id {
        return Err("token belongs to another tenant");
    }
    match state.storage.is_session_revoked(identity.jti).await {
        Ok(false) => {}
        Ok(true) => return Err("session revoked"),
        Err(_) => return Err("revocation check failed"),
    }
    match state.storage.user_by_id(tenant.id, identity.user_id).await {
        Ok(Some(user)) if user.is_active => {
            identity.role = user.role;
            Ok(identity)
        }
        Ok(_) => Err("account inactive"),
        Err(_) => Err("account lookup failed"),
    }
}
