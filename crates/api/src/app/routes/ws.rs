//! WebSocket endpoint backing the notification fan-out.
//!
//! Served on the same port as the HTTP API. Inbound client messages carry no
//! protocol; they are logged and otherwise ignored. Outbound traffic is
//! whatever the hub broadcasts, pushed verbatim.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Extension,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::app::services::AppServices;
use crate::notifications::NotificationHub;

pub async fn upgrade(
    Extension(services): Extension<Arc<AppServices>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let hub = services.hub.clone();
    ws.on_upgrade(move |socket| client_session(socket, hub))
}

async fn client_session(socket: WebSocket, hub: Arc<NotificationHub>) {
    let (client_id, mut outbound) = hub.register();
    info!(%client_id, "client connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            queued = outbound.recv() => match queued {
                Some(message) => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    info!(%client_id, %text, "received from client");
                }
                Some(Ok(Message::Binary(bytes))) => {
                    info!(%client_id, len = bytes.len(), "received binary frame from client");
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong answered by the library
                Some(Err(err)) => {
                    warn!(%client_id, error = %err, "websocket error");
                    break;
                }
            },
        }
    }

    hub.unregister(&client_id);
    info!(%client_id, "client disconnected");
}
