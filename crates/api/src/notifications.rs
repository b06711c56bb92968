//! Real-time notification hub.
//!
//! Holds the set of live WebSocket clients and performs best-effort fan-out.
//! Broadcast is global: every connected client receives every message,
//! regardless of tenant. That mirrors the pipeline this replaces and is
//! flagged as a likely gap rather than corrected (see DESIGN.md).

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identifier of one connected client.
pub type ClientId = Uuid;

/// Process-wide set of live client connections.
///
/// State is mutated only by connect/disconnect; `broadcast` iterates the set
/// and must tolerate a client disconnecting mid-iteration (its queue send
/// fails, it is skipped and pruned, the broadcast continues).
#[derive(Debug, Default)]
pub struct NotificationHub {
    clients: DashMap<ClientId, mpsc::UnboundedSender<Message>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly connected client; the receiver is the client's
    /// outbound message queue.
    pub fn register(&self) -> (ClientId, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client_id = Uuid::now_v7();
        self.clients.insert(client_id, tx);
        (client_id, rx)
    }

    pub fn unregister(&self, client_id: &ClientId) {
        self.clients.remove(client_id);
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Push `payload` (serialized once) to every open client.
    ///
    /// Clients whose session ended are skipped silently and pruned; the
    /// broadcast itself never fails. Returns the number of clients the
    /// message was queued for.
    pub fn broadcast(&self, payload: &serde_json::Value) -> usize {
        let text = payload.to_string();
        let mut delivered = 0;

        self.clients.retain(|_, tx| {
            if tx.send(Message::Text(text.clone())).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadcast_reaches_open_clients_and_skips_closed_ones() {
        let hub = NotificationHub::new();

        let (_id1, mut rx1) = hub.register();
        let (_id2, mut rx2) = hub.register();
        let (_id3, rx3) = hub.register();
        drop(rx3); // client went away without unregistering

        let delivered = hub.broadcast(&json!({"msg": "x"}));
        assert_eq!(delivered, 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.try_recv().unwrap() {
                Message::Text(text) => {
                    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                    assert_eq!(value, json!({"msg": "x"}));
                }
                other => panic!("expected text frame, got {other:?}"),
            }
        }

        // The dead client was pruned during iteration.
        assert_eq!(hub.client_count(), 2);
    }

    #[test]
    fn unregister_removes_the_client() {
        let hub = NotificationHub::new();
        let (id, _rx) = hub.register();
        assert_eq!(hub.client_count(), 1);

        hub.unregister(&id);
        assert_eq!(hub.client_count(), 0);
        assert_eq!(hub.broadcast(&json!({"msg": "y"})), 0);
    }

    #[test]
    fn broadcast_with_no_clients_is_a_no_op() {
        let hub = NotificationHub::new();
        assert_eq!(hub.broadcast(&json!({"msg": "z"})), 0);
    }
}
