//! In-memory queue for tests/dev.
//!
//! Messages still cross a JSON boundary (serialize on publish, decode on
//! delivery) so decode failures behave exactly as they do on the real
//! transport. Durability is process-lifetime only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::queue::{ConsumerHandle, EventQueue, QueueError, QueueHandler};

struct QueueSlot {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    /// Present until a consumer claims the queue.
    rx: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl QueueSlot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Some(rx) }
    }
}

/// In-memory publish/consume queue.
///
/// - Declares queues lazily on first publish/consume (idempotent)
/// - Buffers published messages until a consumer registers
/// - One consumer per queue; failed deliveries are dropped, not requeued
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, QueueSlot>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload verbatim, bypassing serialization.
    ///
    /// Lets tests exercise the decode boundary with malformed wire data.
    pub fn publish_raw(&self, queue: &str, payload: Vec<u8>) {
        let mut queues = self.queues.lock().expect("queue map poisoned");
        let slot = queues.entry(queue.to_string()).or_insert_with(QueueSlot::new);
        let _ = slot.tx.send(payload);
    }
}

impl core::fmt::Debug for InMemoryQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let queues = self.queues.lock().expect("queue map poisoned");
        f.debug_struct("InMemoryQueue")
            .field("queues", &queues.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl<M> EventQueue<M> for InMemoryQueue
where
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn publish(&self, queue: &str, message: &M) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(message).map_err(|e| QueueError::Serialize(e.to_string()))?;

        let mut queues = self.queues.lock().expect("queue map poisoned");
        let slot = queues.entry(queue.to_string()).or_insert_with(QueueSlot::new);
        slot.tx
            .send(payload)
            .map_err(|_| QueueError::BrokerUnavailable("queue closed".to_string()))
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler<M>>,
    ) -> Result<ConsumerHandle, QueueError> {
        let mut rx = {
            let mut queues = self.queues.lock().expect("queue map poisoned");
            let slot = queues.entry(queue.to_string()).or_insert_with(QueueSlot::new);
            slot.rx
                .take()
                .ok_or_else(|| QueueError::ConsumerExists(queue.to_string()))?
        };

        let queue_name = queue.to_string();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    next = rx.recv() => match next {
                        Some(raw) => deliver(&queue_name, raw, handler.as_ref()).await,
                        None => break,
                    },
                }
            }
        });

        Ok(ConsumerHandle::new(shutdown_tx, join))
    }
}

/// Decode and process one delivery; failures drop the message.
async fn deliver<M>(queue: &str, raw: Vec<u8>, handler: &dyn QueueHandler<M>)
where
    M: DeserializeOwned + Send + 'static,
{
    let message: M = match serde_json::from_slice(&raw) {
        Ok(m) => m,
        Err(err) => {
            warn!(queue, error = %err, "dropping undecodable message");
            return;
        }
    };

    if let Err(err) = handler.handle(message).await {
        warn!(queue, error = ?err, "handler failed; message dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orderflow_core::TenantId;
    use orderflow_orders::{LineItem, OrderEvent, OrderPayload, OrderStatus};

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<OrderEvent>>,
        fail_for_user: Option<String>,
    }

    #[async_trait]
    impl QueueHandler<OrderEvent> for Recorder {
        async fn handle(&self, message: OrderEvent) -> anyhow::Result<()> {
            if let Some(fail_for) = &self.fail_for_user {
                let OrderEvent::OrderCreated { data, .. } = &message;
                if &data.user_id == fail_for {
                    anyhow::bail!("simulated persistence failure");
                }
            }
            self.seen.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn event(tenant: &str, user: &str) -> OrderEvent {
        OrderEvent::OrderCreated {
            tenant_id: TenantId::new(tenant).unwrap(),
            data: OrderPayload {
                user_id: user.to_string(),
                line_items: vec![LineItem {
                    product_id: "prod-1".to_string(),
                    quantity: 1,
                }],
                total_amount: 10.0,
                status: OrderStatus::Pending,
            },
        }
    }

    async fn seen_eventually(recorder: &Recorder, count: usize) -> Vec<OrderEvent> {
        for _ in 0..100 {
            {
                let seen = recorder.seen.lock().unwrap();
                if seen.len() >= count {
                    return seen.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("handler did not observe {count} message(s) in time");
    }

    #[tokio::test]
    async fn publish_then_consume_reconstructs_the_event() {
        let queue = InMemoryQueue::new();
        let recorder = Arc::new(Recorder::default());

        let published = event("acme", "user-1");
        queue.publish("orderQueue", &published).await.unwrap();

        let _consumer = queue
            .consume("orderQueue", recorder.clone() as Arc<dyn QueueHandler<OrderEvent>>)
            .await
            .unwrap();

        let seen = seen_eventually(&recorder, 1).await;
        assert_eq!(seen[0], published);
        assert_eq!(seen[0].tenant_id().as_str(), "acme");
    }

    #[tokio::test]
    async fn failed_delivery_is_dropped_and_later_events_still_process() {
        let queue = InMemoryQueue::new();
        let recorder = Arc::new(Recorder {
            fail_for_user: Some("poison".to_string()),
            ..Default::default()
        });

        let _consumer = queue
            .consume("orderQueue", recorder.clone() as Arc<dyn QueueHandler<OrderEvent>>)
            .await
            .unwrap();

        queue.publish("orderQueue", &event("acme", "poison")).await.unwrap();
        queue.publish("orderQueue", &event("acme", "user-2")).await.unwrap();

        let seen = seen_eventually(&recorder, 1).await;
        assert_eq!(seen.len(), 1);
        let OrderEvent::OrderCreated { data, .. } = &seen[0];
        assert_eq!(data.user_id, "user-2");
    }

    #[tokio::test]
    async fn undecodable_payload_does_not_crash_the_consumer_loop() {
        let queue = InMemoryQueue::new();
        let recorder = Arc::new(Recorder::default());

        let _consumer = queue
            .consume("orderQueue", recorder.clone() as Arc<dyn QueueHandler<OrderEvent>>)
            .await
            .unwrap();

        // Missing tenantId: fails decode at the boundary, dropped.
        queue.publish_raw(
            "orderQueue",
            br#"{"kind":"order_created","data":{"userId":"u","lineItems":[],"totalAmount":1.0}}"#
                .to_vec(),
        );
        queue.publish_raw("orderQueue", b"not json at all".to_vec());
        queue.publish("orderQueue", &event("acme", "user-3")).await.unwrap();

        let seen = seen_eventually(&recorder, 1).await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].tenant_id().as_str(), "acme");
    }

    #[tokio::test]
    async fn redelivery_is_not_deduplicated() {
        // Publishing the same event twice produces two deliveries; the
        // pipeline has no idempotence guarantee and consumers must not
        // assume dedup.
        let queue = InMemoryQueue::new();
        let recorder = Arc::new(Recorder::default());

        let _consumer = queue
            .consume("orderQueue", recorder.clone() as Arc<dyn QueueHandler<OrderEvent>>)
            .await
            .unwrap();

        let duplicated = event("acme", "user-1");
        queue.publish("orderQueue", &duplicated).await.unwrap();
        queue.publish("orderQueue", &duplicated).await.unwrap();

        let seen = seen_eventually(&recorder, 2).await;
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn second_consumer_registration_is_rejected() {
        let queue = InMemoryQueue::new();
        let recorder = Arc::new(Recorder::default());

        let _first = queue
            .consume("orderQueue", recorder.clone() as Arc<dyn QueueHandler<OrderEvent>>)
            .await
            .unwrap();

        let second = EventQueue::<OrderEvent>::consume(
            &queue,
            "orderQueue",
            recorder as Arc<dyn QueueHandler<OrderEvent>>,
        )
        .await;
        assert!(matches!(second, Err(QueueError::ConsumerExists(_))));
    }
}
