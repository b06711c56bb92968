//! Redis Streams-backed event queue (durable, explicit acknowledgment).
//!
//! - **Publish**: `XADD` appends the JSON payload; `XGROUP CREATE … MKSTREAM`
//!   is the idempotent queue declare.
//! - **Consume**: a single background task reads via `XREADGROUP` and
//!   processes deliveries one at a time, in stream order.
//! - **Ack/drop**: a successfully handled message is `XACK`ed. A failed or
//!   undecodable message is *also* `XACK`ed — removed without requeue — so a
//!   transient downstream failure permanently loses that delivery. That
//!   matches the pipeline's specified behavior; a dead-letter stream is a
//!   deliberate non-change (see DESIGN.md).
//! - Unacknowledged deliveries (consumer died mid-message) stay in the
//!   pending entry list and are redelivered on restart, which is where the
//!   at-least-once/duplicate-order caveat comes from.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{info, warn};

use orderflow_events::{ConsumerHandle, EventQueue, QueueError, QueueHandler};

/// How long one `XREADGROUP` blocks waiting for deliveries.
const BLOCK_MS: u64 = 1000;

/// Deliveries fetched per read.
const READ_COUNT: usize = 10;

/// Pause after a transport error before the consumer loop retries.
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone)]
pub struct RedisStreamsQueue {
    client: Arc<redis::Client>,
    group: String,
    consumer: String,
}

impl RedisStreamsQueue {
    /// * `redis_url` — e.g. `redis://localhost:6379`
    /// * `group` — consumer group name (e.g. `orderflow.ingest`)
    pub fn new(redis_url: impl AsRef<str>, group: impl Into<String>) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))?;

        Ok(Self {
            client: Arc::new(client),
            group: group.into(),
            consumer: format!("consumer-{}", uuid::Uuid::now_v7()),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, QueueError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))
    }

    /// Declare the stream + consumer group (idempotent; the BUSYGROUP error
    /// from an existing group is ignored).
    async fn ensure_group(
        conn: &mut MultiplexedConnection,
        queue: &str,
        group: &str,
    ) -> Result<(), QueueError> {
        let created: Result<String, redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(queue)
            .arg(group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(conn)
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(QueueError::BrokerUnavailable(e.to_string())),
        }
    }

    async fn ack(conn: &mut MultiplexedConnection, queue: &str, group: &str, id: &str) {
        let acked: Result<u64, redis::RedisError> = redis::cmd("XACK")
            .arg(queue)
            .arg(group)
            .arg(id)
            .query_async(conn)
            .await;
        if let Err(e) = acked {
            warn!(queue, message_id = id, error = %e, "failed to acknowledge message");
        }
    }

    /// One blocking read of new deliveries for this consumer.
    async fn read_batch(
        conn: &mut MultiplexedConnection,
        queue: &str,
        group: &str,
        consumer: &str,
    ) -> Result<Vec<StreamMessage>, QueueError> {
        let reply: Option<redis::Value> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(group)
            .arg(consumer)
            .arg("COUNT")
            .arg(READ_COUNT)
            .arg("BLOCK")
            .arg(BLOCK_MS)
            .arg("STREAMS")
            .arg(queue)
            .arg(">")
            .query_async(conn)
            .await
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))?;

        let Some(reply) = reply else {
            return Ok(Vec::new()); // blocking timeout, nothing new
        };

        Ok(parse_read_reply(reply))
    }
}

/// One delivery pulled off the stream.
#[derive(Debug)]
struct StreamMessage {
    id: String,
    payload: Vec<u8>,
}

/// Parse an XREADGROUP reply:
/// `[[stream, [[id, [field, value, …]], …]], …]`.
/// Entries that do not carry a `payload` field are skipped.
fn parse_read_reply(reply: redis::Value) -> Vec<StreamMessage> {
    let redis::Value::Bulk(streams) = reply else {
        return Vec::new();
    };

    let mut messages = Vec::new();
    for stream in streams {
        let redis::Value::Bulk(stream_parts) = stream else {
            continue;
        };
        let Some(redis::Value::Bulk(entries)) = stream_parts.into_iter().nth(1) else {
            continue;
        };
        for entry in entries {
            if let Some(message) = parse_entry(entry) {
                messages.push(message);
            }
        }
    }
    messages
}

fn parse_entry(entry: redis::Value) -> Option<StreamMessage> {
    let redis::Value::Bulk(parts) = entry else {
        return None;
    };
    let mut parts = parts.into_iter();

    let id = match parts.next()? {
        redis::Value::Data(data) => String::from_utf8_lossy(&data).into_owned(),
        _ => return None,
    };

    let redis::Value::Bulk(fields) = parts.next()? else {
        return None;
    };

    let mut payload = None;
    for pair in fields.chunks(2) {
        if let [redis::Value::Data(key), redis::Value::Data(value)] = pair {
            if key.as_slice() == b"payload" {
                payload = Some(value.clone());
            }
        }
    }

    payload.map(|payload| StreamMessage { id, payload })
}

#[async_trait]
impl<M> EventQueue<M> for RedisStreamsQueue
where
    M: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn publish(&self, queue: &str, message: &M) -> Result<(), QueueError> {
        let payload =
            serde_json::to_vec(message).map_err(|e| QueueError::Serialize(e.to_string()))?;

        let mut conn = self.connection().await?;
        Self::ensure_group(&mut conn, queue, &self.group).await?;

        let _: String = redis::cmd("XADD")
            .arg(queue)
            .arg("*")
            .arg("payload")
            .arg(payload)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))?;

        Ok(())
    }

    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler<M>>,
    ) -> Result<ConsumerHandle, QueueError> {
        // Fail fast if the broker is down at registration time; later
        // transport errors are absorbed by the loop instead.
        let mut conn = self.connection().await?;
        Self::ensure_group(&mut conn, queue, &self.group).await?;

        let client = Arc::clone(&self.client);
        let queue = queue.to_string();
        let group = self.group.clone();
        let consumer = self.consumer.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let join = tokio::spawn(async move {
            info!(queue, group, consumer, "order queue consumer started");
            let mut conn = Some(conn);

            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let mut active = match conn.take() {
                    Some(c) => c,
                    None => match client.get_multiplexed_async_connection().await {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(queue, error = %e, "broker unreachable; retrying");
                            tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS))
                                .await;
                            continue;
                        }
                    },
                };

                match Self::read_batch(&mut active, &queue, &group, &consumer).await {
                    Ok(batch) => {
                        for message in batch {
                            deliver(handler.as_ref(), &queue, &message).await;
                            // Ack either way: failures are dropped, not requeued.
                            Self::ack(&mut active, &queue, &group, &message.id).await;
                        }
                        conn = Some(active);
                    }
                    Err(e) => {
                        warn!(queue, error = %e, "stream read failed; reconnecting");
                        tokio::time::sleep(std::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                }
            }
        });

        Ok(ConsumerHandle::new(shutdown_tx, join))
    }
}

/// Decode and process one delivery; failures are logged and the message is
/// dropped by the caller's unconditional ack.
async fn deliver<M>(handler: &dyn QueueHandler<M>, queue: &str, message: &StreamMessage)
where
    M: DeserializeOwned + Send + 'static,
{
    let decoded: M = match serde_json::from_slice(&message.payload) {
        Ok(m) => m,
        Err(err) => {
            warn!(queue, message_id = %message.id, error = %err, "dropping undecodable message");
            return;
        }
    };

    if let Err(err) = handler.handle(decoded).await {
        warn!(queue, message_id = %message.id, error = ?err, "handler failed; message dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> redis::Value {
        redis::Value::Data(s.as_bytes().to_vec())
    }

    #[test]
    fn parses_a_two_entry_read_reply() {
        let reply = redis::Value::Bulk(vec![redis::Value::Bulk(vec![
            data("orderQueue"),
            redis::Value::Bulk(vec![
                redis::Value::Bulk(vec![
                    data("1-0"),
                    redis::Value::Bulk(vec![data("payload"), data("{\"a\":1}")]),
                ]),
                redis::Value::Bulk(vec![
                    data("2-0"),
                    redis::Value::Bulk(vec![data("payload"), data("{\"b\":2}")]),
                ]),
            ]),
        ])]);

        let messages = parse_read_reply(reply);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "1-0");
        assert_eq!(messages[0].payload, b"{\"a\":1}");
        assert_eq!(messages[1].id, "2-0");
    }

    #[test]
    fn entries_without_a_payload_field_are_skipped() {
        let reply = redis::Value::Bulk(vec![redis::Value::Bulk(vec![
            data("orderQueue"),
            redis::Value::Bulk(vec![redis::Value::Bulk(vec![
                data("1-0"),
                redis::Value::Bulk(vec![data("other"), data("x")]),
            ])]),
        ])]);

        assert!(parse_read_reply(reply).is_empty());
    }

    #[test]
    fn malformed_replies_parse_to_nothing() {
        assert!(parse_read_reply(redis::Value::Nil).is_empty());
        assert!(parse_read_reply(redis::Value::Int(3)).is_empty());
        assert!(parse_read_reply(redis::Value::Bulk(vec![data("junk")])).is_empty());
    }
}
