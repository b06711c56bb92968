//! Durable publish/consume abstraction (mechanics only).
//!
//! This module provides the **queue pattern** that decouples the request path
//! (producer) from persistence (consumer): an event is serialized and enqueued
//! durably, and a single registered handler processes deliveries one at a
//! time with explicit acknowledgment.
//!
//! ## Delivery semantics
//!
//! - **At-least-once across restarts**: unacknowledged messages survive a
//!   consumer restart (transport permitting) and may be redelivered, so a
//!   redelivered event can produce a duplicate record downstream.
//! - **Failed deliveries are dropped**: when the handler returns an error the
//!   message is removed without requeue. Within one consumer's lifetime a
//!   failed message is lost, not retried and not dead-lettered.
//! - **Ordering**: deliveries follow the transport's own per-queue order; no
//!   ordering is imposed across queues or event kinds.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Transport-level queue failure.
#[derive(Debug, Error, Clone)]
pub enum QueueError {
    /// The underlying transport is unreachable. On the publish path the
    /// caller must treat the event as **not** accepted downstream.
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// The message could not be serialized for the wire.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// A second consumer was registered for a queue that already has one.
    #[error("queue {0} already has a consumer")]
    ConsumerExists(String),
}

/// Processes one delivered message.
///
/// `Ok(())` acknowledges the message (permanent removal). `Err` drops it:
/// the failure is logged by the consumer loop, the message is not requeued,
/// and processing continues with the next delivery.
#[async_trait]
pub trait QueueHandler<M>: Send + Sync {
    async fn handle(&self, message: M) -> anyhow::Result<()>;
}

/// Durable publish/consume channel between the producer (request path) and
/// the asynchronous consumer (persistence path).
///
/// Implementations serialize messages as JSON and must declare the queue
/// idempotently on first use. The trait is object-safe so wiring code can
/// hold an `Arc<dyn EventQueue<M>>` and tests can substitute doubles.
#[async_trait]
pub trait EventQueue<M>: Send + Sync
where
    M: Send + 'static,
{
    /// Serialize `message` and enqueue it durably on `queue`, declaring the
    /// queue if absent.
    async fn publish(&self, queue: &str, message: &M) -> Result<(), QueueError>;

    /// Register `handler` as the sole processor for `queue`.
    ///
    /// Deliveries are decoded once at this boundary; a payload that fails to
    /// decode is logged and dropped exactly like a failed handler. The
    /// consumer loop must survive transport errors (log and continue), never
    /// crash.
    async fn consume(
        &self,
        queue: &str,
        handler: Arc<dyn QueueHandler<M>>,
    ) -> Result<ConsumerHandle, QueueError>;
}

/// Handle to control and join a background consumer task.
#[derive(Debug)]
pub struct ConsumerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ConsumerHandle {
    pub fn new(shutdown: oneshot::Sender<()>, join: JoinHandle<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            join: Some(join),
        }
    }

    /// Request graceful shutdown and wait for the consumer to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}
