use std::sync::Arc;

use anyhow::Context;

use orderflow_events::{EventQueue, InMemoryQueue};
use orderflow_infra::queue::RedisStreamsQueue;
use orderflow_infra::store::in_memory::InMemoryConnector;
use orderflow_infra::store::postgres::PgStoreConnector;
use orderflow_infra::{AppConfig, TenantRegistry};
use orderflow_orders::OrderEvent;

use crate::notifications::NotificationHub;

/// Consumer group processing the order queue.
const INGEST_GROUP: &str = "orderflow.ingest";

/// The pipeline's components, constructed once at process start and passed by
/// reference into every handler and worker.
pub struct AppServices {
    pub registry: Arc<TenantRegistry>,
    pub queue: Arc<dyn EventQueue<OrderEvent>>,
    pub hub: Arc<NotificationHub>,
}

impl AppServices {
    /// In-memory wiring for dev mode and black-box tests.
    pub fn in_memory() -> Self {
        Self {
            registry: Arc::new(TenantRegistry::new(Arc::new(InMemoryConnector::new()))),
            queue: Arc::new(InMemoryQueue::new()),
            hub: Arc::new(NotificationHub::new()),
        }
    }
}

/// Wire services from config.
///
/// With persistent stores enabled, an unreachable primary store is fatal:
/// the error propagates out of `main` and the process does not serve
/// traffic.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    if !config.use_persistent_stores {
        tracing::info!("using in-memory stores and queue");
        return Ok(AppServices::in_memory());
    }

    let connector = PgStoreConnector::connect_admin(
        config.store.connect_options(),
        config.store.connect_timeout,
    )
    .await
    .context("primary store unreachable at startup")?;

    let registry = Arc::new(TenantRegistry::with_timeout(
        Arc::new(connector),
        config.store.connect_timeout,
    ));
    let queue: Arc<dyn EventQueue<OrderEvent>> =
        Arc::new(RedisStreamsQueue::new(&config.redis_url, INGEST_GROUP)?);

    Ok(AppServices {
        registry,
        queue,
        hub: Arc::new(NotificationHub::new()),
    })
}
