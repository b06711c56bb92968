//! Consumer side of the order pipeline.
//!
//! Registered once at startup as the sole processor of the order queue. For
//! each delivery it resolves the tenant's store handle through the registry
//! and persists the payload as a new order. Any failure is terminal for that
//! message: the delivery is logged and dropped, and the loop moves on. There
//! is no caller left to report to — the producing request already completed
//! with "accepted".

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use orderflow_events::{ConsumerHandle, EventQueue, QueueError, QueueHandler};
use orderflow_orders::{Order, OrderEvent, ORDER_QUEUE};

use crate::registry::TenantRegistry;

/// Handles `order_created` events by persisting into the tenant's store.
pub struct OrderConsumer {
    registry: Arc<TenantRegistry>,
}

impl OrderConsumer {
    pub fn new(registry: Arc<TenantRegistry>) -> Self {
        Self { registry }
    }

    /// Register the consumer on the order queue.
    pub async fn spawn(
        queue: &dyn EventQueue<OrderEvent>,
        registry: Arc<TenantRegistry>,
    ) -> Result<ConsumerHandle, QueueError> {
        queue
            .consume(ORDER_QUEUE, Arc::new(Self::new(registry)))
            .await
    }
}

#[async_trait]
impl QueueHandler<OrderEvent> for OrderConsumer {
    async fn handle(&self, event: OrderEvent) -> anyhow::Result<()> {
        let OrderEvent::OrderCreated { tenant_id, data } = event;

        let store = self
            .registry
            .get_or_create(&tenant_id)
            .await
            .with_context(|| format!("resolving store for tenant \"{tenant_id}\""))?;

        let order = store
            .insert_order(Order::from_payload(data, Utc::now()))
            .await
            .context("persisting order")?;

        info!(tenant_id = %tenant_id, order_id = %order.id, "order created");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use orderflow_core::TenantId;
    use orderflow_events::InMemoryQueue;
    use orderflow_orders::{LineItem, OrderPayload, OrderStatus};

    use crate::store::in_memory::InMemoryConnector;

    fn event(tenant: &str) -> OrderEvent {
        OrderEvent::OrderCreated {
            tenant_id: TenantId::new(tenant).unwrap(),
            data: OrderPayload {
                user_id: "user-1".to_string(),
                line_items: vec![LineItem {
                    product_id: "prod-1".to_string(),
                    quantity: 2,
                }],
                total_amount: 20.0,
                status: OrderStatus::Pending,
            },
        }
    }

    async fn orders_eventually(
        registry: &TenantRegistry,
        tenant: &TenantId,
        count: usize,
    ) -> Vec<Order> {
        for _ in 0..100 {
            let store = registry.get_or_create(tenant).await.unwrap();
            let orders = store.list_orders().await.unwrap();
            if orders.len() >= count {
                return orders;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("expected {count} order(s) to be persisted in time");
    }

    #[tokio::test]
    async fn consumed_event_lands_in_the_tenants_own_store() {
        let queue = InMemoryQueue::new();
        let registry = Arc::new(TenantRegistry::new(Arc::new(InMemoryConnector::new())));

        let _consumer = OrderConsumer::spawn(&queue, registry.clone()).await.unwrap();

        queue.publish(ORDER_QUEUE, &event("acme")).await.unwrap();

        let acme = TenantId::new("acme").unwrap();
        let orders = orders_eventually(&registry, &acme, 1).await;
        assert_eq!(orders[0].user_id, "user-1");
        assert_eq!(orders[0].status, OrderStatus::Pending);

        // Nothing leaked into another tenant's store.
        let globex = TenantId::new("globex").unwrap();
        let other = registry.get_or_create(&globex).await.unwrap();
        assert!(other.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn redelivered_event_creates_a_duplicate_order() {
        // No dedup exists: redelivery after an unacknowledged crash would
        // write the order twice. Asserted as current behavior.
        let queue = InMemoryQueue::new();
        let registry = Arc::new(TenantRegistry::new(Arc::new(InMemoryConnector::new())));

        let _consumer = OrderConsumer::spawn(&queue, registry.clone()).await.unwrap();

        let duplicated = event("acme");
        queue.publish(ORDER_QUEUE, &duplicated).await.unwrap();
        queue.publish(ORDER_QUEUE, &duplicated).await.unwrap();

        let acme = TenantId::new("acme").unwrap();
        let orders = orders_eventually(&registry, &acme, 2).await;
        assert_eq!(orders.len(), 2);
        assert_ne!(orders[0].id, orders[1].id);
        assert_eq!(orders[0].user_id, orders[1].user_id);
    }
}
