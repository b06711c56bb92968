use serde::{Deserialize, Serialize};

use orderflow_core::TenantId;

use crate::order::OrderPayload;

/// Queue name carrying order-creation events.
pub const ORDER_QUEUE: &str = "orderQueue";

/// Event published on the order queue, tagged by kind.
///
/// Wire format (JSON):
/// `{ "kind": "order_created", "tenantId": "<string>", "data": { ...payload... } }`
///
/// Decoded once at the queue boundary; a message that does not match a known
/// kind (or is missing `tenantId`/`data`) fails decode there and is dropped by
/// the consumer rather than crashing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderCreated {
        #[serde(rename = "tenantId")]
        tenant_id: TenantId,
        data: OrderPayload,
    },
}

impl OrderEvent {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::OrderCreated { tenant_id, .. } => tenant_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{LineItem, OrderStatus};

    fn payload() -> OrderPayload {
        OrderPayload {
            user_id: "user-1".to_string(),
            line_items: vec![LineItem {
                product_id: "prod-1".to_string(),
                quantity: 3,
            }],
            total_amount: 19.95,
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn serializes_with_kind_tag_and_camel_case_tenant() {
        let tenant_id = TenantId::new("acme").unwrap();
        let event = OrderEvent::OrderCreated {
            tenant_id,
            data: payload(),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "order_created");
        assert_eq!(value["tenantId"], "acme");
        assert_eq!(value["data"]["userId"], "user-1");
        assert_eq!(value["data"]["lineItems"][0]["productId"], "prod-1");
    }

    #[test]
    fn decode_rejects_missing_tenant_id() {
        let raw = serde_json::json!({
            "kind": "order_created",
            "data": { "userId": "u", "lineItems": [], "totalAmount": 1.0 },
        });
        assert!(serde_json::from_value::<OrderEvent>(raw).is_err());
    }

    #[test]
    fn decode_rejects_empty_tenant_id() {
        let raw = serde_json::json!({
            "kind": "order_created",
            "tenantId": "",
            "data": { "userId": "u", "lineItems": [], "totalAmount": 1.0 },
        });
        assert!(serde_json::from_value::<OrderEvent>(raw).is_err());
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let raw = serde_json::json!({
            "kind": "order_deleted",
            "tenantId": "acme",
            "data": {},
        });
        assert!(serde_json::from_value::<OrderEvent>(raw).is_err());
    }

    #[test]
    fn publish_consume_round_trip_is_deep_equal() {
        let event = OrderEvent::OrderCreated {
            tenant_id: TenantId::new("acme").unwrap(),
            data: payload(),
        };
        let bytes = serde_json::to_vec(&event).unwrap();
        let back: OrderEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, event);
    }
}
