use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{RecordId, ValidationErrors};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = orderflow_core::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(orderflow_core::DomainError::validation(format!(
                "unknown order status: {other}"
            ))),
        }
    }
}

/// One line of an order: product reference + quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Validated order payload, exactly as accepted at the API boundary and
/// carried through the queue. Immutable once published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub user_id: String,
    pub line_items: Vec<LineItem>,
    pub total_amount: f64,
    #[serde(default)]
    pub status: OrderStatus,
}

/// Tenant-scoped order record, created only by the consumer side of the
/// pipeline inside the tenant's own store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: RecordId,
    pub user_id: String,
    pub line_items: Vec<LineItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a record from a validated payload, stamping a fresh id and
    /// creation/update timestamps.
    pub fn from_payload(payload: OrderPayload, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            user_id: payload.user_id,
            line_items: payload.line_items,
            total_amount: payload.total_amount,
            status: payload.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Unvalidated request body for `POST /api/orders`.
///
/// Shape-parsed by serde, then checked field by field so the caller gets a
/// full `[{field, message}]` list rather than the first failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDraft {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub line_items: Vec<LineItemDraft>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemDraft {
    #[serde(default)]
    pub product_id: String,
    /// Signed so that negative quantities reach validation instead of
    /// failing shape-parse with an opaque serde error.
    #[serde(default)]
    pub quantity: i64,
}

impl OrderDraft {
    pub fn validate(self) -> Result<OrderPayload, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.user_id.trim().is_empty() {
            errors.push("userId", "User ID is required");
        }

        let mut line_items = Vec::with_capacity(self.line_items.len());
        for (i, line) in self.line_items.iter().enumerate() {
            if line.product_id.trim().is_empty() {
                errors.push(format!("lineItems.{i}.productId"), "Product ID is required");
            }
            if line.quantity <= 0 || line.quantity > u32::MAX as i64 {
                errors.push(
                    format!("lineItems.{i}.quantity"),
                    "Quantity must be a positive integer",
                );
            } else {
                line_items.push(LineItem {
                    product_id: line.product_id.clone(),
                    quantity: line.quantity as u32,
                });
            }
        }

        if !self.total_amount.is_finite() || self.total_amount <= 0.0 {
            errors.push("totalAmount", "Total amount must be a positive number");
        }

        errors.finish(OrderPayload {
            user_id: self.user_id,
            line_items,
            total_amount: self.total_amount,
            status: self.status.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn draft(total: f64) -> OrderDraft {
        OrderDraft {
            user_id: "user-1".to_string(),
            line_items: vec![LineItemDraft {
                product_id: "prod-1".to_string(),
                quantity: 2,
            }],
            total_amount: total,
            status: None,
        }
    }

    #[test]
    fn valid_draft_defaults_status_to_pending() {
        let payload = draft(49.99).validate().unwrap();
        assert_eq!(payload.status, OrderStatus::Pending);
        assert_eq!(payload.line_items.len(), 1);
        assert_eq!(payload.line_items[0].quantity, 2);
    }

    #[test]
    fn negative_total_amount_reports_field_path() {
        let errors = draft(-5.0).validate().unwrap_err();
        assert!(errors
            .errors()
            .iter()
            .any(|e| e.field == "totalAmount" && e.message.contains("positive")));
    }

    #[test]
    fn missing_user_and_bad_quantity_are_both_reported() {
        let mut d = draft(10.0);
        d.user_id = String::new();
        d.line_items[0].quantity = 0;

        let errors = d.validate().unwrap_err();
        let fields: Vec<_> = errors.errors().iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"userId"));
        assert!(fields.contains(&"lineItems.0.quantity"));
    }

    #[test]
    fn status_round_trips_in_lowercase() {
        let payload = serde_json::json!({
            "userId": "u",
            "lineItems": [{"productId": "p", "quantity": 1}],
            "totalAmount": 1.5,
            "status": "cancelled",
        });
        let parsed: OrderPayload = serde_json::from_value(payload).unwrap();
        assert_eq!(parsed.status, OrderStatus::Cancelled);
        assert_eq!(
            serde_json::to_value(parsed.status).unwrap(),
            serde_json::json!("cancelled")
        );
    }

    proptest! {
        #[test]
        fn non_positive_totals_never_validate(total in -1.0e9f64..=0.0f64) {
            prop_assert!(draft(total).validate().is_err());
        }

        #[test]
        fn positive_totals_validate(total in f64::MIN_POSITIVE..1.0e9f64) {
            prop_assert!(draft(total).validate().is_ok());
        }
    }
}
