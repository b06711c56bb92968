use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use orderflow_core::{RecordId, ValidationErrors};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: RecordId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn from_draft(draft: ValidatedProduct, now: DateTime<Utc>) -> Self {
        Self {
            id: RecordId::new(),
            name: draft.name,
            description: draft.description,
            price: draft.price,
            stock: draft.stock,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, draft: ValidatedProduct, now: DateTime<Utc>) {
        self.name = draft.name;
        self.description = draft.description;
        self.price = draft.price;
        self.stock = draft.stock;
        self.updated_at = now;
    }
}

/// Unvalidated request body for product create/update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
}

impl ProductDraft {
    pub fn validate(self) -> Result<ValidatedProduct, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.push("name", "Name is required");
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            errors.push("price", "Price must be a positive number");
        }
        if self.stock < 0 {
            errors.push("stock", "Stock must be a non-negative integer");
        }

        errors.finish(ValidatedProduct {
            name: self.name,
            description: self.description,
            price: self.price,
            stock: self.stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_price_is_rejected() {
        let draft = ProductDraft {
            name: "Widget".to_string(),
            description: None,
            price: 0.0,
            stock: 5,
        };
        let errors = draft.validate().unwrap_err();
        assert!(errors.errors().iter().any(|e| e.field == "price"));
    }

    #[test]
    fn zero_stock_is_allowed() {
        let draft = ProductDraft {
            name: "Widget".to_string(),
            description: Some("A widget".to_string()),
            price: 9.99,
            stock: 0,
        };
        assert!(draft.validate().is_ok());
    }
}
