//! Tenant-isolated backing stores.
//!
//! A [`TenantStore`] is the handle the registry caches per tenant. Every
//! operation on it is already scoped to that tenant's own namespace, which is
//! what makes cross-tenant writes structurally impossible: the only way to
//! obtain a handle is through the registry, keyed by the tenant id carried on
//! the request or event.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use orderflow_core::RecordId;
use orderflow_orders::Order;
use orderflow_products::{Product, ValidatedProduct};
use orderflow_users::{User, ValidatedUser};

/// Shared handle to one tenant's backing store.
pub type TenantHandle = Arc<dyn TenantStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store query failed: {0}")]
    Query(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write operations against a single tenant's namespace.
///
/// Orders are written only by the pipeline consumer; users and products are
/// plain request/response CRUD with no pipeline involvement.
#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> Result<Order, StoreError>;
    async fn list_orders(&self) -> Result<Vec<Order>, StoreError>;
    async fn get_order(&self, id: RecordId) -> Result<Option<Order>, StoreError>;

    async fn insert_user(&self, user: User) -> Result<User, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn get_user(&self, id: RecordId) -> Result<Option<User>, StoreError>;
    async fn update_user(
        &self,
        id: RecordId,
        draft: ValidatedUser,
    ) -> Result<Option<User>, StoreError>;
    async fn delete_user(&self, id: RecordId) -> Result<bool, StoreError>;

    async fn insert_product(&self, product: Product) -> Result<Product, StoreError>;
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn get_product(&self, id: RecordId) -> Result<Option<Product>, StoreError>;
    async fn update_product(
        &self,
        id: RecordId,
        draft: ValidatedProduct,
    ) -> Result<Option<Product>, StoreError>;
    async fn delete_product(&self, id: RecordId) -> Result<bool, StoreError>;
}
