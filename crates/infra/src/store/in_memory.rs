//! In-memory tenant store for tests/dev.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use orderflow_core::{RecordId, TenantId};
use orderflow_orders::Order;
use orderflow_products::{Product, ValidatedProduct};
use orderflow_users::{User, ValidatedUser};

use crate::registry::{RegistryError, StoreConnector};
use crate::store::{StoreError, TenantHandle, TenantStore};

/// One tenant's records, held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    orders: RwLock<HashMap<RecordId, Order>>,
    users: RwLock<HashMap<RecordId, User>>,
    products: RwLock<HashMap<RecordId, Product>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by_creation<T: Clone>(
    map: &HashMap<RecordId, T>,
    created_at: impl Fn(&T) -> chrono::DateTime<Utc>,
    id: impl Fn(&T) -> RecordId,
) -> Vec<T> {
    let mut items: Vec<T> = map.values().cloned().collect();
    // Id (time-ordered uuid) breaks ties between same-instant records.
    items.sort_by_key(|item| (created_at(item), *id(item).as_uuid()));
    items
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn insert_order(&self, order: Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().expect("orders lock poisoned");
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().expect("orders lock poisoned");
        Ok(sorted_by_creation(&orders, |o| o.created_at, |o| o.id))
    }

    async fn get_order(&self, id: RecordId) -> Result<Option<Order>, StoreError> {
        let orders = self.orders.read().expect("orders lock poisoned");
        Ok(orders.get(&id).cloned())
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.write().expect("users lock poisoned");
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().expect("users lock poisoned");
        Ok(sorted_by_creation(&users, |u| u.created_at, |u| u.id))
    }

    async fn get_user(&self, id: RecordId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().expect("users lock poisoned");
        Ok(users.get(&id).cloned())
    }

    async fn update_user(
        &self,
        id: RecordId,
        draft: ValidatedUser,
    ) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().expect("users lock poisoned");
        Ok(users.get_mut(&id).map(|user| {
            user.apply_update(draft, Utc::now());
            user.clone()
        }))
    }

    async fn delete_user(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut users = self.users.write().expect("users lock poisoned");
        Ok(users.remove(&id).is_some())
    }

    async fn insert_product(&self, product: Product) -> Result<Product, StoreError> {
        let mut products = self.products.write().expect("products lock poisoned");
        products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let products = self.products.read().expect("products lock poisoned");
        Ok(sorted_by_creation(&products, |p| p.created_at, |p| p.id))
    }

    async fn get_product(&self, id: RecordId) -> Result<Option<Product>, StoreError> {
        let products = self.products.read().expect("products lock poisoned");
        Ok(products.get(&id).cloned())
    }

    async fn update_product(
        &self,
        id: RecordId,
        draft: ValidatedProduct,
    ) -> Result<Option<Product>, StoreError> {
        let mut products = self.products.write().expect("products lock poisoned");
        Ok(products.get_mut(&id).map(|product| {
            product.apply_update(draft, Utc::now());
            product.clone()
        }))
    }

    async fn delete_product(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut products = self.products.write().expect("products lock poisoned");
        Ok(products.remove(&id).is_some())
    }
}

/// Connector producing fresh in-memory stores; the registry's cache is what
/// makes them stable per tenant.
#[derive(Debug, Default)]
pub struct InMemoryConnector;

impl InMemoryConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(&self, _tenant_id: &TenantId) -> Result<TenantHandle, RegistryError> {
        Ok(Arc::new(InMemoryTenantStore::new()))
    }
}
