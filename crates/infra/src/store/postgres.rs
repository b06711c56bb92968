//! Postgres-backed tenant stores: one database per tenant.
//!
//! The original deployment model gives every tenant its own database on a
//! shared server. The connector keeps a pool to the maintenance database
//! (reachability of that pool is checked at startup and is fatal if the
//! server is down), provisions a tenant database on first use, and hands out
//! a pooled handle bound to that database. Tenant isolation therefore holds
//! at the database level; no query here ever names another tenant's schema.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use tracing::{info, instrument};

use orderflow_core::{RecordId, TenantId};
use orderflow_orders::{LineItem, Order, OrderStatus};
use orderflow_products::{Product, ValidatedProduct};
use orderflow_users::{User, ValidatedUser};

use crate::registry::{RegistryError, StoreConnector};
use crate::store::{StoreError, TenantHandle, TenantStore};

/// SQLSTATE for "database does not exist".
const UNDEFINED_DATABASE: &str = "3D000";

const TENANT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    line_items JSONB NOT NULL,
    total_amount DOUBLE PRECISION NOT NULL,
    status TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    password TEXT NOT NULL,
    age INTEGER,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
CREATE TABLE IF NOT EXISTS products (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    price DOUBLE PRECISION NOT NULL,
    stock BIGINT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL
);
"#;

/// Lazily provisions and connects per-tenant databases.
#[derive(Debug, Clone)]
pub struct PgStoreConnector {
    admin_pool: PgPool,
    base_options: PgConnectOptions,
    acquire_timeout: Duration,
}

impl PgStoreConnector {
    /// Connect to the server's maintenance database. Failing here means the
    /// primary store is unreachable; callers treat that as fatal at startup.
    pub async fn connect_admin(
        base_options: PgConnectOptions,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let admin_pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(acquire_timeout)
            .connect_with(base_options.clone().database("postgres"))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            admin_pool,
            base_options,
            acquire_timeout,
        })
    }

    /// The tenant id doubles as the database name, so it must be a safe
    /// identifier; anything else is rejected rather than quoted around.
    fn database_name(tenant_id: &TenantId) -> Result<&str, RegistryError> {
        let name = tenant_id.as_str();
        let ok = name.len() <= 63
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if ok {
            Ok(name)
        } else {
            Err(RegistryError::InvalidTenant)
        }
    }

    async fn connect_tenant_db(&self, database: &str) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(self.acquire_timeout)
            .connect_with(self.base_options.clone().database(database))
            .await
    }

    async fn create_database(&self, database: &str) -> Result<(), RegistryError> {
        // Identifier charset is validated above; CREATE DATABASE cannot take
        // bind parameters.
        let stmt = format!("CREATE DATABASE \"{database}\"");
        sqlx::query(&stmt)
            .execute(&self.admin_pool)
            .await
            .map(|_| ())
            .map_err(|e| RegistryError::Unavailable(e.to_string()))
    }
}

fn is_undefined_database(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNDEFINED_DATABASE),
        _ => false,
    }
}

#[async_trait]
impl StoreConnector for PgStoreConnector {
    #[instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn connect(&self, tenant_id: &TenantId) -> Result<TenantHandle, RegistryError> {
        let database = Self::database_name(tenant_id)?;

        let pool = match self.connect_tenant_db(database).await {
            Ok(pool) => pool,
            Err(err) if is_undefined_database(&err) => {
                info!(tenant_id = %tenant_id, "provisioning tenant database");
                self.create_database(database).await?;
                self.connect_tenant_db(database)
                    .await
                    .map_err(|e| RegistryError::Unavailable(e.to_string()))?
            }
            Err(err) => return Err(RegistryError::Unavailable(err.to_string())),
        };

        for stmt in TENANT_SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
            sqlx::query(stmt)
                .execute(&pool)
                .await
                .map_err(|e| RegistryError::Unavailable(e.to_string()))?;
        }

        Ok(Arc::new(PgTenantStore::new(pool)))
    }
}

/// Store handle bound to one tenant's database.
#[derive(Debug, Clone)]
pub struct PgTenantStore {
    pool: PgPool,
}

impl PgTenantStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_err(err: sqlx::Error) -> StoreError {
    StoreError::Query(err.to_string())
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<Order, StoreError> {
    let line_items: serde_json::Value = row.try_get("line_items").map_err(query_err)?;
    let line_items: Vec<LineItem> =
        serde_json::from_value(line_items).map_err(|e| StoreError::Query(e.to_string()))?;
    let status: String = row.try_get("status").map_err(query_err)?;
    let status =
        OrderStatus::from_str(&status).map_err(|e| StoreError::Query(e.to_string()))?;

    Ok(Order {
        id: RecordId::from_uuid(row.try_get("id").map_err(query_err)?),
        user_id: row.try_get("user_id").map_err(query_err)?,
        line_items,
        total_amount: row.try_get("total_amount").map_err(query_err)?,
        status,
        created_at: row.try_get("created_at").map_err(query_err)?,
        updated_at: row.try_get("updated_at").map_err(query_err)?,
    })
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let age: Option<i32> = row.try_get("age").map_err(query_err)?;
    Ok(User {
        id: RecordId::from_uuid(row.try_get("id").map_err(query_err)?),
        name: row.try_get("name").map_err(query_err)?,
        email: row.try_get("email").map_err(query_err)?,
        password: row.try_get("password").map_err(query_err)?,
        age: age.map(|a| a as u32),
        created_at: row.try_get("created_at").map_err(query_err)?,
        updated_at: row.try_get("updated_at").map_err(query_err)?,
    })
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<Product, StoreError> {
    Ok(Product {
        id: RecordId::from_uuid(row.try_get("id").map_err(query_err)?),
        name: row.try_get("name").map_err(query_err)?,
        description: row.try_get("description").map_err(query_err)?,
        price: row.try_get("price").map_err(query_err)?,
        stock: row.try_get("stock").map_err(query_err)?,
        created_at: row.try_get("created_at").map_err(query_err)?,
        updated_at: row.try_get("updated_at").map_err(query_err)?,
    })
}

#[async_trait]
impl TenantStore for PgTenantStore {
    async fn insert_order(&self, order: Order) -> Result<Order, StoreError> {
        let line_items = serde_json::to_value(&order.line_items)
            .map_err(|e| StoreError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, line_items, total_amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(&order.user_id)
        .bind(&line_items)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(order)
    }

    async fn list_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT * FROM orders ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(order_from_row).collect()
    }

    async fn get_order(&self, id: RecordId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(order_from_row).transpose()
    }

    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password, age, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(user.age.map(|a| a as i32))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT * FROM users ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get_user(&self, id: RecordId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user(
        &self,
        id: RecordId,
        draft: ValidatedUser,
    ) -> Result<Option<User>, StoreError> {
        let now: DateTime<Utc> = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password = $4, age = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(&draft.password)
        .bind(draft.age.map(|a| a as i32))
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn delete_user(&self, id: RecordId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_product(&self, product: Product) -> Result<Product, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        Ok(product)
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT * FROM products ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await
            .map_err(query_err)?;
        rows.iter().map(product_from_row).collect()
    }

    async fn get_product(&self, id: RecordId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT * FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(query_err)?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn update_product(
        &self,
        id: RecordId,
        draft: ValidatedProduct,
    ) -> Result<Option<Product>, StoreError> {
        let now: DateTime<Utc> = Utc::now();
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, stock = $5, updated_at = $6
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.as_uuid())
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.stock)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;
        row.as_ref().map(product_from_row).transpose()
    }

    async fn delete_product(&self, id: RecordId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_name_accepts_simple_identifiers() {
        let tenant = TenantId::new("tenant_01-dev").unwrap();
        assert_eq!(PgStoreConnector::database_name(&tenant).unwrap(), "tenant_01-dev");
    }

    #[test]
    fn database_name_rejects_quoting_hazards() {
        for bad in ["ten\"ant", "ten ant", "tenant;drop", "ünïcode"] {
            let tenant = TenantId::new(bad).unwrap();
            assert_eq!(
                PgStoreConnector::database_name(&tenant),
                Err(RegistryError::InvalidTenant)
            );
        }
    }
}
