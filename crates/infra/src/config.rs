//! Process configuration, loaded once at startup from the environment.

use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Backing-store server coordinates (tenant databases live on one server).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Bound on tenant connection establishment.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub store: StoreConfig,
    pub redis_url: String,
    /// When false, the process runs on in-memory stores and queue (dev/test).
    pub use_persistent_stores: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("PORT", 3000),
            store: StoreConfig {
                host: env_or("STORE_HOST", "localhost"),
                port: env_parsed("STORE_PORT", 5432),
                username: env_or("STORE_USER", "admin"),
                password: env_or("STORE_PASSWORD", "password"),
                connect_timeout: Duration::from_secs(5),
            },
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            use_persistent_stores: env_parsed("USE_PERSISTENT_STORES", false),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
