//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (registry, queue, hub)
//! - `routes/`: HTTP routes + handlers (one file per domain area)
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};

use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

pub use services::{build_services, AppServices};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Components are constructed once and injected here rather than reached
/// through process-global state, so tests can run the same router against
/// in-memory doubles.
pub fn build_app(services: Arc<AppServices>) -> Router {
    // Tenant-scoped routes: require x-tenant-id.
    let tenant_scoped = Router::new()
        .nest("/api/orders", routes::orders::router())
        .nest("/api/users", routes::users::router())
        .nest("/api/products", routes::products::router())
        .layer(axum::middleware::from_fn(middleware::tenant_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/api/notify", post(routes::notify::notify))
        .route("/ws", get(routes::ws::upgrade))
        .merge(tenant_scoped)
        .layer(Extension(services))
        .layer(axum::middleware::from_fn(middleware::log_requests))
}
