use axum::{
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use orderflow_core::TenantId;

use crate::app::errors;
use crate::context::TenantContext;

/// Require `x-tenant-id` and install a [`TenantContext`] extension.
///
/// Absence (or an empty value) is a request-level error; nothing downstream
/// runs and nothing is published.
pub async fn tenant_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match TenantId::new(header) {
        Ok(tenant_id) => {
            req.extensions_mut().insert(TenantContext::new(tenant_id));
            next.run(req).await
        }
        Err(_) => errors::json_error(StatusCode::BAD_REQUEST, "Tenant ID is required"),
    }
}

/// Log one line per request: method, path, response status.
pub async fn log_requests(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    tracing::info!(%method, path, status = response.status().as_u16(), "request");
    response
}
