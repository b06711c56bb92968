use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::error;

use orderflow_core::RecordId;
use orderflow_events::EventQueue;
use orderflow_orders::{OrderDraft, OrderEvent, ORDER_QUEUE};

use crate::app::{errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order))
}

/// Producer side of the pipeline: validate, publish, answer immediately.
///
/// The 202 certifies "event accepted for processing", never "order
/// persisted" — persistence happens later on the consumer side, and the
/// caller has no way to wait for it.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(draft): Json<OrderDraft>,
) -> axum::response::Response {
    let payload = match draft.validate() {
        Ok(p) => p,
        Err(errors) => return errors::validation_failed(errors),
    };

    let event = OrderEvent::OrderCreated {
        tenant_id: tenant.tenant_id().clone(),
        data: payload.clone(),
    };

    if let Err(err) = services.queue.publish(ORDER_QUEUE, &event).await {
        // The event was never accepted downstream; this is a hard failure
        // for the caller, not a fire-and-forget success.
        error!(tenant_id = %tenant.tenant_id(), error = %err, "order event publish failed");
        return errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to publish order creation event",
        );
    }

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "status": "success",
            "message": "Order creation event published",
            "data": payload,
        })),
    )
        .into_response()
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let store = match services.registry.get_or_create(tenant.tenant_id()).await {
        Ok(store) => store,
        Err(err) => return errors::registry_error_to_response(err),
    };

    match store.list_orders().await {
        Ok(orders) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Orders fetched successfully",
                "data": orders,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "order list failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch orders")
        }
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: RecordId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid order id"),
    };

    let store = match services.registry.get_or_create(tenant.tenant_id()).await {
        Ok(store) => store,
        Err(err) => return errors::registry_error_to_response(err),
    };

    match store.get_order(id).await {
        Ok(Some(order)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Order fetched successfully",
                "data": order,
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "Order not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "order fetch failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch order")
        }
    }
}
