use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tracing::error;

use orderflow_core::RecordId;
use orderflow_infra::TenantHandle;
use orderflow_products::{Product, ProductDraft};

use crate::app::{errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
}

async fn tenant_store(
    services: &AppServices,
    tenant: &TenantContext,
) -> Result<TenantHandle, axum::response::Response> {
    services
        .registry
        .get_or_create(tenant.tenant_id())
        .await
        .map_err(errors::registry_error_to_response)
}

fn parse_id(id: &str) -> Result<RecordId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid product id"))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(draft): Json<ProductDraft>,
) -> axum::response::Response {
    let validated = match draft.validate() {
        Ok(v) => v,
        Err(errors) => return errors::validation_failed(errors),
    };

    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store
        .insert_product(Product::from_draft(validated, Utc::now()))
        .await
    {
        Ok(product) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "success",
                "message": "Product created successfully",
                "data": product,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "product insert failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create product")
        }
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.list_products().await {
        Ok(products) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Products fetched successfully",
                "data": products,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "product list failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch products")
        }
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.get_product(id).await {
        Ok(Some(product)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Product fetched successfully",
                "data": product,
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "Product not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "product fetch failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch product")
        }
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let validated = match draft.validate() {
        Ok(v) => v,
        Err(errors) => return errors::validation_failed(errors),
    };
    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.update_product(id, validated).await {
        Ok(Some(product)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Product updated successfully",
                "data": product,
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "Product not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "product update failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update product")
        }
    }
}

pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.delete_product(id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Product deleted successfully",
            })),
        )
            .into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "Product not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "product delete failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete product")
        }
    }
}
