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
use orderflow_users::{User, UserDraft};

use crate::app::{errors, services::AppServices};
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
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
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid user id"))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(draft): Json<UserDraft>,
) -> axum::response::Response {
    let validated = match draft.validate() {
        Ok(v) => v,
        Err(errors) => return errors::validation_failed(errors),
    };

    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.insert_user(User::from_draft(validated, Utc::now())).await {
        Ok(user) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "status": "success",
                "message": "User created successfully",
                "data": user,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "user insert failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create user")
        }
    }
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    let store = match tenant_store(&services, &tenant).await {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    match store.list_users().await {
        Ok(users) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "Users fetched successfully",
                "data": users,
            })),
        )
            .into_response(),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "user list failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch users")
        }
    }
}

pub async fn get_user(
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

    match store.get_user(id).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "User fetched successfully",
                "data": user,
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "user fetch failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch user")
        }
    }
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(draft): Json<UserDraft>,
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

    match store.update_user(id, validated).await {
        Ok(Some(user)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "User updated successfully",
                "data": user,
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "user update failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update user")
        }
    }
}

pub async fn delete_user(
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

    match store.delete_user(id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "success",
                "message": "User deleted successfully",
            })),
        )
            .into_response(),
        Ok(false) => errors::json_error(StatusCode::NOT_FOUND, "User not found"),
        Err(err) => {
            error!(tenant_id = %tenant.tenant_id(), error = %err, "user delete failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete user")
        }
    }
}
