use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use orderflow_core::ValidationErrors;
use orderflow_infra::RegistryError;

/// `{ "status": "error", "message": ... }` with the given status code.
pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "status": "error",
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 400 with the full field-error list from a validation pass.
pub fn validation_failed(errors: ValidationErrors) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        axum::Json(json!({
            "status": "error",
            "message": "Validation failed. Please check the input fields.",
            "errors": errors.into_errors(),
        })),
    )
        .into_response()
}

/// Map a registry failure on the read path.
pub fn registry_error_to_response(err: RegistryError) -> axum::response::Response {
    match err {
        RegistryError::InvalidTenant => {
            json_error(StatusCode::BAD_REQUEST, "Tenant ID is required")
        }
        RegistryError::Unavailable(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to connect to tenant database",
        ),
    }
}
