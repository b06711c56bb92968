use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::app::services::AppServices;

#[derive(Debug, Deserialize)]
pub struct NotifyRequest {
    /// Forwarded verbatim inside `{ "message": ... }`; any JSON is accepted.
    #[serde(default)]
    pub message: serde_json::Value,
}

/// Trigger a fan-out to every connected real-time client.
///
/// Deliberately not wired into the order pipeline, and not tenant-scoped:
/// the broadcast is global (preserved behavior, flagged in DESIGN.md).
pub async fn notify(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<NotifyRequest>,
) -> axum::response::Response {
    let delivered = services
        .hub
        .broadcast(&serde_json::json!({ "message": body.message }));

    tracing::debug!(delivered, "notification broadcast");

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "success",
            "message": "Notification sent",
        })),
    )
        .into_response()
}
