//! Health check endpoint.

use crate::AppResources;
use axum::{Extension, http::StatusCode};

/// Tag for OpenAPI documentation.
pub const MISC_TAG: &str = "Miscellaneous";

/// Liveness plus a database ping.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service health check",
    description = "Returns `ok` when the service accepts requests and the database answers a ping.",
    responses(
        (status = 200, description = "Service is healthy", body = str, content_type = "text/plain", example = "ok"),
        (status = 503, description = "Database unreachable", body = str, content_type = "text/plain")
    )
)]
pub async fn health(Extension(resources): Extension<AppResources>) -> (StatusCode, &'static str) {
    match resources.db.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
        }
    }
}
