//! Prometheus metrics endpoint.

use axum::Extension;
use axum::http::StatusCode;

use crate::AppResources;
use crate::api::MISC_TAG;

/// Prometheus metrics in the text exposition format.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/metrics",
    tag = MISC_TAG,
    operation_id = "Prometheus Metrics",
    responses(
        (status = 200, description = "Prometheus metrics in text exposition format", body = String, content_type = "text/plain")
    )
)]
pub async fn metrics(Extension(resources): Extension<AppResources>) -> (StatusCode, String) {
    match resources.metrics.render_text() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
