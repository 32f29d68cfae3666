//! Health check endpoint.

use axum::Extension;
use axum::Json;
use axum::http::StatusCode;
use sea_orm::ConnectionTrait;
use serde_json::json;

use crate::AppResources;
use crate::api::MISC_TAG;

/// Liveness probe: verifies the database connection answers.
#[tracing::instrument(skip(resources))]
#[utoipa::path(
    get,
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    responses(
        (status = 200, description = "Engine and database are healthy"),
        (status = 503, description = "Database unreachable")
    )
)]
pub async fn healthz(
    Extension(resources): Extension<AppResources>,
) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = resources
        .db
        .execute_unprepared("SELECT 1")
        .await
        .is_ok();

    if db_ok {
        (StatusCode::OK, Json(json!({"status": "ok"})))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "degraded", "database": "unreachable"})),
        )
    }
}
