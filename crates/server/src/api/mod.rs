//! HTTP surface of the engine.
//!
//! Deliberately small: the admin/CRUD API lives in an external service.
//! The engine itself only exposes:
//! - `/healthz` - liveness + database reachability
//! - `/metrics` - Prometheus text exposition of the process registry

pub mod health;
pub mod metrics;

use axum::Extension;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::AppResources;

pub const MISC_TAG: &str = "Miscellaneous";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Uptime Sentinel Engine",
        description = "Probing and aggregation engine internals: health and metrics."
    ),
    tags((name = MISC_TAG, description = "Operational endpoints"))
)]
struct ApiDoc;

/// Serve the operational endpoints until shutdown.
#[tracing::instrument(skip(resources, shutdown))]
pub async fn start_webserver(
    resources: AppResources,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> color_eyre::Result<()> {
    let port = resources.config.server.port;

    let (router, _openapi) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .routes(routes!(health::healthz))
        .routes(routes!(metrics::metrics))
        .split_for_parts();

    let router = router
        .layer(Extension(resources))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Webserver listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    return;
                }
            }
        })
        .await?;
    Ok(())
}
