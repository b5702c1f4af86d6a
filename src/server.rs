use crate::error::Result;
use crate::health::HealthService;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Extension, Router,
};
use hyper::Server;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Detailed per-check report. Always 200; failures live in the body.
async fn health(Extension(health): Extension<Arc<HealthService>>) -> impl IntoResponse {
    Json(health.report().await)
}

async fn gtg(Extension(health): Extension<Arc<HealthService>>) -> impl IntoResponse {
    let status = health.gtg().await;
    let code = if status.good_to_go {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        [
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::CONTENT_TYPE, "text/plain; charset=US-ASCII"),
        ],
        status.message,
    )
}

async fn build_info() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "repository": env!("CARGO_PKG_REPOSITORY"),
    }))
}

async fn ping() -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")],
        "pong",
    )
}

pub fn create_server(health_service: Arc<HealthService>) -> Router {
    Router::new()
        .route("/__health", get(health))
        .route("/__gtg", get(gtg))
        .route("/__build-info", get(build_info))
        .route("/__ping", get(ping))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(Extension(health_service)),
        )
}

/// Serves the ops endpoints until `shutdown` resolves.
pub async fn start_server<F>(
    health_service: Arc<HealthService>,
    port: u16,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let app = create_server(health_service);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let builder = Server::try_bind(&addr)?;
    info!("Ops endpoints listening on http://{}", addr);
    builder
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
