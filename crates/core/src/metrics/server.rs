//! HTTP exposition of the prometheus registry.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use super::PrometheusMetricsService;

async fn metrics_handler(State(service): State<Arc<PrometheusMetricsService>>) -> Response {
    match service.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Router serving `GET /metrics`.
pub fn metrics_router(service: Arc<PrometheusMetricsService>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(service)
}

/// Serve metrics on `0.0.0.0:port` until `shutdown` flips to `true`.
pub async fn serve_metrics(
    service: Arc<PrometheusMetricsService>,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Metrics endpoint listening");

    axum::serve(listener, metrics_router(service))
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}
