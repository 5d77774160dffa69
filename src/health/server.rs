//! HTTP health endpoint.
//!
//! `GET /health` answers `200 Healthy` while the publisher reports Serving
//! and `503` otherwise.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::health::publisher::{HealthPublisher, HealthStatus};

pub struct HealthServer {
    publisher: Arc<HealthPublisher>,
}

impl HealthServer {
    /// Server reporting the status held by `publisher`.
    pub fn new(publisher: Arc<HealthPublisher>) -> Self {
        Self { publisher }
    }

    /// Router with `GET /health` and request tracing.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .with_state(self.publisher.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until `token` is cancelled.
    pub async fn serve(self, listener: TcpListener, token: CancellationToken) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Health server starting");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(token.cancelled_owned())
            .await?;

        tracing::info!("Health server stopped");
        Ok(())
    }
}

async fn health_handler(State(publisher): State<Arc<HealthPublisher>>) -> Response {
    match publisher.current_status() {
        HealthStatus::Serving => (StatusCode::OK, "Healthy").into_response(),
        status => (StatusCode::SERVICE_UNAVAILABLE, status.to_string()).into_response(),
    }
}
