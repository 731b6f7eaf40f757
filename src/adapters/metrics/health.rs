//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live and /ready endpoints via axum 0.7 for container
//! health checks. Ready only while the stream is in `Streaming`.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::usecases::stream_manager::ConnectionState;

/// Axum-based health check HTTP server.
pub struct HealthServer {
    /// Connection state published by the stream manager.
    state: watch::Receiver<ConnectionState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    pub const fn new(state: watch::Receiver<ConnectionState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Serve until cancelled.
    #[instrument(skip(self, cancel))]
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<()> {
        let app = router(self.state);

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        Ok(())
    }
}

fn router(state: watch::Receiver<ConnectionState>) -> Router {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

/// Liveness probe: always 200 while the process runs.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Readiness probe: 200 only while streaming.
async fn readiness(State(state): State<watch::Receiver<ConnectionState>>) -> impl IntoResponse {
    let current = *state.borrow();
    if current == ConnectionState::Streaming {
        (StatusCode::OK, "READY".to_string())
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("NOT READY ({})", current.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[tokio::test]
    async fn test_ready_tracks_stream_state() {
        let (tx, rx) = watch::channel(ConnectionState::Connecting);
        let response = readiness(State(rx.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        tx.send_replace(ConnectionState::Streaming);
        let response = readiness(State(rx)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_live_is_always_ok() {
        assert_eq!(liveness().await.into_response().status(), StatusCode::OK);
    }
}
