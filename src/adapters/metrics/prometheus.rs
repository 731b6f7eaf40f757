//! Prometheus Metrics Registry - Pipeline Observability
//!
//! Mirrors the pipeline counters as gauges and exposes them on
//! `/metrics`. Values are pulled from the `EventRecorder` and the
//! connection state on every scrape; nothing pushes into the registry.

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use prometheus::{Encoder, IntGauge, Registry, TextEncoder};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::usecases::event_recorder::EventRecorder;
use crate::usecases::stream_manager::ConnectionState;

/// Gauges for the ingestion pipeline, all prefixed `vessel_tracker_`.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Source of the counter values.
    recorder: Arc<EventRecorder>,
    /// Source of the connection state.
    state: watch::Receiver<ConnectionState>,
    /// Frames received from the feed.
    pub messages_received: IntGauge,
    /// Position reports persisted.
    pub messages_saved: IntGauge,
    /// Errors of any kind.
    pub errors: IntGauge,
    /// Reconnects after read failures.
    pub reconnects: IntGauge,
    /// 1 while streaming, 0 otherwise.
    pub stream_connected: IntGauge,
}

impl MetricsRegistry {
    /// Create and register all gauges.
    pub fn new(
        recorder: Arc<EventRecorder>,
        state: watch::Receiver<ConnectionState>,
    ) -> anyhow::Result<Self> {
        let registry = Registry::new();

        let messages_received = IntGauge::new(
            "vessel_tracker_messages_received",
            "Frames received from the position feed",
        )?;
        let messages_saved = IntGauge::new(
            "vessel_tracker_messages_saved",
            "Position reports persisted",
        )?;
        let errors = IntGauge::new("vessel_tracker_errors", "Errors recorded by the pipeline")?;
        let reconnects = IntGauge::new(
            "vessel_tracker_reconnects",
            "Reconnects after stream read failures",
        )?;
        let stream_connected = IntGauge::new(
            "vessel_tracker_stream_connected",
            "Stream connection status (1=streaming, 0=not streaming)",
        )?;

        registry.register(Box::new(messages_received.clone()))?;
        registry.register(Box::new(messages_saved.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;
        registry.register(Box::new(stream_connected.clone()))?;

        Ok(Self {
            registry,
            recorder,
            state,
            messages_received,
            messages_saved,
            errors,
            reconnects,
            stream_connected,
        })
    }

    /// Copy the current counter values into the gauges.
    pub fn refresh(&self) {
        let to_i64 = |v: u64| i64::try_from(v).unwrap_or(i64::MAX);
        let stats = self.recorder.snapshot();

        self.messages_received.set(to_i64(stats.messages_received));
        self.messages_saved.set(to_i64(stats.messages_saved));
        self.errors.set(to_i64(stats.errors));
        self.reconnects.set(to_i64(stats.reconnects));
        self.stream_connected
            .set(i64::from(*self.state.borrow() == ConnectionState::Streaming));
    }

    /// Refresh and render in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        self.refresh();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Serve `/metrics` on `bind_address` until cancelled.
    #[instrument(skip(self, cancel))]
    pub async fn serve(self: Arc<Self>, bind_address: String, cancel: CancellationToken) -> anyhow::Result<()> {
        let metrics = Arc::clone(&self);
        let app = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move {
                    metrics
                        .render()
                        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_mirrors_counters_and_state() {
        let recorder = Arc::new(EventRecorder::new());
        recorder.stats().record_received();
        recorder.stats().record_received();
        recorder.stats().record_reconnect();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Streaming);

        let metrics = MetricsRegistry::new(Arc::clone(&recorder), state_rx).unwrap();
        let text = metrics.render().unwrap();
        assert!(text.contains("vessel_tracker_messages_received 2"));
        assert!(text.contains("vessel_tracker_reconnects 1"));
        assert!(text.contains("vessel_tracker_stream_connected 1"));

        state_tx.send_replace(ConnectionState::Reconnecting);
        metrics.refresh();
        assert_eq!(metrics.stream_connected.get(), 0);
    }
}
