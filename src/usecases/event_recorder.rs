//! Event Recorder - Atomic Counters and Structured Event Records
//!
//! Owns the process-wide pipeline counters and turns every notable
//! occurrence into an `EventRecord`:
//! - Counters are lock-free (`fetch_add` / `load`), never exposed raw
//! - Each record carries a counters snapshot, timestamp and uptime
//! - Records go to `tracing` immediately and to the `EventLog` port via a
//!   single writer task fed through a bounded channel
//! - A periodic task emits derived throughput metrics

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::ports::event_log::{EventLog, EventRecord, StatsSnapshot};

/// Default capacity of the record channel feeding the log writer.
pub const DEFAULT_LOG_CAPACITY: usize = 1024;

/// Pipeline counters. Monotonic for the lifetime of the process.
#[derive(Debug, Default)]
pub struct StreamStats {
  messages_received: AtomicU64,
  messages_saved: AtomicU64,
  errors: AtomicU64,
  reconnects: AtomicU64,
}

impl StreamStats {
  pub fn record_received(&self) {
    self.messages_received.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_saved(&self) {
    self.messages_saved.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_error(&self) {
    self.errors.fetch_add(1, Ordering::Relaxed);
  }

  pub fn record_reconnect(&self) {
    self.reconnects.fetch_add(1, Ordering::Relaxed);
  }

  /// Read all counters. Individual loads; not a consistent cut.
  pub fn snapshot(&self) -> StatsSnapshot {
    StatsSnapshot {
      messages_received: self.messages_received.load(Ordering::Relaxed),
      messages_saved: self.messages_saved.load(Ordering::Relaxed),
      errors: self.errors.load(Ordering::Relaxed),
      reconnects: self.reconnects.load(Ordering::Relaxed),
    }
  }
}

/// Kinds of recorded events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
  Startup,
  ConnectionAttempt,
  ConnectionSuccess,
  ConnectionError,
  SubscriptionSuccess,
  SubscriptionError,
  DatabaseSuccess,
  DatabaseError,
  WebsocketError,
  Reconnection,
  ReconnectExhausted,
  ParseError,
  ValidationError,
  UnknownVessel,
  LookupRetry,
  LookupFailed,
  ResolutionComplete,
  Statistics,
  Shutdown,
}

impl EventType {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Startup => "startup",
      Self::ConnectionAttempt => "connection_attempt",
      Self::ConnectionSuccess => "connection_success",
      Self::ConnectionError => "connection_error",
      Self::SubscriptionSuccess => "subscription_success",
      Self::SubscriptionError => "subscription_error",
      Self::DatabaseSuccess => "database_success",
      Self::DatabaseError => "database_error",
      Self::WebsocketError => "websocket_error",
      Self::Reconnection => "reconnection",
      Self::ReconnectExhausted => "reconnect_exhausted",
      Self::ParseError => "parse_error",
      Self::ValidationError => "validation_error",
      Self::UnknownVessel => "unknown_vessel",
      Self::LookupRetry => "lookup_retry",
      Self::LookupFailed => "lookup_failed",
      Self::ResolutionComplete => "resolution_complete",
      Self::Statistics => "statistics",
      Self::Shutdown => "shutdown",
    }
  }

  const fn is_error(self) -> bool {
    matches!(
      self,
      Self::ConnectionError
        | Self::SubscriptionError
        | Self::DatabaseError
        | Self::WebsocketError
        | Self::ReconnectExhausted
        | Self::ParseError
        | Self::ValidationError
        | Self::UnknownVessel
        | Self::LookupRetry
        | Self::LookupFailed
    )
  }
}

/// Throughput figures derived from the counters at emission time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetrics {
  pub messages_per_minute: f64,
  /// Saved / received, in percent. Zero before the first message.
  pub save_success_rate: f64,
}

/// Shared recorder handed by `Arc` to every pipeline component.
pub struct EventRecorder {
  /// Pipeline counters.
  stats: StreamStats,
  /// Recorder creation time, for uptime.
  started: Instant,
  /// Channel to the log writer task, if one is attached.
  log_tx: Option<mpsc::Sender<EventRecord>>,
}

impl EventRecorder {
  /// Recorder that only traces (no durable log).
  pub fn new() -> Self {
    Self {
      stats: StreamStats::default(),
      started: Instant::now(),
      log_tx: None,
    }
  }

  /// Recorder that also appends every record to `log`.
  ///
  /// Spawns the writer task; it ends once the recorder is dropped and the
  /// channel has drained.
  pub fn with_log(log: Arc<dyn EventLog>, capacity: usize) -> (Self, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<EventRecord>(capacity.max(1));

    let writer = tokio::spawn(async move {
      while let Some(record) = rx.recv().await {
        if let Err(e) = log.append(&record).await {
          warn!(error = %e, event_type = record.event_type, "Failed to append event record");
        }
      }
    });

    let recorder = Self {
      stats: StreamStats::default(),
      started: Instant::now(),
      log_tx: Some(tx),
    };
    (recorder, writer)
  }

  pub const fn stats(&self) -> &StreamStats {
    &self.stats
  }

  pub fn snapshot(&self) -> StatsSnapshot {
    self.stats.snapshot()
  }

  pub fn uptime(&self) -> Duration {
    self.started.elapsed()
  }

  /// Record an event with the current counter snapshot.
  ///
  /// `extra` should be a JSON object; its fields are flattened into the
  /// record. Any other value is stored under `"value"`.
  pub fn log_event(&self, event: EventType, message: &str, extra: Value) {
    let extra = match extra {
      Value::Object(map) => map,
      Value::Null => Map::new(),
      other => Map::from_iter([("value".to_string(), other)]),
    };

    let record = EventRecord {
      timestamp: Utc::now(),
      event_type: event.as_str(),
      message: message.to_string(),
      uptime: format_uptime(self.uptime()),
      stats: self.snapshot(),
      extra,
    };

    let extra_json = Value::Object(record.extra.clone());
    if event.is_error() {
      warn!(
        event_type = record.event_type,
        messages_received = record.stats.messages_received,
        messages_saved = record.stats.messages_saved,
        errors = record.stats.errors,
        reconnects = record.stats.reconnects,
        extra = %extra_json,
        "{message}"
      );
    } else {
      info!(
        event_type = record.event_type,
        messages_received = record.stats.messages_received,
        messages_saved = record.stats.messages_saved,
        errors = record.stats.errors,
        reconnects = record.stats.reconnects,
        extra = %extra_json,
        "{message}"
      );
    }

    if let Some(tx) = &self.log_tx {
      if let Err(mpsc::error::TrySendError::Full(dropped)) = tx.try_send(record) {
        warn!(event_type = dropped.event_type, "Event log backlog full, record not persisted");
      }
    }
  }

  /// Count one error and record it.
  pub fn record_error(&self, event: EventType, message: &str, extra: Value) {
    self.stats.record_error();
    self.log_event(event, message, extra);
  }

  /// Throughput and save ratio since start.
  pub fn derived_metrics(&self) -> DerivedMetrics {
    let snapshot = self.snapshot();
    #[allow(clippy::cast_precision_loss)]
    let received = snapshot.messages_received as f64;
    #[allow(clippy::cast_precision_loss)]
    let saved = snapshot.messages_saved as f64;
    let minutes = self.uptime().as_secs_f64() / 60.0;

    DerivedMetrics {
      messages_per_minute: if minutes > 0.0 { received / minutes } else { 0.0 },
      save_success_rate: if received > 0.0 { saved / received * 100.0 } else { 0.0 },
    }
  }

  /// Emit a statistics event every `interval` until cancelled.
  #[instrument(skip(self, cancel))]
  pub async fn run_periodic(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
      tokio::select! {
        biased;
        () = cancel.cancelled() => break,
        _ = ticker.tick() => {
          let metrics = self.derived_metrics();
          self.log_event(
            EventType::Statistics,
            "Periodic statistics update",
            json!({
              "messages_per_minute": metrics.messages_per_minute,
              "save_success_rate": metrics.save_success_rate,
            }),
          );
        }
      }
    }
  }
}

impl Default for EventRecorder {
  fn default() -> Self {
    Self::new()
  }
}

/// Compact duration rendering (`1h2m3s`, `4m5s`, `6.250s`).
fn format_uptime(uptime: Duration) -> String {
  let secs = uptime.as_secs();
  let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);

  if hours > 0 {
    format!("{hours}h{minutes}m{seconds}s")
  } else if minutes > 0 {
    format!("{minutes}m{seconds}s")
  } else {
    format!("{seconds}.{:03}s", uptime.subsec_millis())
  }
}
