//! Event Log Port - Durable Structured Event Records
//!
//! Receives every record produced by the event recorder. The file
//! adapter rolls over per day; tests can collect records in memory.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Counter values captured at the moment an event is recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
  pub messages_received: u64,
  pub messages_saved: u64,
  pub errors: u64,
  pub reconnects: u64,
}

/// One structured event, serialized as a single JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
  /// RFC 3339 wall-clock time.
  #[serde(serialize_with = "rfc3339")]
  pub timestamp: DateTime<Utc>,
  pub event_type: &'static str,
  pub message: String,
  /// Human-readable time since the recorder started.
  pub uptime: String,
  pub stats: StatsSnapshot,
  /// Event-specific fields, flattened into the top-level object.
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

fn rfc3339<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Sink for event records.
#[async_trait]
pub trait EventLog: Send + Sync + 'static {
  async fn append(&self, record: &EventRecord) -> anyhow::Result<()>;
}
