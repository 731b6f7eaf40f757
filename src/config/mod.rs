//! Configuration Module - TOML-based Service Configuration
//!
//! Loads and validates configuration from `config.toml`. Endpoints,
//! timing and pool sizes are externalized here; the stream API key is
//! read from the environment variable named in `[stream]` and never
//! stored in the file.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

use crate::domain::backoff::{ReconnectPolicy, RetryPolicy};
use crate::domain::subscription::BoundingBox;
use crate::usecases::{lookup_pool, position_writer};

/// Top-level service configuration.
///
/// Every section is optional in the file; missing sections take their
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Position feed connection.
  pub stream: StreamConfig,
  /// External identity lookups.
  pub lookup: LookupConfig,
  /// File locations.
  pub persistence: PersistenceConfig,
  /// Metrics and monitoring.
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  pub log_level: String,
}

impl Default for ServiceConfig {
  fn default() -> Self {
    Self {
      name: "vessel-tracker".to_string(),
      log_level: "info".to_string(),
    }
  }
}

/// Position feed configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
  /// WebSocket endpoint.
  pub url: String,
  /// Environment variable holding the API key.
  pub api_key_env: String,
  /// Geographic filter (defaults to the whole earth).
  pub bounding_box: BoundingBox,
  /// Number of top vessels (by appearances) to track.
  pub tracked_vessel_limit: usize,
  /// First reconnect delay.
  pub reconnect_base_delay_ms: u64,
  /// Reconnect delay ceiling before jitter.
  pub reconnect_max_delay_ms: u64,
  /// Upper bound of the random jitter added to each delay.
  pub reconnect_jitter_ms: u64,
  /// Reconnect attempts before giving up (0 = unlimited).
  pub max_reconnect_attempts: u32,
  /// Bounded persistence queue capacity.
  pub persist_queue_capacity: usize,
  /// Persistence workers draining the queue.
  pub persist_workers: usize,
  /// Interval of the statistics event.
  pub stats_interval_seconds: u64,
  /// Archive every decoded frame verbatim.
  pub archive_raw_frames: bool,
  /// Reconnect after this long without a frame (0 = never).
  pub read_timeout_seconds: u64,
}

impl Default for StreamConfig {
  fn default() -> Self {
    Self {
      url: "wss://stream.aisstream.io/v0/stream".to_string(),
      api_key_env: "AIS_STREAM_API_KEY".to_string(),
      bounding_box: BoundingBox::whole_earth(),
      tracked_vessel_limit: 50,
      reconnect_base_delay_ms: 1000,
      reconnect_max_delay_ms: 60_000,
      reconnect_jitter_ms: 1000,
      max_reconnect_attempts: 0,
      persist_queue_capacity: position_writer::DEFAULT_QUEUE_CAPACITY,
      persist_workers: position_writer::DEFAULT_WORKERS,
      stats_interval_seconds: 300,
      archive_raw_frames: false,
      read_timeout_seconds: 300,
    }
  }
}

impl StreamConfig {
  pub const fn reconnect_policy(&self) -> ReconnectPolicy {
    ReconnectPolicy {
      base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
      max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
      max_jitter: Duration::from_millis(self.reconnect_jitter_ms),
      max_attempts: if self.max_reconnect_attempts == 0 {
        None
      } else {
        Some(self.max_reconnect_attempts)
      },
    }
  }

  pub const fn stats_interval(&self) -> Duration {
    Duration::from_secs(self.stats_interval_seconds)
  }

  pub const fn read_timeout(&self) -> Option<Duration> {
    if self.read_timeout_seconds == 0 {
      None
    } else {
      Some(Duration::from_secs(self.read_timeout_seconds))
    }
  }
}

/// External identity lookup configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
  /// Lookup host (scheme + host).
  pub base_url: String,
  /// Per-request timeout.
  pub timeout_ms: u64,
  /// Concurrent lookup workers.
  pub workers: usize,
  /// Attempts per identifier.
  pub max_attempts: u32,
  /// Linear backoff step between attempts.
  pub backoff_step_ms: u64,
  /// Outbound request budget.
  pub requests_per_minute: u32,
  /// Browser-like user agent.
  pub user_agent: String,
}

impl Default for LookupConfig {
  fn default() -> Self {
    Self {
      base_url: "https://www.vesselfinder.com".to_string(),
      timeout_ms: 5000,
      workers: lookup_pool::DEFAULT_WORKERS,
      max_attempts: 3,
      backoff_step_ms: 1000,
      requests_per_minute: 60,
      user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/91.0.4472.124".to_string(),
    }
  }
}

impl LookupConfig {
  pub const fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_attempts: self.max_attempts,
      step: Duration::from_millis(self.backoff_step_ms),
    }
  }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
  /// Vessel / location snapshots and position history.
  pub data_dir: String,
  /// Daily event logs.
  pub log_dir: String,
  /// Raw frame archive.
  pub archive_dir: String,
}

impl Default for PersistenceConfig {
  fn default() -> Self {
    Self {
      data_dir: "data".to_string(),
      log_dir: "logs".to_string(),
      archive_dir: "ais_data".to_string(),
    }
  }
}

/// Metrics and health check configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
  /// Enable the Prometheus and health servers.
  pub enabled: bool,
  /// Prometheus bind address.
  pub bind_address: String,
  /// Health check port.
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      bind_address: "0.0.0.0:9090".to_string(),
      health_port: 8080,
    }
  }
}
