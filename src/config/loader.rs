//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content)?;

  info!(
    stream_url = %config.stream.url,
    lookup_workers = config.lookup.workers,
    persist_workers = config.stream.persist_workers,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Read the stream API key from the configured environment variable.
pub fn stream_api_key(config: &AppConfig) -> Result<String> {
  let var = &config.stream.api_key_env;
  let key = std::env::var(var).with_context(|| format!("Environment variable {var} is not set"))?;
  anyhow::ensure!(!key.trim().is_empty(), "Environment variable {var} is empty");
  Ok(key)
}

/// Validate all configuration parameters.
fn validate_config(config: &AppConfig) -> Result<()> {
  // Stream validation
  let stream = &config.stream;
  anyhow::ensure!(
    stream.url.starts_with("ws://") || stream.url.starts_with("wss://"),
    "stream.url must be a ws:// or wss:// URL, got {}",
    stream.url
  );
  anyhow::ensure!(
    !stream.api_key_env.is_empty(),
    "stream.api_key_env must not be empty"
  );
  anyhow::ensure!(
    stream.tracked_vessel_limit > 0,
    "stream.tracked_vessel_limit must be positive"
  );
  anyhow::ensure!(
    stream.reconnect_base_delay_ms > 0,
    "stream.reconnect_base_delay_ms must be positive"
  );
  anyhow::ensure!(
    stream.reconnect_max_delay_ms >= stream.reconnect_base_delay_ms,
    "stream.reconnect_max_delay_ms ({}) must be >= reconnect_base_delay_ms ({})",
    stream.reconnect_max_delay_ms,
    stream.reconnect_base_delay_ms
  );
  anyhow::ensure!(
    stream.persist_queue_capacity > 0,
    "stream.persist_queue_capacity must be positive"
  );
  anyhow::ensure!(
    stream.persist_workers > 0,
    "stream.persist_workers must be positive"
  );
  anyhow::ensure!(
    stream.stats_interval_seconds > 0,
    "stream.stats_interval_seconds must be positive"
  );

  let bbox = &stream.bounding_box;
  bbox.south_west
    .validate()
    .and_then(|()| bbox.north_east.validate())
    .context("stream.bounding_box is out of range")?;
  anyhow::ensure!(
    bbox.south_west.latitude <= bbox.north_east.latitude,
    "stream.bounding_box south_west must lie south of north_east"
  );

  // Lookup validation
  let lookup = &config.lookup;
  anyhow::ensure!(
    lookup.base_url.starts_with("http://") || lookup.base_url.starts_with("https://"),
    "lookup.base_url must be an http(s) URL, got {}",
    lookup.base_url
  );
  anyhow::ensure!(lookup.timeout_ms > 0, "lookup.timeout_ms must be positive");
  anyhow::ensure!(
    lookup.workers > 0 && lookup.workers <= 16,
    "lookup.workers must be in (0, 16], got {}",
    lookup.workers
  );
  anyhow::ensure!(
    lookup.max_attempts > 0,
    "lookup.max_attempts must be positive"
  );
  anyhow::ensure!(
    lookup.requests_per_minute > 0,
    "lookup.requests_per_minute must be positive"
  );

  // Persistence validation
  anyhow::ensure!(
    !config.persistence.data_dir.is_empty()
      && !config.persistence.log_dir.is_empty()
      && !config.persistence.archive_dir.is_empty(),
    "persistence directories must not be empty"
  );

  Ok(())
}
