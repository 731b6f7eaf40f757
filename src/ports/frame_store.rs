//! Frame Store Port - Raw Feed Frame Archive

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Destination for verbatim inbound frames.
#[async_trait]
pub trait RawFrameStore: Send + Sync + 'static {
  /// Store one frame as received at `received_at`.
  async fn archive(&self, raw: &str, received_at: DateTime<Utc>) -> anyhow::Result<()>;
}
