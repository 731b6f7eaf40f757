//! Frame Archive - Verbatim Inbound Frame Files
//!
//! Layout: `<archive_dir>/YYYY-MM-DD/HH/<unix_nanos>.json`, one frame
//! per file, partitioned by receive time (UTC).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use crate::ports::frame_store::RawFrameStore;

pub struct FrameArchive {
    root: PathBuf,
}

impl FrameArchive {
    pub async fn new(archive_dir: &Path) -> Result<Self> {
        fs::create_dir_all(archive_dir)
            .await
            .context("Failed to create archive directory")?;
        Ok(Self {
            root: archive_dir.to_path_buf(),
        })
    }

    fn path_for(&self, received_at: DateTime<Utc>) -> (PathBuf, PathBuf) {
        let dir = self
            .root
            .join(received_at.format("%Y-%m-%d").to_string())
            .join(received_at.format("%H").to_string());
        let nanos = received_at
            .timestamp_nanos_opt()
            .unwrap_or_else(|| received_at.timestamp_micros().saturating_mul(1000));
        let file = dir.join(format!("{nanos}.json"));
        (dir, file)
    }
}

#[async_trait]
impl RawFrameStore for FrameArchive {
    async fn archive(&self, raw: &str, received_at: DateTime<Utc>) -> Result<()> {
        let (dir, file) = self.path_for(received_at);
        fs::create_dir_all(&dir)
            .await
            .context("Failed to create archive partition")?;
        fs::write(&file, raw)
            .await
            .with_context(|| format!("Failed to write frame {}", file.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_frames_are_partitioned_by_day_and_hour() {
        let dir = TempDir::new().unwrap();
        let archive = FrameArchive::new(dir.path()).await.unwrap();
        let at = Utc.with_ymd_and_hms(2024, 11, 21, 7, 30, 0).unwrap();

        archive.archive("{\"MessageType\":\"x\"}", at).await.unwrap();

        let expected = dir
            .path()
            .join("2024-11-21")
            .join("07")
            .join(format!("{}.json", at.timestamp_nanos_opt().unwrap()));
        assert_eq!(
            fs::read_to_string(expected).await.unwrap(),
            "{\"MessageType\":\"x\"}"
        );
    }
}
