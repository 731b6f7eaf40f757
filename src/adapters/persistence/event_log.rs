//! Daily Event Log - Rolling JSONL Event Records
//!
//! Appends every event record to `ais_stream_YYYY-MM-DD.log` in the
//! log directory; the file name follows the record's own date.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::ports::event_log::{EventLog, EventRecord};

pub struct DailyEventLog {
    dir: PathBuf,
}

impl DailyEventLog {
    pub async fn new(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)
            .await
            .context("Failed to create log directory")?;
        Ok(Self {
            dir: log_dir.to_path_buf(),
        })
    }

    fn file_for(&self, record: &EventRecord) -> PathBuf {
        let date = record.timestamp.format("%Y-%m-%d");
        self.dir.join(format!("ais_stream_{date}.log"))
    }
}

#[async_trait]
impl EventLog for DailyEventLog {
    async fn append(&self, record: &EventRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("Failed to serialize event record")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.file_for(record))
            .await
            .context("Failed to open event log file")?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write event record")?;
        file.flush().await.context("Failed to flush event log")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::Map;
    use tempfile::TempDir;

    use super::*;
    use crate::ports::event_log::StatsSnapshot;

    #[tokio::test]
    async fn test_records_land_in_the_file_of_their_day() {
        let dir = TempDir::new().unwrap();
        let log = DailyEventLog::new(dir.path()).await.unwrap();
        let record = EventRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 11, 21, 23, 59, 59).unwrap(),
            event_type: "startup",
            message: "Starting".to_string(),
            uptime: "0.000s".to_string(),
            stats: StatsSnapshot::default(),
            extra: Map::new(),
        };

        log.append(&record).await.unwrap();
        log.append(&record).await.unwrap();

        let content = fs::read_to_string(dir.path().join("ais_stream_2024-11-21.log"))
            .await
            .unwrap();
        assert_eq!(content.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(first["timestamp"], "2024-11-21T23:59:59Z");
        assert_eq!(first["stats"]["messages_received"], 0);
    }
}
