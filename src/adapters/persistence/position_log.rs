//! Position Log - Append-only JSONL Position History
//!
//! Persists position rows to daily JSONL files
//! `positions/YYYY-MM-DD.jsonl`, partitioned by the report's own
//! timestamp. Each line is a self-contained JSON record.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::vessel::{GeoPoint, Mmsi};

/// One stored position row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRow {
    /// Row identifier.
    pub id: Uuid,
    pub mmsi: Mmsi,
    pub latitude: f64,
    pub longitude: f64,
    /// Report time from the feed.
    pub timestamp: DateTime<Utc>,
    /// Time the row was written.
    pub recorded_at: DateTime<Utc>,
}

impl PositionRow {
    pub fn new(mmsi: Mmsi, position: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mmsi,
            latitude: position.latitude,
            longitude: position.longitude,
            timestamp,
            recorded_at: Utc::now(),
        }
    }

    pub const fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Append-only JSONL position history with daily partitions.
pub struct PositionLog {
    dir: PathBuf,
}

impl PositionLog {
    /// Create the log under `<data_dir>/positions`.
    pub async fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("positions");
        fs::create_dir_all(&dir)
            .await
            .context("Failed to create positions directory")?;
        Ok(Self { dir })
    }

    /// Append a row to the file of its report date.
    #[instrument(skip(self, row), fields(mmsi = %row.mmsi))]
    pub async fn append(&self, row: &PositionRow) -> Result<()> {
        let date = row.timestamp.format("%Y-%m-%d").to_string();
        let path = self.dir.join(format!("{date}.jsonl"));

        let mut json = serde_json::to_string(row).context("Failed to serialize position row")?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open position log file")?;

        file.write_all(json.as_bytes())
            .await
            .context("Failed to write position row")?;
        file.flush().await.context("Failed to flush position log")?;

        Ok(())
    }

    /// All rows for `mmsi`, oldest first.
    #[instrument(skip(self))]
    pub async fn load_for(&self, mmsi: &Mmsi) -> Result<Vec<PositionRow>> {
        let mut rows = Vec::new();
        let mut entries = fs::read_dir(&self.dir)
            .await
            .context("Failed to list positions directory")?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "jsonl") {
                continue;
            }

            let content = fs::read_to_string(&path).await?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<PositionRow>(line) {
                    Ok(row) if &row.mmsi == mmsi => rows.push(row),
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            file = %path.display(),
                            error = %e,
                            "Skipping malformed position row"
                        );
                    }
                }
            }
        }

        rows.sort_by_key(|row| row.timestamp);
        Ok(rows)
    }
}
