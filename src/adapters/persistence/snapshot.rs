//! Snapshot File - Atomic JSON Document Persistence
//!
//! Writes a whole document to `<name>.tmp` and renames it over
//! `<name>`, so the file on disk is always either the previous or the
//! new version. Callers serialize concurrent saves.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::{debug, info, instrument};

/// One atomically replaced JSON document.
pub struct SnapshotFile {
    /// Final document path.
    path: PathBuf,
    /// Temporary path for atomic writes.
    tmp_path: PathBuf,
}

impl SnapshotFile {
    /// Snapshot `file_name` inside `dir`, creating the directory.
    pub async fn new(dir: &Path, file_name: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        Ok(Self {
            path: dir.join(file_name),
            tmp_path: dir.join(format!("{file_name}.tmp")),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save `value` atomically (tmp → rename).
    #[instrument(skip(self, value), fields(path = %self.path.display()))]
    pub async fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).context("Failed to serialize snapshot")?;

        fs::write(&self.tmp_path, &json)
            .await
            .context("Failed to write tmp snapshot file")?;

        fs::rename(&self.tmp_path, &self.path)
            .await
            .context("Failed to rename snapshot file")?;

        debug!(bytes = json.len(), "Snapshot saved");
        Ok(())
    }

    /// Load the document, `None` if it was never written.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            info!("No snapshot found, starting empty");
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .await
            .context("Failed to read snapshot file")?;
        let value = serde_json::from_str(&json).context("Failed to parse snapshot JSON")?;

        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_save_then_load_replaces_document() {
        let dir = TempDir::new().unwrap();
        let file = SnapshotFile::new(dir.path(), "doc.json").await.unwrap();
        assert_eq!(file.load::<Vec<u32>>().await.unwrap(), None);

        file.save(&vec![1u32, 2]).await.unwrap();
        file.save(&vec![3u32]).await.unwrap();
        assert_eq!(file.load::<Vec<u32>>().await.unwrap(), Some(vec![3]));
        assert!(!dir.path().join("doc.json.tmp").exists());
    }
}
