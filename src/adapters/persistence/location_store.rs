//! Location Store - File-backed `LocationRepository`
//!
//! UN/LOCODE reference rows kept in memory and snapshotted to
//! `locations.json`. Rows are seeded externally; this adapter only
//! enriches existing rows.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::snapshot::SnapshotFile;
use crate::domain::location::Location;
use crate::domain::vessel::GeoPoint;
use crate::ports::location_repository::LocationRepository;

/// Maximum autocomplete results.
const AUTOCOMPLETE_LIMIT: usize = 10;

pub struct JsonLocationStore {
    locations: RwLock<Vec<Location>>,
    snapshot: SnapshotFile,
}

impl JsonLocationStore {
    /// Open (or create) the store under `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let snapshot = SnapshotFile::new(data_dir, "locations.json").await?;
        let locations: Vec<Location> = snapshot
            .load()
            .await
            .context("Failed to load location snapshot")?
            .unwrap_or_default();
        info!(locations = locations.len(), "Location store opened");

        Ok(Self {
            locations: RwLock::new(locations),
            snapshot,
        })
    }
}

#[async_trait]
impl LocationRepository for JsonLocationStore {
    async fn attach_carrier_ids(&self, pairs: &[(String, String)]) -> Result<usize> {
        if pairs.is_empty() {
            return Ok(0);
        }

        let mut locations = self.locations.write().await;
        let mut updated = 0;
        for (unlocode, geo_id) in pairs {
            if let Some(location) = locations.iter_mut().find(|l| &l.unlocode == unlocode) {
                location.carrier_geo_id = Some(geo_id.clone());
                updated += 1;
            }
        }

        if updated > 0 {
            self.snapshot.save(&*locations).await?;
        }
        Ok(updated)
    }

    async fn get_locations(&self, unlocodes: &[String]) -> Result<Vec<Location>> {
        let locations = self.locations.read().await;
        Ok(locations
            .iter()
            .filter(|l| unlocodes.contains(&l.unlocode))
            .cloned()
            .collect())
    }

    async fn update_coordinates(&self, unlocode: &str, point: GeoPoint) -> Result<bool> {
        point.validate()?;

        let mut locations = self.locations.write().await;
        let Some(location) = locations
            .iter_mut()
            .find(|l| l.unlocode == unlocode && l.coordinates.is_none())
        else {
            return Ok(false);
        };
        location.coordinates = Some(point);

        self.snapshot.save(&*locations).await?;
        Ok(true)
    }

    async fn autocomplete(&self, text: &str) -> Result<Vec<Location>> {
        let locations = self.locations.read().await;
        Ok(locations
            .iter()
            .filter(|l| l.matches_prefix(text))
            .take(AUTOCOMPLETE_LIMIT)
            .cloned()
            .collect())
    }
}
