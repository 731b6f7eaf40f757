//! Vessel Store - File-backed `VesselRepository`
//!
//! Vessel identities live in memory behind a `tokio::sync::RwLock`.
//! Identity changes are applied to a copy, snapshotted to
//! `vessels.json` and only then swapped in, so a failed write leaves
//! memory matching disk. Last-known positions are hot: they go to the
//! append-only `last_positions.jsonl` journal, which is folded into the
//! snapshot on the next identity write or every `COMPACT_EVERY` fixes.
//! Position history goes to the append-only `PositionLog`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::position_log::{PositionLog, PositionRow};
use super::snapshot::SnapshotFile;
use crate::domain::vessel::{GeoPoint, ImoNumber, Mmsi, VesselIdentity};
use crate::ports::vessel_repository::VesselRepository;

/// Journal entries tolerated before the snapshot is rewritten.
const COMPACT_EVERY: usize = 4096;

type VesselMap = HashMap<ImoNumber, VesselIdentity>;

/// JSON snapshot + JSONL vessel repository.
pub struct JsonVesselStore {
    /// Vessels keyed by IMO number.
    vessels: RwLock<VesselMap>,
    /// `vessels.json` snapshot.
    snapshot: SnapshotFile,
    /// Last-known position fixes not yet in the snapshot.
    fixes: FixJournal,
    /// Journal entries since the last snapshot; changed under the write lock.
    journal_len: AtomicUsize,
    /// Daily position files.
    positions: PositionLog,
}

impl JsonVesselStore {
    /// Open (or create) the store under `data_dir`.
    ///
    /// Journaled position fixes are replayed over the snapshot and
    /// compacted into it before the store is returned.
    pub async fn open(data_dir: &Path) -> Result<Self> {
        let snapshot = SnapshotFile::new(data_dir, "vessels.json").await?;
        let positions = PositionLog::new(data_dir).await?;
        let fixes = FixJournal::new(data_dir);

        let stored: Vec<VesselIdentity> = snapshot
            .load()
            .await
            .context("Failed to load vessel snapshot")?
            .unwrap_or_default();
        let mut vessels: VesselMap = stored.into_iter().map(|v| (v.imo.clone(), v)).collect();

        let replayed = fixes.replay().await?;
        let pending = replayed.len();
        for fix in replayed {
            if let Some(vessel) = vessels.get_mut(&fix.imo) {
                vessel.last_known_position = Some(fix.position);
            }
        }
        info!(
            vessels = vessels.len(),
            replayed_fixes = pending,
            path = %snapshot.path().display(),
            "Vessel store opened"
        );

        let store = Self {
            vessels: RwLock::new(VesselMap::new()),
            snapshot,
            fixes,
            journal_len: AtomicUsize::new(0),
            positions,
        };
        if pending > 0 {
            store.persist(&vessels).await?;
        }
        *store.vessels.write().await = vessels;
        Ok(store)
    }

    /// Write the snapshot, then drop the journal it now covers.
    async fn persist(&self, vessels: &VesselMap) -> Result<()> {
        let mut ordered: Vec<&VesselIdentity> = vessels.values().collect();
        ordered.sort_by(|a, b| a.imo.cmp(&b.imo));
        self.snapshot.save(&ordered).await?;

        // Replaying a stale journal over a newer snapshot is idempotent.
        if let Err(e) = self.fixes.clear().await {
            warn!(error = %format!("{e:#}"), "Failed to truncate position journal");
        }
        self.journal_len.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Apply an upsert to `vessels`.
///
/// A known MMSI belongs to one vessel only: when `incoming` carries an
/// MMSI held by a different IMO, that vessel loses it.
fn apply_upsert(vessels: &mut VesselMap, incoming: &VesselIdentity, now: DateTime<Utc>) {
    if let Some(mmsi) = &incoming.mmsi {
        for other in vessels
            .values_mut()
            .filter(|v| v.imo != incoming.imo && v.mmsi.as_ref() == Some(mmsi))
        {
            warn!(
                mmsi = %mmsi,
                previous = %other.imo,
                current = %incoming.imo,
                "MMSI moved to another vessel"
            );
            other.mmsi = None;
        }
    }

    match vessels.get_mut(&incoming.imo) {
        Some(stored) => merge_upsert(stored, incoming, now),
        None => {
            let mut fresh = incoming.clone();
            fresh.appearance_count = 1;
            fresh.last_seen = Some(now);
            vessels.insert(fresh.imo.clone(), fresh);
        }
    }
}

/// Apply upsert-on-conflict rules to a stored vessel.
fn merge_upsert(stored: &mut VesselIdentity, incoming: &VesselIdentity, now: DateTime<Utc>) {
    stored.name.clone_from(&incoming.name);
    stored.carrier_code.clone_from(&incoming.carrier_code);
    if incoming.mmsi.is_some() {
        stored.mmsi.clone_from(&incoming.mmsi);
    }
    if stored.last_known_position.is_none() {
        stored.last_known_position = incoming.last_known_position;
    }
    stored.is_tracked |= incoming.is_tracked;
    stored.appearance_count = stored.appearance_count.saturating_add(1);
    stored.last_seen = Some(now);
}

#[async_trait]
impl VesselRepository for JsonVesselStore {
    async fn get_by_identifiers(&self, imos: &[ImoNumber]) -> Result<VesselMap> {
        let vessels = self.vessels.read().await;
        Ok(imos
            .iter()
            .filter_map(|imo| vessels.get(imo).map(|v| (imo.clone(), v.clone())))
            .collect())
    }

    async fn get_by_mmsi(&self, mmsi: &Mmsi) -> Result<Option<VesselIdentity>> {
        let vessels = self.vessels.read().await;
        Ok(vessels
            .values()
            .find(|v| v.mmsi.as_ref() == Some(mmsi))
            .cloned())
    }

    async fn upsert(&self, vessel: &VesselIdentity) -> Result<()> {
        let mut vessels = self.vessels.write().await;
        let mut next = vessels.clone();
        apply_upsert(&mut next, vessel, Utc::now());

        self.persist(&next).await?;
        *vessels = next;
        Ok(())
    }

    async fn mark_tracked(&self, mmsis: &[Mmsi]) -> Result<u64> {
        let mut vessels = self.vessels.write().await;
        let mut next = vessels.clone();
        let mut updated = 0u64;
        for vessel in next.values_mut() {
            if vessel.mmsi.as_ref().is_some_and(|m| mmsis.contains(m)) {
                vessel.is_tracked = true;
                updated += 1;
            }
        }

        self.persist(&next).await?;
        *vessels = next;
        Ok(updated)
    }

    async fn insert_position(
        &self,
        mmsi: &Mmsi,
        position: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        self.positions
            .append(&PositionRow::new(mmsi.clone(), position, timestamp))
            .await
    }

    async fn update_last_known_position(&self, imo: &ImoNumber, position: GeoPoint) -> Result<()> {
        let mut vessels = self.vessels.write().await;
        let Some(vessel) = vessels.get_mut(imo) else {
            anyhow::bail!("Unknown vessel {imo}");
        };

        self.fixes
            .append(&PositionFix {
                imo: imo.clone(),
                position,
            })
            .await?;
        vessel.last_known_position = Some(position);

        if self.journal_len.fetch_add(1, Ordering::Relaxed) + 1 >= COMPACT_EVERY {
            self.persist(&vessels).await?;
        }
        Ok(())
    }

    async fn top_vessels(&self, limit: usize) -> Result<Vec<VesselIdentity>> {
        let vessels = self.vessels.read().await;
        let mut ranked: Vec<VesselIdentity> = vessels.values().cloned().collect();
        ranked.sort_by(|a, b| {
            b.appearance_count
                .cmp(&a.appearance_count)
                .then_with(|| b.last_seen.cmp(&a.last_seen))
        });
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn route(&self, mmsi: &Mmsi) -> Result<Vec<GeoPoint>> {
        let rows = self.positions.load_for(mmsi).await?;
        Ok(rows.iter().map(PositionRow::position).collect())
    }
}

/// One last-known position update.
#[derive(Debug, Serialize, Deserialize)]
struct PositionFix {
    imo: ImoNumber,
    position: GeoPoint,
}

/// Append-only `last_positions.jsonl`.
struct FixJournal {
    path: PathBuf,
}

impl FixJournal {
    fn new(dir: &Path) -> Self {
        Self {
            path: dir.join("last_positions.jsonl"),
        }
    }

    async fn append(&self, fix: &PositionFix) -> Result<()> {
        let mut line = serde_json::to_string(fix).context("Failed to serialize position fix")?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open position journal")?;
        file.write_all(line.as_bytes())
            .await
            .context("Failed to write position fix")?;
        file.flush().await.context("Failed to flush position journal")?;
        Ok(())
    }

    /// Journaled fixes in write order. A torn trailing line is skipped.
    async fn replay(&self) -> Result<Vec<PositionFix>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .context("Failed to read position journal")?;

        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(fix) => Some(fix),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed position fix");
                    None
                }
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        fs::write(&self.path, b"")
            .await
            .context("Failed to truncate position journal")
    }
}
