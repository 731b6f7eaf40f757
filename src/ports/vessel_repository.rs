//! Vessel Repository Port - Durable Vessel Identity and Position Store
//!
//! The single source of truth for vessel identities and position
//! history. Implementations are assumed to serialize conflicting writes
//! internally; the core never locks around them.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::vessel::{GeoPoint, ImoNumber, Mmsi, VesselIdentity};

/// Trait for vessel identity persistence.
///
/// Every call is durable and transactionally consistent on its own;
/// there is no cross-call transaction.
#[async_trait]
pub trait VesselRepository: Send + Sync + 'static {
  /// Bulk lookup by IMO number. Unknown identifiers are simply absent
  /// from the returned map.
  async fn get_by_identifiers(
    &self,
    imos: &[ImoNumber],
  ) -> anyhow::Result<HashMap<ImoNumber, VesselIdentity>>;

  /// Lookup by MMSI.
  async fn get_by_mmsi(&self, mmsi: &Mmsi) -> anyhow::Result<Option<VesselIdentity>>;

  /// Insert or update a vessel keyed by IMO number.
  ///
  /// On conflict: name and carrier code are overwritten, the appearance
  /// count is incremented and last-seen refreshed. A stored MMSI is never
  /// replaced by an empty one.
  async fn upsert(&self, vessel: &VesselIdentity) -> anyhow::Result<()>;

  /// Flag every vessel whose MMSI is listed as tracked.
  ///
  /// Returns the number of vessels affected.
  async fn mark_tracked(&self, mmsis: &[Mmsi]) -> anyhow::Result<u64>;

  /// Append one position row (append-only history).
  async fn insert_position(
    &self,
    mmsi: &Mmsi,
    position: GeoPoint,
    timestamp: DateTime<Utc>,
  ) -> anyhow::Result<()>;

  /// Overwrite the vessel's cached last-known position.
  async fn update_last_known_position(
    &self,
    imo: &ImoNumber,
    position: GeoPoint,
  ) -> anyhow::Result<()>;

  /// Most frequently seen vessels (appearance count desc, last seen desc).
  async fn top_vessels(&self, limit: usize) -> anyhow::Result<Vec<VesselIdentity>>;

  /// Stored positions for an MMSI in ascending timestamp order.
  async fn route(&self, mmsi: &Mmsi) -> anyhow::Result<Vec<GeoPoint>>;
}
