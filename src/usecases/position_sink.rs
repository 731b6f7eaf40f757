//! Position Sink Use Case - Validated Position Persistence
//!
//! Turns a decoded position report into repository writes:
//! 1. Reject missing / zero timestamps and out-of-range coordinates
//! 2. Resolve the owning vessel by MMSI
//! 3. Append the position row
//! 4. Overwrite the vessel's last-known position (last writer wins)

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::error::TrackerError;
use crate::domain::vessel::{GeoPoint, Mmsi, PositionReport};
use crate::ports::vessel_repository::VesselRepository;

/// Writes position reports for known vessels.
pub struct PositionSink<R: VesselRepository> {
  repo: Arc<R>,
}

impl<R: VesselRepository> PositionSink<R> {
  pub const fn new(repo: Arc<R>) -> Self {
    Self { repo }
  }

  /// Persist one report. See [`Self::insert_position`].
  pub async fn store(&self, report: &PositionReport) -> Result<(), TrackerError> {
    self
      .insert_position(&report.mmsi, report.position, report.timestamp)
      .await
  }

  /// Validate and persist a position for the vessel identified by `mmsi`.
  ///
  /// # Errors
  /// - `Validation` for a missing/zero timestamp or invalid coordinates;
  ///   no repository call is made.
  /// - `NotFound` when no vessel carries this MMSI.
  /// - `Persistence` when a repository call fails. The position row may
  ///   already be written when the last-known-position update fails.
  pub async fn insert_position(
    &self,
    mmsi: &Mmsi,
    position: GeoPoint,
    timestamp: Option<DateTime<Utc>>,
  ) -> Result<(), TrackerError> {
    let timestamp = match timestamp {
      Some(ts) if ts.timestamp() > 0 => ts,
      _ => {
        return Err(TrackerError::Validation(format!(
          "position for MMSI {mmsi} has no usable timestamp"
        )));
      }
    };
    position.validate()?;

    let vessel = self
      .repo
      .get_by_mmsi(mmsi)
      .await
      .map_err(|e| TrackerError::persistence(&e))?
      .ok_or_else(|| TrackerError::NotFound(format!("no vessel with MMSI {mmsi}")))?;

    self
      .repo
      .insert_position(mmsi, position, timestamp)
      .await
      .map_err(|e| TrackerError::persistence(&e))?;

    self
      .repo
      .update_last_known_position(&vessel.imo, position)
      .await
      .map_err(|e| TrackerError::persistence(&e))?;

    debug!(
      mmsi = %mmsi,
      imo = %vessel.imo,
      lat = position.latitude,
      lon = position.longitude,
      "Position stored"
    );
    Ok(())
  }
}
