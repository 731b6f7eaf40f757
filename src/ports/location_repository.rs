//! Location Repository Port - UN/LOCODE Reference Data
//!
//! Narrow interface over the location table. Seeding the table is an
//! outside concern; the core only reads and enriches rows.

use async_trait::async_trait;

use crate::domain::location::Location;
use crate::domain::vessel::GeoPoint;

/// Trait for location reference data.
#[async_trait]
pub trait LocationRepository: Send + Sync + 'static {
  /// Attach carrier geo ids to existing locations.
  ///
  /// Pairs are `(unlocode, carrier_geo_id)`. Unknown codes are skipped;
  /// returns the number of rows updated.
  async fn attach_carrier_ids(&self, pairs: &[(String, String)]) -> anyhow::Result<usize>;

  /// Fetch locations by UN/LOCODE.
  async fn get_locations(&self, unlocodes: &[String]) -> anyhow::Result<Vec<Location>>;

  /// Set coordinates for a location that has none yet.
  ///
  /// Returns `false` if the location is unknown or already placed.
  async fn update_coordinates(&self, unlocode: &str, point: GeoPoint) -> anyhow::Result<bool>;

  /// Prefix search for location pickers (at most 10 results).
  async fn autocomplete(&self, text: &str) -> anyhow::Result<Vec<Location>>;
}
