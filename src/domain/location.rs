//! Port / place reference data keyed by UN/LOCODE.

use serde::{Deserialize, Serialize};

use super::vessel::GeoPoint;

/// A UN/LOCODE location as stored by the location repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Five-character UN/LOCODE (e.g. `NLRTM`).
    pub unlocode: String,
    pub name: String,
    pub country_code: String,
    #[serde(default)]
    pub is_port: bool,
    /// Carrier-specific geo identifier, once known.
    #[serde(default)]
    pub carrier_geo_id: Option<String>,
    #[serde(default)]
    pub coordinates: Option<GeoPoint>,
}

impl Location {
    /// Case-insensitive prefix match used by autocomplete.
    ///
    /// Codes and country codes always match; names only for ports.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        let starts = |field: &str| {
            field
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        };
        starts(&self.unlocode) || starts(&self.country_code) || (self.is_port && starts(&self.name))
    }
}
