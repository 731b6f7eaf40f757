//! Vessel domain types.
//!
//! Identifiers are normalised on construction so that two spellings of
//! the same registry number compare equal. That equality is what the
//! resolver deduplicates on.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TrackerError;

/// IMO registry number (always seven digits once normalised).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImoNumber(String);

impl ImoNumber {
    /// Parse and normalise a registry number.
    ///
    /// Accepts surrounding whitespace and an optional `IMO` prefix in any
    /// case (`"IMO 9321483"`, `"imo:9321483"`, `" 9321483 "`).
    pub fn parse(raw: &str) -> Result<Self, TrackerError> {
        let trimmed = raw.trim();
        let digits = match trimmed.get(..3) {
            Some(prefix) if prefix.eq_ignore_ascii_case("imo") => trimmed[3..]
                .trim_start_matches(|c: char| c == ':' || c.is_whitespace()),
            _ => trimmed,
        };

        if digits.len() != 7 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TrackerError::Validation(format!(
                "invalid IMO number: {raw:?}"
            )));
        }

        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImoNumber {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ImoNumber> for String {
    fn from(value: ImoNumber) -> Self {
        value.0
    }
}

impl fmt::Display for ImoNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maritime Mobile Service Identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Mmsi(String);

impl Mmsi {
    /// Largest value representable with nine decimal digits.
    const MAX: u64 = 999_999_999;

    /// Parse a textual MMSI (1 to 9 digits, not all zero).
    pub fn parse(raw: &str) -> Result<Self, TrackerError> {
        let digits = raw.trim();
        let valid = !digits.is_empty()
            && digits.len() <= 9
            && digits.bytes().all(|b| b.is_ascii_digit())
            && digits.bytes().any(|b| b != b'0');

        if !valid {
            return Err(TrackerError::Validation(format!("invalid MMSI: {raw:?}")));
        }

        Ok(Self(digits.to_string()))
    }

    /// Build from the numeric form carried in feed metadata.
    pub fn from_u64(value: u64) -> Result<Self, TrackerError> {
        if value == 0 || value > Self::MAX {
            return Err(TrackerError::Validation(format!("invalid MMSI: {value}")));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Mmsi {
    type Error = TrackerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Mmsi> for String {
    fn from(value: Mmsi) -> Self {
        value.0
    }
}

impl fmt::Display for Mmsi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject coordinates outside the valid range.
    ///
    /// AIS encodes "not available" as latitude 91 / longitude 181, which
    /// this also rejects.
    pub fn validate(&self) -> Result<(), TrackerError> {
        let lat_ok = self.latitude.is_finite() && (-90.0..=90.0).contains(&self.latitude);
        let lon_ok = self.longitude.is_finite() && (-180.0..=180.0).contains(&self.longitude);

        if lat_ok && lon_ok {
            Ok(())
        } else {
            Err(TrackerError::Validation(format!(
                "coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )))
        }
    }
}

/// Identity record for one vessel, keyed by IMO number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselIdentity {
    /// Registry number, unique per vessel.
    pub imo: ImoNumber,
    /// Radio identity, `None` while unresolved.
    pub mmsi: Option<Mmsi>,
    /// Vessel name as reported by the carrier.
    #[serde(default)]
    pub name: String,
    /// Carrier-specific vessel code.
    #[serde(default)]
    pub carrier_code: String,
    /// Number of times the vessel appeared in schedule data.
    #[serde(default)]
    pub appearance_count: u32,
    /// Last time the vessel was seen in schedule data.
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    /// Whether the vessel is part of the streamed set.
    #[serde(default)]
    pub is_tracked: bool,
    /// Latest streamed position.
    #[serde(default)]
    pub last_known_position: Option<GeoPoint>,
}

impl VesselIdentity {
    /// Placeholder for a vessel known only by its IMO number.
    pub fn new(imo: ImoNumber) -> Self {
        Self {
            imo,
            mmsi: None,
            name: String::new(),
            carrier_code: String::new(),
            appearance_count: 0,
            last_seen: None,
            is_tracked: false,
            last_known_position: None,
        }
    }

    /// Attach schedule-provided descriptive fields.
    #[must_use]
    pub fn with_details(mut self, name: impl Into<String>, carrier_code: impl Into<String>) -> Self {
        self.name = name.into();
        self.carrier_code = carrier_code.into();
        self
    }

    #[must_use]
    pub fn with_mmsi(mut self, mmsi: Mmsi) -> Self {
        self.mmsi = Some(mmsi);
        self
    }

    pub const fn is_resolved(&self) -> bool {
        self.mmsi.is_some()
    }
}

/// One position report taken from the stream.
///
/// The timestamp is kept as decoded; the position sink decides whether
/// it is usable.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub mmsi: Mmsi,
    pub position: GeoPoint,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A pending IMO → MMSI lookup handed to the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionJob {
    pub imo: ImoNumber,
    /// Attempts made so far.
    pub attempts: u32,
}

impl ResolutionJob {
    pub const fn new(imo: ImoNumber) -> Self {
        Self { imo, attempts: 0 }
    }
}
