//! AIS feed envelope.
//!
//! Every inbound frame is `{MessageType, Message, MetaData}`. Only the
//! position report body is modelled; other message types are carried by
//! name and left to whoever archives them.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::error::TrackerError;
use super::vessel::{GeoPoint, Mmsi, PositionReport};

/// Message type carrying a vessel position.
pub const POSITION_REPORT: &str = "PositionReport";

/// Timestamp layout of `MetaData.time_utc` without the zone abbreviation.
const TIME_UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Decoded inbound frame.
#[derive(Debug, Clone, Deserialize)]
pub struct AisEnvelope {
    #[serde(rename = "MessageType")]
    pub message_type: String,
    #[serde(rename = "Message", default)]
    pub message: AisMessageBody,
    #[serde(rename = "MetaData")]
    pub metadata: AisMetadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AisMessageBody {
    #[serde(rename = "PositionReport")]
    pub position_report: Option<PositionFix>,
}

/// Coordinates from a position report body.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionFix {
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AisMetadata {
    #[serde(rename = "MMSI")]
    pub mmsi: u64,
    #[serde(rename = "time_utc", default)]
    pub time_utc: Option<String>,
}

/// Routing decision for one decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    /// A position report bound for the position sink.
    Position(PositionReport),
    /// Any other message type, identified by name.
    Other(String),
}

impl AisEnvelope {
    /// Decode a raw text frame.
    pub fn decode(frame: &str) -> Result<Self, TrackerError> {
        serde_json::from_str(frame).map_err(|e| TrackerError::Decode(e.to_string()))
    }

    /// Classify the frame, extracting the position report when present.
    pub fn classify(&self) -> Result<FeedMessage, TrackerError> {
        if self.message_type != POSITION_REPORT {
            return Ok(FeedMessage::Other(self.message_type.clone()));
        }

        let fix = self.message.position_report.ok_or_else(|| {
            TrackerError::Decode("PositionReport frame without a PositionReport body".to_string())
        })?;
        let mmsi = Mmsi::from_u64(self.metadata.mmsi)
            .map_err(|e| TrackerError::Decode(e.to_string()))?;

        Ok(FeedMessage::Position(PositionReport {
            mmsi,
            position: GeoPoint::new(fix.latitude, fix.longitude),
            timestamp: self
                .metadata
                .time_utc
                .as_deref()
                .and_then(parse_feed_timestamp),
        }))
    }
}

/// Parse `MetaData.time_utc` (`2024-11-21 10:15:42.123456789 +0000 UTC`).
///
/// The trailing zone abbreviation is informational only; the numeric
/// offset is authoritative. Returns `None` when the value is unusable.
pub fn parse_feed_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    let without_zone = match raw.rsplit_once(' ') {
        Some((head, tail)) if tail.chars().all(|c| c.is_ascii_alphabetic()) => head,
        _ => raw,
    };

    DateTime::parse_from_str(without_zone, TIME_UTC_FORMAT)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Timelike};

    use super::*;

    const POSITION_FRAME: &str = r#"{
        "MessageType": "PositionReport",
        "Message": {"PositionReport": {"Latitude": 51.95, "Longitude": 4.05, "Sog": 12.1}},
        "MetaData": {"MMSI": 538003456, "ShipName": "MAERSK X", "time_utc": "2024-11-21 10:15:42.123456 +0000 UTC"}
    }"#;

    #[test]
    fn test_position_frame_is_classified() {
        let envelope = AisEnvelope::decode(POSITION_FRAME).unwrap();
        let FeedMessage::Position(report) = envelope.classify().unwrap() else {
            panic!("expected a position report");
        };

        assert_eq!(report.mmsi.as_str(), "538003456");
        assert_eq!(report.position, GeoPoint::new(51.95, 4.05));
        let ts = report.timestamp.unwrap();
        assert_eq!(ts.date_naive().to_string(), "2024-11-21");
        assert_eq!(ts.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_other_types_are_passed_through_by_name() {
        let frame = r#"{"MessageType":"ShipStaticData","Message":{},"MetaData":{"MMSI":244650000}}"#;
        let envelope = AisEnvelope::decode(frame).unwrap();
        assert_eq!(
            envelope.classify().unwrap(),
            FeedMessage::Other("ShipStaticData".to_string())
        );
    }

    #[test]
    fn test_position_type_without_body_is_a_decode_error() {
        let frame = r#"{"MessageType":"PositionReport","Message":{},"MetaData":{"MMSI":244650000}}"#;
        let err = AisEnvelope::decode(frame).unwrap().classify().unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(matches!(
            AisEnvelope::decode("not json"),
            Err(TrackerError::Decode(_))
        ));
    }

    #[test]
    fn test_timestamp_offsets_are_applied() {
        let ts = parse_feed_timestamp("2024-11-21 11:15:42 +0100 CET").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 11, 21, 10, 15, 42).unwrap());
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        assert!(parse_feed_timestamp("yesterday").is_none());
        assert!(parse_feed_timestamp("").is_none());
    }
}
