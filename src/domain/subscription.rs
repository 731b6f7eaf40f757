//! Stream subscription built once per connection attempt.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::vessel::{GeoPoint, Mmsi};

/// Rectangular geographic filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south_west: GeoPoint,
    pub north_east: GeoPoint,
}

impl BoundingBox {
    /// The default filter: every position on earth.
    pub const fn whole_earth() -> Self {
        Self {
            south_west: GeoPoint::new(-90.0, -180.0),
            north_east: GeoPoint::new(90.0, 180.0),
        }
    }

    /// Corner pairs in the `[[lat, lon], [lat, lon]]` wire layout.
    const fn corners(&self) -> [[f64; 2]; 2] {
        [
            [self.south_west.latitude, self.south_west.longitude],
            [self.north_east.latitude, self.north_east.longitude],
        ]
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::whole_earth()
    }
}

/// Wire form of the first frame sent after connecting.
#[derive(Serialize)]
struct SubscriptionFrame<'a> {
    #[serde(rename = "APIKey")]
    api_key: &'a str,
    #[serde(rename = "BoundingBoxes")]
    bounding_boxes: [[[f64; 2]; 2]; 1],
    #[serde(rename = "FiltersShipMMSI")]
    filters_ship_mmsi: Vec<&'a str>,
}

/// Subscription parameters for the position feed.
#[derive(Clone, PartialEq)]
pub struct StreamSubscription {
    pub api_key: String,
    pub bounding_box: BoundingBox,
    /// Vessels to receive reports for, one entry per tracked vessel.
    pub mmsi_filter: Vec<Mmsi>,
}

impl StreamSubscription {
    pub fn new(api_key: impl Into<String>, bounding_box: BoundingBox, mmsi_filter: Vec<Mmsi>) -> Self {
        Self {
            api_key: api_key.into(),
            bounding_box,
            mmsi_filter,
        }
    }

    /// Serialize to the JSON subscription frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let frame = SubscriptionFrame {
            api_key: &self.api_key,
            bounding_boxes: [self.bounding_box.corners()],
            filters_ship_mmsi: self.mmsi_filter.iter().map(Mmsi::as_str).collect(),
        };
        serde_json::to_string(&frame)
    }
}

impl fmt::Debug for StreamSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSubscription")
            .field("api_key", &"<redacted>")
            .field("bounding_box", &self.bounding_box)
            .field("mmsi_filter", &self.mmsi_filter.len())
            .finish()
    }
}
