//! Domain layer - Vessel identity, positions and feed messages.
//!
//! Pure types with no I/O (hexagonal architecture inner ring). All
//! identifiers validate on construction; all errors are typed.

pub mod ais_message;
pub mod backoff;
pub mod error;
pub mod location;
pub mod subscription;
pub mod vessel;

pub use ais_message::{AisEnvelope, FeedMessage, parse_feed_timestamp};
pub use backoff::{ReconnectPolicy, RetryPolicy};
pub use error::{LookupError, TrackerError};
pub use location::Location;
pub use subscription::{BoundingBox, StreamSubscription};
pub use vessel::{GeoPoint, ImoNumber, Mmsi, PositionReport, ResolutionJob, VesselIdentity};
