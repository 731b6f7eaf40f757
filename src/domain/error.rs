//! Error Taxonomy - Typed Failures of the Ingestion and Resolution Core
//!
//! Ports return `anyhow::Result` so adapters stay opaque; the use cases
//! convert those failures into `TrackerError` at the boundary. Only a
//! startup failure with nothing to track ever reaches the entry point.

use thiserror::Error;

/// Failure of a single external identity lookup attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("lookup request failed: {0}")]
    Network(String),

    /// The lookup host answered with a non-success status.
    #[error("lookup host returned status {0}")]
    Status(u16),

    /// The identity marker is absent from the page.
    #[error("identity marker not found in response")]
    MarkerNotFound,

    /// The marker was found but its value could not be split.
    #[error("malformed identity field: {0}")]
    MalformedField(String),

    /// The extracted value is not a valid MMSI.
    #[error("extracted value is not an MMSI: {0}")]
    InvalidMmsi(String),

    /// The lookup was abandoned because of shutdown.
    #[error("lookup cancelled")]
    Cancelled,
}

/// Error taxonomy shared by the stream pipeline and the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// Dial or transport failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The subscription frame could not be delivered or was rejected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Malformed inbound frame.
    #[error("decode error: {0}")]
    Decode(String),

    /// Position report with an invalid timestamp or coordinates.
    #[error("validation error: {0}")]
    Validation(String),

    /// Position report for a vessel the repository does not know.
    #[error("vessel not found: {0}")]
    NotFound(String),

    /// External identity lookup failure after exhausting retries.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// Repository write or read failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Streaming was requested with an empty tracked set.
    #[error("no vessels to track")]
    NoTrackedVessels,

    /// The reconnect policy ran out of attempts.
    #[error("gave up reconnecting after {0} attempts")]
    ReconnectExhausted(u32),
}

impl TrackerError {
    /// Wrap an adapter failure as a persistence error.
    pub fn persistence(err: &anyhow::Error) -> Self {
        Self::Persistence(format!("{err:#}"))
    }

    /// Short machine-readable label used in event records.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Protocol(_) => "protocol",
            Self::Decode(_) => "decode",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Lookup(_) => "lookup",
            Self::Persistence(_) => "persistence",
            Self::NoTrackedVessels => "no_tracked_vessels",
            Self::ReconnectExhausted(_) => "reconnect_exhausted",
        }
    }
}
