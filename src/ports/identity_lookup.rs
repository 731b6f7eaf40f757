//! Identity Lookup Port - External IMO to MMSI Resolution
//!
//! One call is one network attempt. Retrying is the caller's business
//! (see `usecases::lookup_pool`).

use async_trait::async_trait;

use crate::domain::error::LookupError;
use crate::domain::vessel::{ImoNumber, Mmsi};

/// Stateless, retryable MMSI lookup for a registry number.
#[async_trait]
pub trait IdentityLookup: Send + Sync + 'static {
  /// Perform a single lookup attempt.
  ///
  /// # Errors
  /// Any network failure, non-success status, missing marker or
  /// malformed field yields a `LookupError` with no partial result.
  async fn lookup_mmsi(&self, imo: &ImoNumber) -> Result<Mmsi, LookupError>;
}
