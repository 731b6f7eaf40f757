//! External Identity Lookup Adapters
//!
//! HTTP scraping client implementing the `IdentityLookup` port.

pub mod vesselfinder;

pub use vesselfinder::{LookupClientConfig, VesselFinderClient};
