//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `VesselRepository` / `LocationRepository`: durable stores
//! - `IdentityLookup`: third-party IMO → MMSI lookup
//! - `StreamTransport` / `TransportFactory`: position feed connection
//! - `EventLog`: structured event records
//! - `RawFrameStore`: optional verbatim frame archive

pub mod event_log;
pub mod frame_store;
pub mod identity_lookup;
pub mod location_repository;
pub mod stream_transport;
pub mod vessel_repository;
