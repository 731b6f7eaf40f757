//! Position Feed Adapters
//!
//! WebSocket transport for the AIS position stream.

pub mod aisstream;

pub use aisstream::AisStreamConnector;
