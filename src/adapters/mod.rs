//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP, WebSockets, file I/O). Each sub-module
//! groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `lookup`: Vessel details page scraper (IMO → MMSI)
//! - `stream`: AIS position feed WebSocket transport
//! - `metrics`: Prometheus metrics export and health checks
//! - `persistence`: JSON snapshots, JSONL history and event logs

pub mod lookup;
pub mod metrics;
pub mod persistence;
pub mod stream;
