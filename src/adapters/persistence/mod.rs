//! Persistence Adapters - JSON / JSONL File Storage
//!
//! Implements the repository ports with atomic JSON snapshots for
//! identity and reference data and append-only JSONL files for history.
//! No database dependency; lightweight and crash-recoverable.

pub mod event_log;
pub mod frame_archive;
pub mod location_store;
pub mod position_log;
pub mod snapshot;
pub mod vessel_store;

pub use event_log::DailyEventLog;
pub use frame_archive::FrameArchive;
pub use location_store::JsonLocationStore;
pub use vessel_store::JsonVesselStore;
