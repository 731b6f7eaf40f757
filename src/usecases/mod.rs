//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! tracker's two workflows: streaming positions and resolving identities.
//!
//! Use cases:
//! - `EventRecorder`: Counters + structured event records
//! - `StreamManager`: Feed connection state machine and read loop
//! - `MessageDispatcher`: Frame decoding and routing
//! - `PositionWriter` / `PositionSink`: Bounded position persistence
//! - `VesselResolver` / `LookupPool`: Cache-aside IMO → MMSI resolution

pub mod dispatcher;
pub mod event_recorder;
pub mod lookup_pool;
pub mod position_sink;
pub mod position_writer;
pub mod stream_manager;
pub mod vessel_resolver;
