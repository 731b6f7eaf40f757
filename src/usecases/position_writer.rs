//! Position Writer - Bounded Persistence Worker Pool
//!
//! Decouples the stream read loop from repository latency. Jobs enter a
//! bounded `mpsc` queue and are drained by a fixed number of workers.
//!
//! Queue policy when full: **block**. `enqueue` awaits free capacity, so
//! a slow repository slows the read loop (and, through it, the socket)
//! instead of spawning unbounded tasks or dropping reports.
//!
//! Workers exit once every sender is gone and the queue is drained.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::domain::error::TrackerError;
use crate::domain::vessel::PositionReport;
use crate::ports::frame_store::RawFrameStore;
use crate::ports::vessel_repository::VesselRepository;
use crate::usecases::event_recorder::{EventRecorder, EventType};
use crate::usecases::position_sink::PositionSink;

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 4;

/// Unit of persistence work.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkJob {
  /// Store a position report.
  Position(PositionReport),
  /// Archive a raw inbound frame.
  Archive {
    raw: String,
    received_at: DateTime<Utc>,
  },
}

/// Handle to the running worker pool.
pub struct PositionWriter {
  queue: mpsc::Sender<SinkJob>,
  workers: TaskTracker,
}

impl PositionWriter {
  /// Start `workers` tasks draining a queue of `capacity` jobs.
  pub fn spawn<R: VesselRepository>(
    sink: Arc<PositionSink<R>>,
    archive: Option<Arc<dyn RawFrameStore>>,
    recorder: Arc<EventRecorder>,
    capacity: usize,
    workers: usize,
  ) -> Self {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));
    let tracker = TaskTracker::new();

    for worker_id in 0..workers.max(1) {
      let rx = Arc::clone(&rx);
      let sink = Arc::clone(&sink);
      let archive = archive.clone();
      let recorder = Arc::clone(&recorder);

      tracker.spawn(async move {
        loop {
          let job = rx.lock().await.recv().await;
          let Some(job) = job else { break };
          handle_job(&sink, archive.as_deref(), &recorder, job).await;
        }
        debug!(worker_id, "Position writer worker stopped");
      });
    }
    tracker.close();

    info!(capacity, workers, "Position writer started");
    Self {
      queue: tx,
      workers: tracker,
    }
  }

  /// Producer handle for the dispatcher.
  pub fn sender(&self) -> mpsc::Sender<SinkJob> {
    self.queue.clone()
  }

  /// Drop this handle's sender and wait for the workers to drain.
  ///
  /// Returns only after every other sender has been dropped too.
  pub async fn shutdown(self) {
    drop(self.queue);
    self.workers.wait().await;
    info!("Position writer drained");
  }
}

async fn handle_job<R: VesselRepository>(
  sink: &PositionSink<R>,
  archive: Option<&dyn RawFrameStore>,
  recorder: &EventRecorder,
  job: SinkJob,
) {
  match job {
    SinkJob::Position(report) => match sink.store(&report).await {
      Ok(()) => recorder.stats().record_saved(),
      Err(e) => {
        let event = match &e {
          TrackerError::Validation(_) => EventType::ValidationError,
          TrackerError::NotFound(_) => EventType::UnknownVessel,
          _ => EventType::DatabaseError,
        };
        recorder.record_error(
          event,
          "Failed to store position report",
          json!({
            "mmsi": report.mmsi.as_str(),
            "error_kind": e.kind(),
            "error": e.to_string(),
          }),
        );
      }
    },
    SinkJob::Archive { raw, received_at } => {
      let Some(archive) = archive else { return };
      if let Err(e) = archive.archive(&raw, received_at).await {
        recorder.record_error(
          EventType::DatabaseError,
          "Failed to archive raw frame",
          json!({ "error": format!("{e:#}") }),
        );
      }
    },
  }
}
