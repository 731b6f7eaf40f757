//! Message Dispatcher - Decode and Route Inbound Frames
//!
//! A bad frame is counted and dropped; it never ends the connection.
//! Position reports go to the persistence queue; other message types
//! are ignored here (and optionally archived verbatim).

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::ais_message::{AisEnvelope, FeedMessage};
use crate::usecases::event_recorder::{EventRecorder, EventType};
use crate::usecases::position_writer::SinkJob;

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
  /// A position report was queued for persistence.
  Queued,
  /// Decoded fine but not a position report.
  Ignored,
  /// Malformed frame, counted as an error.
  Rejected,
  /// The persistence queue is gone (shutdown).
  Closed,
}

pub struct MessageDispatcher {
  recorder: Arc<EventRecorder>,
  queue: mpsc::Sender<SinkJob>,
  archive_raw: bool,
}

impl MessageDispatcher {
  pub const fn new(recorder: Arc<EventRecorder>, queue: mpsc::Sender<SinkJob>, archive_raw: bool) -> Self {
    Self {
      recorder,
      queue,
      archive_raw,
    }
  }

  /// Decode `frame` and route it. Waits for queue space when full.
  pub async fn dispatch(&self, frame: &str) -> DispatchOutcome {
    let envelope = match AisEnvelope::decode(frame) {
      Ok(envelope) => envelope,
      Err(e) => {
        self.reject(&e.to_string(), frame);
        return DispatchOutcome::Rejected;
      }
    };

    if self.archive_raw
      && !self
        .enqueue(SinkJob::Archive {
          raw: frame.to_string(),
          received_at: Utc::now(),
        })
        .await
    {
      return DispatchOutcome::Closed;
    }

    match envelope.classify() {
      Ok(FeedMessage::Position(report)) => {
        if self.enqueue(SinkJob::Position(report)).await {
          DispatchOutcome::Queued
        } else {
          DispatchOutcome::Closed
        }
      }
      Ok(FeedMessage::Other(message_type)) => {
        debug!(message_type, "Ignoring non-position message");
        DispatchOutcome::Ignored
      }
      Err(e) => {
        self.reject(&e.to_string(), frame);
        DispatchOutcome::Rejected
      }
    }
  }

  async fn enqueue(&self, job: SinkJob) -> bool {
    if self.queue.send(job).await.is_err() {
      warn!("Persistence queue closed, frame not stored");
      return false;
    }
    true
  }

  fn reject(&self, error: &str, frame: &str) {
    let preview: String = frame.chars().take(200).collect();
    self.recorder.record_error(
      EventType::ParseError,
      "Failed to parse message",
      json!({ "error": error, "frame": preview }),
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const POSITION: &str = r#"{"MessageType":"PositionReport","Message":{"PositionReport":{"Latitude":1.5,"Longitude":2.5}},"MetaData":{"MMSI":244650000,"time_utc":"2024-11-21 10:15:42 +0000 UTC"}}"#;
  const STATIC: &str = r#"{"MessageType":"ShipStaticData","Message":{},"MetaData":{"MMSI":244650000}}"#;

  fn setup(archive_raw: bool) -> (MessageDispatcher, mpsc::Receiver<SinkJob>, Arc<EventRecorder>) {
    let recorder = Arc::new(EventRecorder::new());
    let (tx, rx) = mpsc::channel(8);
    (MessageDispatcher::new(recorder.clone(), tx, archive_raw), rx, recorder)
  }

  #[tokio::test]
  async fn test_position_is_queued() {
    let (dispatcher, mut rx, recorder) = setup(false);
    assert_eq!(dispatcher.dispatch(POSITION).await, DispatchOutcome::Queued);

    let Some(SinkJob::Position(report)) = rx.recv().await else {
      panic!("expected a position job");
    };
    assert_eq!(report.mmsi.as_str(), "244650000");
    assert_eq!(recorder.snapshot().errors, 0);
  }

  #[tokio::test]
  async fn test_bad_frame_is_counted_and_dropped() {
    let (dispatcher, mut rx, recorder) = setup(false);
    assert_eq!(dispatcher.dispatch("{oops").await, DispatchOutcome::Rejected);
    assert_eq!(recorder.snapshot().errors, 1);
    assert!(rx.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_other_types_are_ignored_unless_archived() {
    let (dispatcher, mut rx, _) = setup(false);
    assert_eq!(dispatcher.dispatch(STATIC).await, DispatchOutcome::Ignored);
    assert!(rx.try_recv().is_err());

    let (dispatcher, mut rx, _) = setup(true);
    assert_eq!(dispatcher.dispatch(STATIC).await, DispatchOutcome::Ignored);
    assert!(matches!(rx.try_recv(), Ok(SinkJob::Archive { .. })));
  }

  #[tokio::test]
  async fn test_closed_queue_is_reported() {
    let (dispatcher, rx, _) = setup(false);
    drop(rx);
    assert_eq!(dispatcher.dispatch(POSITION).await, DispatchOutcome::Closed);
  }
}
