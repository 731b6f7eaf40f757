//! Stream Connection Manager - Feed Lifecycle State Machine
//!
//! Owns the position-feed connection:
//! - Connect: open transport, send subscription, mark vessels tracked
//!   (best-effort), then stream
//! - Read loop: every frame is counted and handed to the dispatcher
//! - On read failure or an idle read timeout: count, back off
//!   (exponential + jitter), reconnect
//! - Optional attempt ceiling after which the manager stops for good
//!
//! State is published on a `watch` channel so health checks and
//! metrics can observe it without touching the loop.
//!
//! ```text
//! Disconnected → Connecting → Subscribed → Streaming
//!                    ↑                         │ read error
//!                    └────── Reconnecting ←────┘
//!                                 │ attempts exhausted
//!                                 ↓
//!                              Stopped
//! ```

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::backoff::ReconnectPolicy;
use crate::domain::error::TrackerError;
use crate::domain::subscription::{BoundingBox, StreamSubscription};
use crate::domain::vessel::Mmsi;
use crate::ports::frame_store::RawFrameStore;
use crate::ports::stream_transport::{StreamTransport, TransportFactory};
use crate::ports::vessel_repository::VesselRepository;
use crate::usecases::dispatcher::{DispatchOutcome, MessageDispatcher};
use crate::usecases::event_recorder::{EventRecorder, EventType};
use crate::usecases::position_sink::PositionSink;
use crate::usecases::position_writer::PositionWriter;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
  Disconnected,
  Connecting,
  Subscribed,
  Streaming,
  Reconnecting,
  /// Reconnect attempts exhausted; terminal.
  Stopped,
}

impl ConnectionState {
  pub const fn as_str(self) -> &'static str {
    match self {
      Self::Disconnected => "disconnected",
      Self::Connecting => "connecting",
      Self::Subscribed => "subscribed",
      Self::Streaming => "streaming",
      Self::Reconnecting => "reconnecting",
      Self::Stopped => "stopped",
    }
  }
}

/// Stream manager configuration.
#[derive(Clone)]
pub struct StreamSettings {
  /// Feed API key, sent in the subscription frame only.
  pub api_key: String,
  /// Geographic filter.
  pub bounding_box: BoundingBox,
  /// Reconnect backoff and attempt ceiling.
  pub reconnect: ReconnectPolicy,
  /// Persistence queue capacity.
  pub persist_queue_capacity: usize,
  /// Persistence worker count.
  pub persist_workers: usize,
  /// Interval of the periodic statistics event.
  pub stats_interval: Duration,
  /// Archive every decoded frame verbatim.
  pub archive_raw_frames: bool,
  /// Longest silence tolerated on an open connection before it is
  /// treated as dead. `None` waits forever.
  pub read_timeout: Option<Duration>,
}

/// Why a read loop ended.
enum ReadExit {
  Cancelled,
  Failed(String),
}

/// Running stream; resolves when streaming stops.
pub struct StreamHandle {
  task: JoinHandle<Result<(), TrackerError>>,
}

impl StreamHandle {
  /// Wait for the stream to stop.
  ///
  /// # Errors
  /// `ReconnectExhausted` when the attempt ceiling was hit.
  pub async fn join(self) -> Result<(), TrackerError> {
    self
      .task
      .await
      .map_err(|e| TrackerError::Connection(format!("stream task failed: {e}")))?
  }
}

pub struct StreamManager<R: VesselRepository> {
  factory: Arc<dyn TransportFactory>,
  repo: Arc<R>,
  recorder: Arc<EventRecorder>,
  archive: Option<Arc<dyn RawFrameStore>>,
  settings: StreamSettings,
  state: watch::Sender<ConnectionState>,
}

impl<R: VesselRepository> StreamManager<R> {
  pub fn new(
    factory: Arc<dyn TransportFactory>,
    repo: Arc<R>,
    recorder: Arc<EventRecorder>,
    settings: StreamSettings,
  ) -> Self {
    let (state, _) = watch::channel(ConnectionState::Disconnected);
    Self {
      factory,
      repo,
      recorder,
      archive: None,
      settings,
      state,
    }
  }

  /// Attach a raw frame archive (used when `archive_raw_frames` is set).
  #[must_use]
  pub fn with_archive(mut self, archive: Arc<dyn RawFrameStore>) -> Self {
    self.archive = Some(archive);
    self
  }

  /// Observe state transitions.
  pub fn state(&self) -> watch::Receiver<ConnectionState> {
    self.state.subscribe()
  }

  pub fn current_state(&self) -> ConnectionState {
    *self.state.borrow()
  }

  /// Subscribe to `mmsis` and stream in the background.
  ///
  /// # Errors
  /// - `NoTrackedVessels` for an empty list.
  /// - `Connection` / `Protocol` when the first connection attempt fails.
  ///   Later failures are handled by reconnecting and never surface here.
  #[instrument(skip(self, mmsis, cancel), fields(tracked = mmsis.len()))]
  pub async fn start_streaming(
    self: &Arc<Self>,
    mmsis: Vec<Mmsi>,
    cancel: CancellationToken,
  ) -> Result<StreamHandle, TrackerError> {
    if mmsis.is_empty() {
      self.recorder.record_error(
        EventType::ConnectionError,
        "No vessels to track, not starting stream",
        json!({}),
      );
      return Err(TrackerError::NoTrackedVessels);
    }

    let subscription = StreamSubscription::new(
      self.settings.api_key.clone(),
      self.settings.bounding_box,
      mmsis,
    );
    let transport = match self.connect(&subscription).await {
      Ok(transport) => transport,
      Err(e) => {
        self.set_state(ConnectionState::Disconnected);
        return Err(e);
      }
    };

    let writer = PositionWriter::spawn(
      Arc::new(PositionSink::new(Arc::clone(&self.repo))),
      self.archive.clone(),
      Arc::clone(&self.recorder),
      self.settings.persist_queue_capacity,
      self.settings.persist_workers,
    );
    let dispatcher = MessageDispatcher::new(
      Arc::clone(&self.recorder),
      writer.sender(),
      self.settings.archive_raw_frames && self.archive.is_some(),
    );

    let stats_cancel = cancel.child_token();
    let stats_task = tokio::spawn(
      Arc::clone(&self.recorder).run_periodic(self.settings.stats_interval, stats_cancel.clone()),
    );

    let manager = Arc::clone(self);
    let task = tokio::spawn(async move {
      let outcome = manager.run(transport, &subscription, dispatcher, &cancel).await;
      writer.shutdown().await;
      stats_cancel.cancel();
      if let Err(e) = stats_task.await {
        warn!(error = %e, "Statistics task failed");
      }
      outcome
    });

    Ok(StreamHandle { task })
  }

  /// One connection attempt: open, subscribe, mark tracked.
  async fn connect(
    &self,
    subscription: &StreamSubscription,
  ) -> Result<Box<dyn StreamTransport>, TrackerError> {
    let tracked = subscription.mmsi_filter.len();
    self.set_state(ConnectionState::Connecting);
    self.recorder.log_event(
      EventType::ConnectionAttempt,
      "Connecting to AIS stream",
      json!({ "tracked_vessels": tracked }),
    );

    let mut transport = match self.factory.connect().await {
      Ok(transport) => transport,
      Err(e) => {
        let err = TrackerError::Connection(format!("{e:#}"));
        self.recorder.record_error(
          EventType::ConnectionError,
          "Failed to connect to AIS stream",
          json!({ "error": err.to_string() }),
        );
        return Err(err);
      }
    };
    self
      .recorder
      .log_event(EventType::ConnectionSuccess, "Connected to AIS stream", json!({}));

    let sent = match subscription.to_frame() {
      Ok(frame) => transport
        .send_text(frame)
        .await
        .map_err(|e| TrackerError::Protocol(format!("{e:#}"))),
      Err(e) => Err(TrackerError::Protocol(e.to_string())),
    };
    if let Err(err) = sent {
      self.recorder.record_error(
        EventType::SubscriptionError,
        "Failed to send subscription",
        json!({ "error": err.to_string() }),
      );
      return Err(err);
    }
    self.set_state(ConnectionState::Subscribed);
    self.recorder.log_event(
      EventType::SubscriptionSuccess,
      "Subscription sent",
      json!({ "vessel_count": tracked }),
    );

    match self.repo.mark_tracked(&subscription.mmsi_filter).await {
      Ok(updated) => self.recorder.log_event(
        EventType::DatabaseSuccess,
        "Updated tracked vessels",
        json!({ "updated": updated }),
      ),
      Err(e) => self.recorder.record_error(
        EventType::DatabaseError,
        "Failed to update tracked vessels",
        json!({ "error": format!("{e:#}") }),
      ),
    }

    self.set_state(ConnectionState::Streaming);
    Ok(transport)
  }

  /// Read / reconnect loop. Returns on cancellation or exhaustion.
  async fn run(
    &self,
    transport: Box<dyn StreamTransport>,
    subscription: &StreamSubscription,
    dispatcher: MessageDispatcher,
    cancel: &CancellationToken,
  ) -> Result<(), TrackerError> {
    let policy = self.settings.reconnect;
    let mut rng = StdRng::from_entropy();
    let mut active = Some(transport);
    let mut attempt: u32 = 0;

    loop {
      if let Some(mut transport) = active.take() {
        match self.read_loop(transport.as_mut(), &dispatcher, cancel).await {
          ReadExit::Cancelled => break,
          ReadExit::Failed(reason) => {
            self.recorder.stats().record_reconnect();
            self.recorder.record_error(
              EventType::WebsocketError,
              "Stream read failed",
              json!({ "error": reason }),
            );
          }
        }
      }

      attempt = attempt.saturating_add(1);
      self.set_state(ConnectionState::Reconnecting);
      if policy.is_exhausted(attempt) {
        let used = attempt - 1;
        self.recorder.log_event(
          EventType::ReconnectExhausted,
          "Reconnect attempts exhausted, stopping stream",
          json!({ "attempts": used }),
        );
        self.set_state(ConnectionState::Stopped);
        return Err(TrackerError::ReconnectExhausted(used));
      }

      let delay = policy.delay_for(attempt, &mut rng);
      self.recorder.log_event(
        EventType::Reconnection,
        "Reconnecting to AIS stream",
        json!({
          "attempt": attempt,
          "delay_ms": u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        }),
      );

      tokio::select! {
        biased;
        () = cancel.cancelled() => break,
        () = tokio::time::sleep(delay) => {}
      }

      let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => break,
        connected = self.connect(subscription) => connected,
      };
      if let Ok(transport) = connected {
        attempt = 0;
        active = Some(transport);
      }
    }

    self.set_state(ConnectionState::Disconnected);
    info!("Stream stopped");
    Ok(())
  }

  async fn read_loop(
    &self,
    transport: &mut dyn StreamTransport,
    dispatcher: &MessageDispatcher,
    cancel: &CancellationToken,
  ) -> ReadExit {
    let idle_limit = self.settings.read_timeout;
    loop {
      let frame = tokio::select! {
        biased;
        () = cancel.cancelled() => return ReadExit::Cancelled,
        frame = transport.next_frame() => frame,
        () = idle_deadline(idle_limit) => {
          let silent_ms = idle_limit.map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
          return ReadExit::Failed(format!("no frame received for {silent_ms}ms"));
        }
      };

      match frame {
        Some(Ok(text)) => {
          self.recorder.stats().record_received();
          if dispatcher.dispatch(&text).await == DispatchOutcome::Closed {
            return ReadExit::Cancelled;
          }
        }
        Some(Err(e)) => return ReadExit::Failed(format!("{e:#}")),
        None => return ReadExit::Failed("connection closed by peer".to_string()),
      }
    }
  }

  fn set_state(&self, next: ConnectionState) {
    let previous = self.state.send_replace(next);
    if previous != next {
      debug!(from = previous.as_str(), to = next.as_str(), "Connection state changed");
    }
  }
}

/// Resolves once `limit` has elapsed; never when there is no limit.
async fn idle_deadline(limit: Option<Duration>) {
  match limit {
    Some(limit) => tokio::time::sleep(limit).await,
    None => std::future::pending().await,
  }
}
