//! Resolution Worker Pool - Rate-Friendly Parallel Identity Lookups
//!
//! A fixed number of workers share one job queue sized to the batch.
//! Each job is tried up to `RetryPolicy::max_attempts` times with a
//! linearly growing pause between attempts. Results go to a channel
//! that closes once every worker has finished, so callers drain it with
//! a plain `while let Some(..) = rx.recv().await`.
//!
//! Cancellation abandons queued jobs, in-flight lookups and retry
//! sleeps alike.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::backoff::RetryPolicy;
use crate::domain::error::LookupError;
use crate::domain::vessel::{ImoNumber, Mmsi, ResolutionJob};
use crate::ports::identity_lookup::IdentityLookup;
use crate::usecases::event_recorder::{EventRecorder, EventType};

/// Default number of concurrent lookups.
pub const DEFAULT_WORKERS: usize = 3;

/// Final result of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
  pub imo: ImoNumber,
  /// Resolved MMSI, `None` when every attempt failed.
  pub mmsi: Option<Mmsi>,
  /// Last error seen when unresolved.
  pub error: Option<LookupError>,
  /// Attempts actually made.
  pub attempts: u32,
}

pub struct LookupPool<L: IdentityLookup> {
  client: Arc<L>,
  workers: usize,
  retry: RetryPolicy,
  recorder: Arc<EventRecorder>,
  cancel: CancellationToken,
}

impl<L: IdentityLookup> LookupPool<L> {
  pub fn new(
    client: Arc<L>,
    workers: usize,
    retry: RetryPolicy,
    recorder: Arc<EventRecorder>,
    cancel: CancellationToken,
  ) -> Self {
    Self {
      client,
      workers: workers.max(1),
      retry,
      recorder,
      cancel,
    }
  }

  /// Submit `jobs` and return the result channel.
  ///
  /// The job queue is closed as soon as every job is enqueued; the
  /// returned receiver yields at most one outcome per job.
  pub fn run(&self, jobs: Vec<ResolutionJob>) -> mpsc::Receiver<LookupOutcome> {
    let (result_tx, result_rx) = mpsc::channel(jobs.len().max(1));
    if jobs.is_empty() {
      return result_rx;
    }

    let (job_tx, job_rx) = mpsc::channel(jobs.len());
    for job in jobs {
      if let Err(e) = job_tx.try_send(job) {
        warn!(error = %e, "Failed to enqueue resolution job");
      }
    }
    let worker_count = self.workers.min(job_tx.max_capacity());
    drop(job_tx);

    let job_rx = Arc::new(Mutex::new(job_rx));
    let mut workers = JoinSet::new();
    for worker_id in 0..worker_count {
      let worker = Worker {
        id: worker_id,
        client: Arc::clone(&self.client),
        retry: self.retry,
        recorder: Arc::clone(&self.recorder),
        cancel: self.cancel.clone(),
      };
      workers.spawn(worker.run(Arc::clone(&job_rx), result_tx.clone()));
    }

    tokio::spawn(async move {
      while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
          warn!(error = %e, "Lookup worker terminated abnormally");
        }
      }
      drop(result_tx);
    });

    result_rx
  }
}

struct Worker<L: IdentityLookup> {
  id: usize,
  client: Arc<L>,
  retry: RetryPolicy,
  recorder: Arc<EventRecorder>,
  cancel: CancellationToken,
}

impl<L: IdentityLookup> Worker<L> {
  async fn run(
    self,
    jobs: Arc<Mutex<mpsc::Receiver<ResolutionJob>>>,
    results: mpsc::Sender<LookupOutcome>,
  ) {
    loop {
      let job = tokio::select! {
        biased;
        () = self.cancel.cancelled() => None,
        job = async { jobs.lock().await.recv().await } => job,
      };
      let Some(job) = job else { break };

      let outcome = self.process(job).await;
      if results.send(outcome).await.is_err() {
        break;
      }
    }
    debug!(worker_id = self.id, "Lookup worker finished");
  }

  async fn process(&self, mut job: ResolutionJob) -> LookupOutcome {
    let mut last_error = None;

    while job.attempts < self.retry.max_attempts {
      let pause = self.retry.delay_before(job.attempts);
      if !pause.is_zero() {
        tokio::select! {
          biased;
          () = self.cancel.cancelled() => return cancelled(job),
          () = tokio::time::sleep(pause) => {}
        }
      }

      job.attempts += 1;
      let attempt = tokio::select! {
        biased;
        () = self.cancel.cancelled() => Err(LookupError::Cancelled),
        result = self.client.lookup_mmsi(&job.imo) => result,
      };

      match attempt {
        Ok(mmsi) => {
          debug!(imo = %job.imo, mmsi = %mmsi, attempts = job.attempts, "Resolved MMSI");
          return LookupOutcome {
            imo: job.imo,
            mmsi: Some(mmsi),
            error: None,
            attempts: job.attempts,
          };
        }
        Err(LookupError::Cancelled) => return cancelled(job),
        Err(e) => {
          self.recorder.record_error(
            EventType::LookupRetry,
            "Identity lookup attempt failed",
            json!({
              "imo": job.imo.as_str(),
              "attempt": job.attempts,
              "max_attempts": self.retry.max_attempts,
              "error": e.to_string(),
            }),
          );
          last_error = Some(e);
        }
      }
    }

    self.recorder.log_event(
      EventType::LookupFailed,
      "Identity lookup gave up",
      json!({ "imo": job.imo.as_str(), "attempts": job.attempts }),
    );
    LookupOutcome {
      imo: job.imo,
      mmsi: None,
      error: last_error,
      attempts: job.attempts,
    }
  }
}

fn cancelled(job: ResolutionJob) -> LookupOutcome {
  LookupOutcome {
    imo: job.imo,
    mmsi: None,
    error: Some(LookupError::Cancelled),
    attempts: job.attempts,
  }
}
