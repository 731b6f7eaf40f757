//! Vessel Resolver - Cache-Aside IMO → MMSI Resolution
//!
//! Resolution flow:
//! 1. Deduplicate candidates by normalised IMO number
//! 2. One bulk repository lookup; hits are taken as stored
//! 3. Every miss becomes exactly one job on the lookup pool
//! 4. Drain the pool's results into the merge map (owned here only)
//! 5. Spawn a tracked persistence pass upserting every identity
//!
//! Failures never escape `resolve`: they are recorded and show up as an
//! unset MMSI in the returned map.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument};

use crate::domain::vessel::{ImoNumber, ResolutionJob, VesselIdentity};
use crate::ports::identity_lookup::IdentityLookup;
use crate::ports::vessel_repository::VesselRepository;
use crate::usecases::event_recorder::{EventRecorder, EventType};
use crate::usecases::lookup_pool::LookupPool;

pub struct VesselResolver<R: VesselRepository, L: IdentityLookup> {
  repo: Arc<R>,
  pool: LookupPool<L>,
  recorder: Arc<EventRecorder>,
  /// Outstanding persistence passes.
  persist: TaskTracker,
}

impl<R: VesselRepository, L: IdentityLookup> VesselResolver<R, L> {
  pub fn new(repo: Arc<R>, pool: LookupPool<L>, recorder: Arc<EventRecorder>) -> Self {
    Self {
      repo,
      pool,
      recorder,
      persist: TaskTracker::new(),
    }
  }

  /// Resolve bare identifiers.
  pub async fn resolve_imos(
    &self,
    imos: impl IntoIterator<Item = ImoNumber>,
  ) -> HashMap<ImoNumber, VesselIdentity> {
    self.resolve(imos.into_iter().map(VesselIdentity::new)).await
  }

  /// Resolve candidates carrying schedule details (name, carrier code).
  ///
  /// Duplicate IMO numbers keep the first candidate's details. Returns
  /// one identity per distinct IMO; unresolved ones have no MMSI. Does
  /// not wait for the persistence pass (see [`Self::flush`]).
  #[instrument(skip_all)]
  pub async fn resolve(
    &self,
    candidates: impl IntoIterator<Item = VesselIdentity>,
  ) -> HashMap<ImoNumber, VesselIdentity> {
    let mut seeds: HashMap<ImoNumber, VesselIdentity> = HashMap::new();
    for candidate in candidates {
      seeds.entry(candidate.imo.clone()).or_insert(candidate);
    }
    if seeds.is_empty() {
      return HashMap::new();
    }

    let imos: Vec<ImoNumber> = seeds.keys().cloned().collect();
    let stored = match self.repo.get_by_identifiers(&imos).await {
      Ok(stored) => stored,
      Err(e) => {
        self.recorder.record_error(
          EventType::DatabaseError,
          "Bulk vessel lookup failed, falling back to external lookups",
          json!({ "error": format!("{e:#}"), "identifiers": imos.len() }),
        );
        HashMap::new()
      }
    };

    let mut merged: HashMap<ImoNumber, VesselIdentity> = HashMap::with_capacity(seeds.len());
    let mut jobs = Vec::new();
    for (imo, seed) in seeds {
      if let Some(vessel) = stored.get(&imo) {
        merged.insert(imo, vessel.clone());
      } else {
        jobs.push(ResolutionJob::new(imo.clone()));
        merged.insert(imo, seed);
      }
    }

    let cached = merged.len() - jobs.len();
    let submitted = jobs.len();
    let mut results = self.pool.run(jobs);
    let mut resolved = 0usize;
    while let Some(outcome) = results.recv().await {
      if let (Some(mmsi), Some(vessel)) = (outcome.mmsi, merged.get_mut(&outcome.imo)) {
        vessel.mmsi = Some(mmsi);
        resolved += 1;
      }
    }

    self.recorder.log_event(
      EventType::ResolutionComplete,
      "Vessel resolution complete",
      json!({
        "total": merged.len(),
        "cached": cached,
        "looked_up": submitted,
        "resolved": resolved,
        "unresolved": submitted - resolved,
      }),
    );

    self.spawn_persist(merged.values().cloned().collect());
    merged
  }

  /// Wait for every persistence pass spawned so far.
  pub async fn flush(&self) {
    self.persist.close();
    self.persist.wait().await;
    self.persist.reopen();
  }

  fn spawn_persist(&self, vessels: Vec<VesselIdentity>) {
    let repo = Arc::clone(&self.repo);
    let recorder = Arc::clone(&self.recorder);

    self.persist.spawn(async move {
      let mut saved = 0usize;
      for vessel in &vessels {
        match repo.upsert(vessel).await {
          Ok(()) => saved += 1,
          Err(e) => recorder.record_error(
            EventType::DatabaseError,
            "Failed to persist vessel",
            json!({ "imo": vessel.imo.as_str(), "error": format!("{e:#}") }),
          ),
        }
      }
      info!(saved, total = vessels.len(), "Vessel persistence pass finished");
    });
  }
}
