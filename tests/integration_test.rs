//! Integration Tests - Resolver, Worker Pool and Position Sink
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use mockall::predicate::*;
use tokio_util::sync::CancellationToken;

use vessel_tracker::domain::backoff::RetryPolicy;
use vessel_tracker::domain::error::{LookupError, TrackerError};
use vessel_tracker::domain::vessel::{GeoPoint, ImoNumber, Mmsi, ResolutionJob, VesselIdentity};
use vessel_tracker::ports::identity_lookup::IdentityLookup;
use vessel_tracker::ports::vessel_repository::VesselRepository;
use vessel_tracker::usecases::event_recorder::EventRecorder;
use vessel_tracker::usecases::lookup_pool::LookupPool;
use vessel_tracker::usecases::position_sink::PositionSink;
use vessel_tracker::usecases::vessel_resolver::VesselResolver;

// ---- Mock Definitions ----

mock! {
    pub Repo {}

    #[async_trait]
    impl VesselRepository for Repo {
        async fn get_by_identifiers(
            &self,
            imos: &[ImoNumber],
        ) -> anyhow::Result<HashMap<ImoNumber, VesselIdentity>>;
        async fn get_by_mmsi(&self, mmsi: &Mmsi) -> anyhow::Result<Option<VesselIdentity>>;
        async fn upsert(&self, vessel: &VesselIdentity) -> anyhow::Result<()>;
        async fn mark_tracked(&self, mmsis: &[Mmsi]) -> anyhow::Result<u64>;
        async fn insert_position(
            &self,
            mmsi: &Mmsi,
            position: GeoPoint,
            timestamp: DateTime<Utc>,
        ) -> anyhow::Result<()>;
        async fn update_last_known_position(
            &self,
            imo: &ImoNumber,
            position: GeoPoint,
        ) -> anyhow::Result<()>;
        async fn top_vessels(&self, limit: usize) -> anyhow::Result<Vec<VesselIdentity>>;
        async fn route(&self, mmsi: &Mmsi) -> anyhow::Result<Vec<GeoPoint>>;
    }
}

mock! {
    pub Lookup {}

    #[async_trait]
    impl IdentityLookup for Lookup {
        async fn lookup_mmsi(&self, imo: &ImoNumber) -> Result<Mmsi, LookupError>;
    }
}

// ---- Helpers ----

const A: &str = "9321483";
const B: &str = "9778791";
const C: &str = "9632179";
const D: &str = "9454448";
const E: &str = "9703291";

fn imo(raw: &str) -> ImoNumber {
    ImoNumber::parse(raw).unwrap()
}

fn mmsi(raw: &str) -> Mmsi {
    Mmsi::parse(raw).unwrap()
}

/// Stored vessel whose MMSI is derived from the IMO digits.
fn stored(raw_imo: &str) -> VesselIdentity {
    VesselIdentity::new(imo(raw_imo)).with_mmsi(mmsi(&format!("2{}", &raw_imo[1..])))
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        step: Duration::from_millis(1),
    }
}

fn resolver(
    repo: MockRepo,
    lookup: MockLookup,
    recorder: &Arc<EventRecorder>,
) -> VesselResolver<MockRepo, MockLookup> {
    let pool = LookupPool::new(
        Arc::new(lookup),
        3,
        fast_retry(),
        Arc::clone(recorder),
        CancellationToken::new(),
    );
    VesselResolver::new(Arc::new(repo), pool, Arc::clone(recorder))
}

/// Repository holding `present`, accepting every upsert.
fn repo_with(present: &[&str]) -> MockRepo {
    let rows: HashMap<ImoNumber, VesselIdentity> =
        present.iter().map(|raw| (imo(raw), stored(raw))).collect();

    let mut repo = MockRepo::new();
    repo.expect_get_by_identifiers()
        .times(1)
        .returning(move |imos: &[ImoNumber]| {
            Ok(imos
                .iter()
                .filter_map(|i| rows.get(i).map(|v| (i.clone(), v.clone())))
                .collect())
        });
    repo.expect_upsert().returning(|_| Ok(()));
    repo
}

// ---- Resolver ----

#[tokio::test]
async fn test_one_bulk_call_and_one_job_per_miss() {
    let recorder = Arc::new(EventRecorder::new());
    let repo = repo_with(&[A, B]);

    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .times(3)
        .returning(|_| Ok(mmsi("244650000")));

    let resolver = resolver(repo, lookup, &recorder);
    let resolved = resolver
        .resolve_imos([A, B, C, D, E].into_iter().map(imo))
        .await;

    assert_eq!(resolved.len(), 5);
    assert!(resolved.values().all(VesselIdentity::is_resolved));
    resolver.flush().await;
}

#[tokio::test]
async fn test_repeated_identifiers_produce_one_job() {
    let recorder = Arc::new(EventRecorder::new());
    let repo = repo_with(&[]);

    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .with(eq(imo(D)))
        .times(1)
        .returning(|_| Ok(mmsi("244650000")));

    let resolver = resolver(repo, lookup, &recorder);
    let candidates = [
        VesselIdentity::new(imo("IMO 9454448")).with_details("EVER GIVEN", "EG"),
        VesselIdentity::new(imo(" 9454448 ")),
        VesselIdentity::new(imo("imo:9454448")),
    ];
    let resolved = resolver.resolve(candidates).await;

    assert_eq!(resolved.len(), 1);
    let vessel = &resolved[&imo(D)];
    assert_eq!(vessel.name, "EVER GIVEN");
    assert_eq!(vessel.mmsi, Some(mmsi("244650000")));
    resolver.flush().await;
}

#[tokio::test]
async fn test_end_to_end_resolution_counts_only_failed_attempts() {
    let recorder = Arc::new(EventRecorder::new());
    let repo = repo_with(&[A, B, C]);

    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .with(eq(imo(D)))
        .times(1)
        .returning(|_| Ok(mmsi("244650000")));
    lookup
        .expect_lookup_mmsi()
        .with(eq(imo(E)))
        .times(3)
        .returning(|_| Err(LookupError::Status(503)));

    let resolver = resolver(repo, lookup, &recorder);
    let errors_before = recorder.snapshot().errors;
    let resolved = resolver
        .resolve_imos([A, B, C, D, E].into_iter().map(imo))
        .await;
    resolver.flush().await;

    for raw in [A, B, C] {
        assert_eq!(resolved[&imo(raw)].mmsi, stored(raw).mmsi);
    }
    assert_eq!(resolved[&imo(D)].mmsi, Some(mmsi("244650000")));
    assert_eq!(resolved[&imo(E)].mmsi, None);
    assert_eq!(recorder.snapshot().errors - errors_before, 3);
}

#[tokio::test]
async fn test_bulk_lookup_failure_falls_back_to_external_lookups() {
    let recorder = Arc::new(EventRecorder::new());
    let mut repo = MockRepo::new();
    repo.expect_get_by_identifiers()
        .times(1)
        .returning(|_| Err(anyhow::anyhow!("connection refused")));
    repo.expect_upsert().returning(|_| Ok(()));

    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .times(2)
        .returning(|_| Ok(mmsi("244650000")));

    let resolver = resolver(repo, lookup, &recorder);
    let resolved = resolver.resolve_imos([imo(A), imo(B)]).await;
    resolver.flush().await;

    assert_eq!(resolved.len(), 2);
    assert_eq!(recorder.snapshot().errors, 1);
}

#[tokio::test]
async fn test_persistence_pass_upserts_every_identity() {
    let recorder = Arc::new(EventRecorder::new());
    let mut repo = MockRepo::new();
    repo.expect_get_by_identifiers()
        .times(1)
        .returning(|_| Ok(HashMap::new()));
    repo.expect_upsert().times(2).returning(|_| Ok(()));

    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .returning(|_| Err(LookupError::MarkerNotFound));

    let resolver = resolver(repo, lookup, &recorder);
    let resolved = resolver.resolve_imos([imo(A), imo(B)]).await;
    resolver.flush().await;

    assert!(resolved.values().all(|v| !v.is_resolved()));
}

// ---- Worker Pool ----

#[tokio::test]
async fn test_failing_job_is_attempted_exactly_three_times() {
    let recorder = Arc::new(EventRecorder::new());
    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .times(3)
        .returning(|_| Err(LookupError::Network("timeout".to_string())));

    let pool = LookupPool::new(
        Arc::new(lookup),
        3,
        fast_retry(),
        Arc::clone(&recorder),
        CancellationToken::new(),
    );
    let mut results = pool.run(vec![ResolutionJob::new(imo(E))]);

    let outcome = results.recv().await.unwrap();
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.mmsi, None);
    assert_eq!(outcome.error, Some(LookupError::Network("timeout".to_string())));
    assert!(results.recv().await.is_none());
}

#[tokio::test]
async fn test_first_success_short_circuits_retries() {
    let recorder = Arc::new(EventRecorder::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut lookup = MockLookup::new();
    lookup.expect_lookup_mmsi().returning(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(LookupError::Status(429))
        } else {
            Ok(mmsi("244650000"))
        }
    });

    let pool = LookupPool::new(
        Arc::new(lookup),
        1,
        fast_retry(),
        Arc::clone(&recorder),
        CancellationToken::new(),
    );
    let mut results = pool.run(vec![ResolutionJob::new(imo(D))]);
    let outcome = results.recv().await.unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.mmsi, Some(mmsi("244650000")));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.snapshot().errors, 1);
}

/// Lookup that tracks how many calls are in flight at once.
struct ConcurrencyGauge {
    in_flight: AtomicUsize,
    max_seen: AtomicUsize,
}

#[async_trait]
impl IdentityLookup for ConcurrencyGauge {
    async fn lookup_mmsi(&self, _imo: &ImoNumber) -> Result<Mmsi, LookupError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Mmsi::parse("244650000").unwrap())
    }
}

#[tokio::test]
async fn test_pool_never_exceeds_worker_count() {
    let gauge = Arc::new(ConcurrencyGauge {
        in_flight: AtomicUsize::new(0),
        max_seen: AtomicUsize::new(0),
    });
    let pool = LookupPool::new(
        Arc::clone(&gauge),
        3,
        fast_retry(),
        Arc::new(EventRecorder::new()),
        CancellationToken::new(),
    );

    let jobs = (0..20)
        .map(|i| ResolutionJob::new(imo(&format!("93{i:05}"))))
        .collect();
    let mut results = pool.run(jobs);
    let mut received = 0;
    while results.recv().await.is_some() {
        received += 1;
    }

    assert_eq!(received, 20);
    assert!(gauge.max_seen.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn test_cancellation_abandons_pending_lookups() {
    let cancel = CancellationToken::new();
    let mut lookup = MockLookup::new();
    lookup
        .expect_lookup_mmsi()
        .returning(|_| Err(LookupError::Network("down".to_string())));

    let pool = LookupPool::new(
        Arc::new(lookup),
        1,
        RetryPolicy {
            max_attempts: 3,
            step: Duration::from_secs(60),
        },
        Arc::new(EventRecorder::new()),
        cancel.clone(),
    );
    let mut results = pool.run(vec![ResolutionJob::new(imo(A)), ResolutionJob::new(imo(B))]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        let mut outcomes = Vec::new();
        while let Some(outcome) = results.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    })
    .await
    .expect("result channel should close after cancellation");

    assert!(drained.len() <= 2);
    assert!(drained.iter().all(|o| o.mmsi.is_none()));
    assert!(
        drained
            .iter()
            .any(|o| o.error == Some(LookupError::Cancelled))
    );
}

// ---- Position Sink ----

#[tokio::test]
async fn test_zero_timestamp_is_rejected_without_writes() {
    let mut repo = MockRepo::new();
    repo.expect_get_by_mmsi().never();
    repo.expect_insert_position().never();
    repo.expect_update_last_known_position().never();

    let sink = PositionSink::new(Arc::new(repo));
    let epoch = Utc.timestamp_opt(0, 0).unwrap();

    let zero = sink
        .insert_position(&mmsi("244650000"), GeoPoint::new(51.9, 4.1), Some(epoch))
        .await;
    assert!(matches!(zero, Err(TrackerError::Validation(_))));

    let missing = sink
        .insert_position(&mmsi("244650000"), GeoPoint::new(51.9, 4.1), None)
        .await;
    assert!(matches!(missing, Err(TrackerError::Validation(_))));
}

#[tokio::test]
async fn test_out_of_range_coordinates_are_rejected_without_writes() {
    let mut repo = MockRepo::new();
    repo.expect_get_by_mmsi().never();
    repo.expect_insert_position().never();

    let sink = PositionSink::new(Arc::new(repo));
    let result = sink
        .insert_position(&mmsi("244650000"), GeoPoint::new(91.0, 181.0), Some(Utc::now()))
        .await;
    assert!(matches!(result, Err(TrackerError::Validation(_))));
}

#[tokio::test]
async fn test_unknown_vessel_is_not_found() {
    let mut repo = MockRepo::new();
    repo.expect_get_by_mmsi().times(1).returning(|_| Ok(None));
    repo.expect_insert_position().never();

    let sink = PositionSink::new(Arc::new(repo));
    let result = sink
        .insert_position(&mmsi("244650000"), GeoPoint::new(51.9, 4.1), Some(Utc::now()))
        .await;
    assert!(matches!(result, Err(TrackerError::NotFound(_))));
}

#[tokio::test]
async fn test_position_is_appended_and_cached_on_the_vessel() {
    let ts = Utc.with_ymd_and_hms(2024, 11, 21, 10, 15, 42).unwrap();
    let point = GeoPoint::new(51.9, 4.1);

    let mut repo = MockRepo::new();
    repo.expect_get_by_mmsi()
        .times(1)
        .returning(|_| Ok(Some(stored(A))));
    repo.expect_insert_position()
        .with(eq(stored(A).mmsi.unwrap()), eq(point), eq(ts))
        .times(1)
        .returning(|_, _, _| Ok(()));
    repo.expect_update_last_known_position()
        .with(eq(imo(A)), eq(point))
        .times(1)
        .returning(|_, _| Ok(()));

    let sink = PositionSink::new(Arc::new(repo));
    sink.insert_position(&stored(A).mmsi.unwrap(), point, Some(ts))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_repository_failure_is_a_persistence_error() {
    let mut repo = MockRepo::new();
    repo.expect_get_by_mmsi()
        .returning(|_| Ok(Some(stored(A))));
    repo.expect_insert_position()
        .returning(|_, _, _| Err(anyhow::anyhow!("disk full")));
    repo.expect_update_last_known_position().never();

    let sink = PositionSink::new(Arc::new(repo));
    let result = sink
        .insert_position(&stored(A).mmsi.unwrap(), GeoPoint::new(1.0, 1.0), Some(Utc::now()))
        .await;
    assert_eq!(result, Err(TrackerError::Persistence("disk full".to_string())));
}
