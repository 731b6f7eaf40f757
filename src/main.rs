//! Vessel Tracker - Entry Point
//!
//! Two modes:
//! - `stream`: track the most frequently seen vessels on the AIS feed
//!   and persist their positions until SIGINT
//! - `resolve IMO...`: resolve IMO numbers to MMSIs (cache-aside) and
//!   print the merged identities as JSON
//!
//! `locate PREFIX` queries the location reference data and
//! `route MMSI` prints a vessel's recorded track.
//!
//! Wiring sequence (stream):
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging on stderr)
//! 3. Open stores and the daily event log
//! 4. Select tracked vessels (top N by appearances)
//! 5. Spawn metrics (:9090) and health (/live + /ready) servers
//! 6. Start the stream manager (connect → subscribe → stream)
//! 7. Wait for SIGINT or reconnect exhaustion → cancel → drain → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vessel_tracker::adapters::lookup::{LookupClientConfig, VesselFinderClient};
use vessel_tracker::adapters::metrics::{HealthServer, MetricsRegistry};
use vessel_tracker::adapters::persistence::{DailyEventLog, FrameArchive, JsonLocationStore, JsonVesselStore};
use vessel_tracker::adapters::stream::AisStreamConnector;
use vessel_tracker::config::{self, AppConfig};
use vessel_tracker::domain::vessel::{ImoNumber, Mmsi};
use vessel_tracker::ports::location_repository::LocationRepository;
use vessel_tracker::ports::vessel_repository::VesselRepository;
use vessel_tracker::usecases::event_recorder::{DEFAULT_LOG_CAPACITY, EventRecorder, EventType};
use vessel_tracker::usecases::lookup_pool::LookupPool;
use vessel_tracker::usecases::stream_manager::{StreamManager, StreamSettings};
use vessel_tracker::usecases::vessel_resolver::VesselResolver;

/// AIS vessel position ingestion and IMO → MMSI resolution
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stream positions for the most frequently seen vessels
    Stream,
    /// Resolve IMO numbers to MMSIs and print the identities as JSON
    Resolve {
        /// IMO numbers (with or without the "IMO" prefix)
        #[arg(required = true)]
        imos: Vec<String>,
    },
    /// Autocomplete locations by UN/LOCODE, country or port name prefix
    Locate {
        prefix: String,
    },
    /// Print the recorded positions of a vessel, oldest first
    Route {
        mmsi: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. TLS crypto provider (before any HTTP/WS client) ──
    let _ = rustls::crypto::ring::default_provider().install_default();

    let cli = Cli::parse();

    // ── 2. Configuration + structured JSON logging ──────────
    let config = config::loader::load_config(&cli.config).context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.service.log_level)),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "Starting vessel tracker"
    );

    // ── 3. Event log + recorder ─────────────────────────────
    let event_log = Arc::new(
        DailyEventLog::new(Path::new(&config.persistence.log_dir))
            .await
            .context("Failed to open event log")?,
    );
    let (recorder, log_writer) = EventRecorder::with_log(event_log, DEFAULT_LOG_CAPACITY);
    let recorder = Arc::new(recorder);

    let outcome = match cli.command {
        Command::Stream => run_stream(&config, Arc::clone(&recorder)).await,
        Command::Resolve { imos } => run_resolve(&config, Arc::clone(&recorder), &imos).await,
        Command::Locate { prefix } => run_locate(&config, &prefix).await,
        Command::Route { mmsi } => run_route(&config, &mmsi).await,
    };

    if let Err(e) = &outcome {
        error!(error = %format!("{e:#}"), "Vessel tracker failed");
    }

    // ── Flush the event log (up to 5s) ──────────────────────
    drop(recorder);
    if tokio::time::timeout(Duration::from_secs(5), log_writer).await.is_err() {
        warn!("Event log writer did not drain in time");
    }

    outcome
}

/// Streaming mode: runs until SIGINT or reconnect exhaustion.
async fn run_stream(config: &AppConfig, recorder: Arc<EventRecorder>) -> Result<()> {
    let api_key = config::loader::stream_api_key(config)?;
    let repo = Arc::new(
        JsonVesselStore::open(Path::new(&config.persistence.data_dir))
            .await
            .context("Failed to open vessel store")?,
    );

    // ── 4. Tracked set: top N vessels with a known MMSI ─────
    let tracked: Vec<Mmsi> = repo
        .top_vessels(config.stream.tracked_vessel_limit)
        .await
        .context("Failed to load top vessels")?
        .into_iter()
        .filter_map(|v| v.mmsi)
        .collect();
    recorder.log_event(
        EventType::Startup,
        "Starting AIS stream",
        json!({ "tracked_vessels": tracked.len() }),
    );

    let settings = StreamSettings {
        api_key,
        bounding_box: config.stream.bounding_box,
        reconnect: config.stream.reconnect_policy(),
        persist_queue_capacity: config.stream.persist_queue_capacity,
        persist_workers: config.stream.persist_workers,
        stats_interval: config.stream.stats_interval(),
        archive_raw_frames: config.stream.archive_raw_frames,
        read_timeout: config.stream.read_timeout(),
    };
    let connector = Arc::new(AisStreamConnector::new(config.stream.url.clone()));
    let mut manager = StreamManager::new(connector, repo, Arc::clone(&recorder), settings);
    if config.stream.archive_raw_frames {
        let archive = FrameArchive::new(Path::new(&config.persistence.archive_dir))
            .await
            .context("Failed to open frame archive")?;
        manager = manager.with_archive(Arc::new(archive));
    }
    let manager = Arc::new(manager);

    // ── 5. Metrics + health servers ─────────────────────────
    let cancel = CancellationToken::new();
    let servers = if config.metrics.enabled {
        spawn_servers(config, &recorder, &manager, &cancel)?
    } else {
        Vec::new()
    };

    // ── 6. Connect and stream ───────────────────────────────
    let handle = manager
        .start_streaming(tracked, cancel.clone())
        .await
        .context("Failed to start AIS stream")?;
    info!("Streaming; press Ctrl-C to stop");

    // ── 7. Wait for SIGINT or the stream giving up ──────────
    let stream = handle.join();
    tokio::pin!(stream);
    let finished = tokio::select! {
        res = &mut stream => Some(res),
        _ = signal::ctrl_c() => None,
    };
    let result = match finished {
        Some(res) => res,
        None => {
            info!("SIGINT received, initiating graceful shutdown");
            cancel.cancel();
            stream.await
        }
    };
    cancel.cancel();

    for server in servers {
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }

    recorder.log_event(
        EventType::Shutdown,
        "AIS stream stopped",
        json!({ "outcome": result.as_ref().map_or_else(ToString::to_string, |_| "ok".to_string()) }),
    );
    result.map_err(Into::into)
}

fn spawn_servers(
    config: &AppConfig,
    recorder: &Arc<EventRecorder>,
    manager: &Arc<StreamManager<JsonVesselStore>>,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let metrics = Arc::new(
        MetricsRegistry::new(Arc::clone(recorder), manager.state()).context("Failed to create metrics registry")?,
    );
    let bind_address = config.metrics.bind_address.clone();
    let metrics_cancel = cancel.clone();
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = metrics.serve(bind_address, metrics_cancel).await {
            error!(error = %e, "Metrics server failed");
        }
    });

    let health = HealthServer::new(manager.state(), config.metrics.health_port);
    let health_cancel = cancel.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health.run(health_cancel).await {
            error!(error = %e, "Health server failed");
        }
    });

    Ok(vec![metrics_handle, health_handle])
}

/// Resolution mode: resolve, print, wait for persistence.
async fn run_resolve(config: &AppConfig, recorder: Arc<EventRecorder>, raw: &[String]) -> Result<()> {
    let imos = raw
        .iter()
        .map(|s| ImoNumber::parse(s))
        .collect::<Result<Vec<_>, _>>()
        .context("Invalid IMO number")?;

    let repo = Arc::new(
        JsonVesselStore::open(Path::new(&config.persistence.data_dir))
            .await
            .context("Failed to open vessel store")?,
    );
    let client = Arc::new(
        VesselFinderClient::new(&LookupClientConfig {
            base_url: config.lookup.base_url.clone(),
            timeout: Duration::from_millis(config.lookup.timeout_ms),
            user_agent: config.lookup.user_agent.clone(),
            requests_per_minute: config.lookup.requests_per_minute,
        })
        .context("Failed to create lookup client")?,
    );

    let cancel = CancellationToken::new();
    let pool = LookupPool::new(
        client,
        config.lookup.workers,
        config.lookup.retry_policy(),
        Arc::clone(&recorder),
        cancel.clone(),
    );
    let resolver = VesselResolver::new(repo, pool, recorder);

    let resolved = tokio::select! {
        resolved = resolver.resolve_imos(imos) => resolved,
        _ = signal::ctrl_c() => {
            info!("SIGINT received, abandoning lookups");
            cancel.cancel();
            return Ok(());
        }
    };

    let ordered: BTreeMap<_, _> = resolved.into_iter().collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&ordered).context("Failed to render identities")?
    );

    resolver.flush().await;
    Ok(())
}

/// Location autocomplete.
async fn run_locate(config: &AppConfig, prefix: &str) -> Result<()> {
    let store = JsonLocationStore::open(Path::new(&config.persistence.data_dir))
        .await
        .context("Failed to open location store")?;
    let matches = store.autocomplete(prefix).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&matches).context("Failed to render locations")?
    );
    Ok(())
}

/// Recorded track of one vessel.
async fn run_route(config: &AppConfig, raw: &str) -> Result<()> {
    let mmsi = Mmsi::parse(raw).context("Invalid MMSI")?;
    let repo = JsonVesselStore::open(Path::new(&config.persistence.data_dir))
        .await
        .context("Failed to open vessel store")?;
    let route = repo.route(&mmsi).await.context("Failed to load route")?;
    info!(mmsi = %mmsi, points = route.len(), "Route loaded");
    println!(
        "{}",
        serde_json::to_string_pretty(&route).context("Failed to render route")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_subcommand_takes_one_mmsi() {
        let cli = Cli::try_parse_from(["vessel-tracker", "route", "244650000"]).unwrap();
        assert!(matches!(cli.command, Command::Route { ref mmsi } if mmsi == "244650000"));
        assert!(Cli::try_parse_from(["vessel-tracker", "route"]).is_err());
    }
}
