//! Crowdwatch - beach congestion classification service
//!
//! Converts noisy crowd-count observations into a stable three-level
//! congestion grade per beach.
//!
//! Module structure:
//! - `domain/` - Core types (levels, observations, snapshots)
//! - `io/` - External interfaces (stdin JSONL ingest)
//! - `services/` - Classification logic (realtime, batch, weights)
//! - `infra/` - Infrastructure (Config, Metrics)

use chrono::Utc;
use clap::Parser;
use crowdwatch::infra::{Config, Metrics};
use crowdwatch::io::run_stdin_ingest;
use crowdwatch::services::RealtimeEngine;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Crowdwatch - beach congestion classification service
#[derive(Parser, Debug)]
#[command(name = "crowdwatch", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git_hash = env!("GIT_HASH"), "crowdwatch starting");

    // Parse command line arguments using clap
    let args = Args::parse();

    // Load configuration from TOML file
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        alpha = %config.realtime().alpha,
        min_hold_secs = %config.realtime().min_hold_secs,
        min_samples = %config.batch().min_samples,
        freshness_mins = %config.batch().freshness_mins,
        locations = %config.location_ids().count(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create shared components
    let engine = Arc::new(RealtimeEngine::new(&config));
    let metrics = Arc::new(Metrics::new());

    // Create observation channel (bounded for backpressure)
    let (obs_tx, mut obs_rx) = mpsc::channel(config.ingest_channel_capacity());

    // Start stdin ingest
    let ingest_metrics = metrics.clone();
    let ingest_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_stdin_ingest(obs_tx, ingest_metrics, ingest_shutdown).await {
            tracing::error!(error = %e, "ingest error");
        }
    });

    // Start metrics reporter (lock-free reads with full summary)
    let metrics_clone = metrics.clone();
    let engine_clone = engine.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            let summary = metrics_clone.report(engine_clone.tracked_beaches());
            summary.log();
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    info!("engine_started");

    // Main loop - fold observations into realtime state until the
    // channel closes or shutdown is signalled
    let mut shutdown = shutdown_rx;
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            record = obs_rx.recv() => {
                let Some(record) = record else { break };
                let area_m2 = config.area_m2(&record.beach_id);
                let now = record.observed_at.unwrap_or_else(Utc::now);
                let result =
                    engine.update(&record.beach_id, record.person_count, record.roi_ratio, area_m2, now);
                metrics.record_update(result.transition.is_some());
            }
        }
    }

    // Final summary before exit
    metrics.report(engine.tracked_beaches()).log();

    info!("crowdwatch shutdown complete");
    Ok(())
}
