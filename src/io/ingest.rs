//! Stdin observation ingest
//!
//! Reads JSONL observation records from stdin, one per line:
//! `{"beach_id":"cctv003","person_count":42,"roi_ratio":0.8,"observed_at":"2025-07-12T13:00:00Z"}`
//!
//! Malformed lines are counted and skipped, never fatal. Records are
//! forwarded on a bounded channel via try_send so a slow consumer never
//! blocks the reader - drops are counted in metrics.

use crate::domain::types::ObservationRecord;
use crate::infra::metrics::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Read observation records from stdin until EOF or shutdown
pub async fn run_stdin_ingest(
    obs_tx: mpsc::Sender<ObservationRecord>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let reader = BufReader::new(tokio::io::stdin());
    let mut lines = reader.lines();

    info!("ingest_started");

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            // Check for shutdown
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("ingest_shutdown");
                    return Ok(());
                }
            }
            line = lines.next_line() => {
                let line = match line? {
                    Some(line) => line,
                    None => {
                        info!("ingest_eof");
                        return Ok(());
                    }
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let record: ObservationRecord = match serde_json::from_str(line) {
                    Ok(record) => record,
                    Err(e) => {
                        metrics.record_parse_failure();
                        warn!(error = %e, "observation_parse_failed");
                        continue;
                    }
                };

                debug!(
                    beach_id = %record.beach_id,
                    person_count = %record.person_count,
                    "observation_received"
                );

                // Use try_send to never block the reader
                metrics.record_observation();
                match obs_tx.try_send(record) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        metrics.record_observation_dropped();
                        if last_drop_warn.elapsed() > Duration::from_secs(1) {
                            warn!("observation_dropped: channel full");
                            last_drop_warn = Instant::now();
                        }
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!("observation_channel_closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}
