//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::CrowdStatus;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps the periodic counters to get
/// a consistent snapshot.
pub struct Metrics {
    /// Total observations ever ingested (monotonic)
    observations_total: AtomicU64,
    /// Observations since last report (reset on report)
    observations_since_report: AtomicU64,
    /// Observation lines that failed to parse (monotonic)
    parse_failures_total: AtomicU64,
    /// Observations dropped due to channel full (monotonic)
    observations_dropped: AtomicU64,
    /// Realtime state updates applied (monotonic)
    updates_total: AtomicU64,
    /// Level transitions executed by the realtime engine (monotonic)
    transitions_total: AtomicU64,
    /// Batch classifications by outcome (monotonic)
    classified_relaxed: AtomicU64,
    classified_moderate: AtomicU64,
    classified_congested: AtomicU64,
    classified_no_data: AtomicU64,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            observations_total: AtomicU64::new(0),
            observations_since_report: AtomicU64::new(0),
            parse_failures_total: AtomicU64::new(0),
            observations_dropped: AtomicU64::new(0),
            updates_total: AtomicU64::new(0),
            transitions_total: AtomicU64::new(0),
            classified_relaxed: AtomicU64::new(0),
            classified_moderate: AtomicU64::new(0),
            classified_congested: AtomicU64::new(0),
            classified_no_data: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    /// Record an observation received from a collector (lock-free)
    #[inline]
    pub fn record_observation(&self) {
        self.observations_total.fetch_add(1, Ordering::Relaxed);
        self.observations_since_report.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observation line that failed to parse (lock-free)
    #[inline]
    pub fn record_parse_failure(&self) {
        self.parse_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an observation dropped due to channel full (lock-free)
    #[inline]
    pub fn record_observation_dropped(&self) {
        self.observations_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a realtime state update; `transitioned` marks an executed
    /// level switch (lock-free)
    #[inline]
    pub fn record_update(&self, transitioned: bool) {
        self.updates_total.fetch_add(1, Ordering::Relaxed);
        if transitioned {
            self.transitions_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a batch classification outcome (lock-free)
    #[inline]
    pub fn record_classification(&self, status: CrowdStatus) {
        let counter = match status {
            CrowdStatus::Relaxed => &self.classified_relaxed,
            CrowdStatus::Moderate => &self.classified_moderate,
            CrowdStatus::Congested => &self.classified_congested,
            CrowdStatus::NoData => &self.classified_no_data,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total observations ingested
    #[inline]
    pub fn observations_total(&self) -> u64 {
        self.observations_total.load(Ordering::Relaxed)
    }

    /// Get total parse failures
    #[inline]
    pub fn parse_failures_total(&self) -> u64 {
        self.parse_failures_total.load(Ordering::Relaxed)
    }

    /// Get total observations dropped
    #[inline]
    pub fn observations_dropped(&self) -> u64 {
        self.observations_dropped.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self, tracked_beaches: usize) -> MetricsSummary {
        let observations_count = self.observations_since_report.swap(0, Ordering::Relaxed);

        // Monotonic counters (don't reset)
        let observations_total = self.observations_total.load(Ordering::Relaxed);
        let parse_failures_total = self.parse_failures_total.load(Ordering::Relaxed);
        let observations_dropped = self.observations_dropped.load(Ordering::Relaxed);
        let updates_total = self.updates_total.load(Ordering::Relaxed);
        let transitions_total = self.transitions_total.load(Ordering::Relaxed);
        let classified_relaxed = self.classified_relaxed.load(Ordering::Relaxed);
        let classified_moderate = self.classified_moderate.load(Ordering::Relaxed);
        let classified_congested = self.classified_congested.load(Ordering::Relaxed);
        let classified_no_data = self.classified_no_data.load(Ordering::Relaxed);

        // Calculate elapsed time and reset
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let observations_per_sec = if elapsed.as_secs_f64() > 0.0 {
            observations_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            observations_total,
            observations_per_sec,
            parse_failures_total,
            observations_dropped,
            updates_total,
            transitions_total,
            classified_relaxed,
            classified_moderate,
            classified_congested,
            classified_no_data,
            tracked_beaches,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct MetricsSummary {
    pub observations_total: u64,
    pub observations_per_sec: f64,
    pub parse_failures_total: u64,
    pub observations_dropped: u64,
    pub updates_total: u64,
    pub transitions_total: u64,
    pub classified_relaxed: u64,
    pub classified_moderate: u64,
    pub classified_congested: u64,
    pub classified_no_data: u64,
    /// Beaches with realtime state (snapshot)
    pub tracked_beaches: usize,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            observations_total = %self.observations_total,
            observations_per_sec = format!("{:.1}", self.observations_per_sec),
            parse_failures = %self.parse_failures_total,
            dropped = %self.observations_dropped,
            updates = %self.updates_total,
            transitions = %self.transitions_total,
            relaxed = %self.classified_relaxed,
            moderate = %self.classified_moderate,
            congested = %self.classified_congested,
            no_data = %self.classified_no_data,
            tracked_beaches = %self.tracked_beaches,
            "metrics"
        );
    }
}
