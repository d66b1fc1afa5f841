//! Shared types for the congestion core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Three-level congestion grade maintained by the realtime engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CongestionLevel {
    Relaxed,
    Moderate,
    Congested,
}

impl CongestionLevel {
    pub fn as_str(&self) -> &str {
        match self {
            CongestionLevel::Relaxed => "relaxed",
            CongestionLevel::Moderate => "moderate",
            CongestionLevel::Congested => "congested",
        }
    }
}

impl std::fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification outcome for the batch path
///
/// `NoData` marks a stale or absent feed. It is a status of its own so
/// callers can render "unknown" instead of a misleading `Relaxed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrowdStatus {
    Relaxed,
    Moderate,
    Congested,
    NoData,
}

impl CrowdStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CrowdStatus::Relaxed => "relaxed",
            CrowdStatus::Moderate => "moderate",
            CrowdStatus::Congested => "congested",
            CrowdStatus::NoData => "no_data",
        }
    }
}

impl From<CongestionLevel> for CrowdStatus {
    fn from(level: CongestionLevel) -> Self {
        match level {
            CongestionLevel::Relaxed => CrowdStatus::Relaxed,
            CongestionLevel::Moderate => CrowdStatus::Moderate,
            CongestionLevel::Congested => CrowdStatus::Congested,
        }
    }
}

impl std::fmt::Display for CrowdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Adaptive headcount threshold pair derived per classification call
///
/// `relax` is the floor of the moderate band, `busy` the floor of the
/// congested band. Derivation guarantees `busy >= relax + min gap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Thresholds {
    pub relax: u32,
    pub busy: u32,
}

/// Read view of a beach's realtime state
#[derive(Debug, Clone, Serialize)]
pub struct BeachSnapshot {
    pub level: CongestionLevel,
    pub ema_density: f64,
    pub last_switch: DateTime<Utc>,
}

/// Result of folding one observation into the realtime state
///
/// Carries the per-observation derived values alongside the snapshot so
/// collectors can log them without recomputing.
#[derive(Debug, Clone)]
pub struct UpdateResult {
    pub snapshot: BeachSnapshot,
    /// Instantaneous people-per-m2 for this observation
    pub density: f64,
    /// Area after ROI scaling and the epsilon floor
    pub effective_area: f64,
    /// (from, to) when this update executed a level transition
    pub transition: Option<(CongestionLevel, CongestionLevel)>,
}

/// One crowd-count observation as sent by a collector (JSONL)
#[derive(Debug, Clone, Deserialize)]
pub struct ObservationRecord {
    pub beach_id: String,
    pub person_count: u32,
    /// Fraction of the reference area actually sensed; absent or <= 0 means 1.0
    #[serde(default)]
    pub roi_ratio: Option<f64>,
    /// Capture time; defaults to receive time when absent
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

/// Client-facing classification result for one beach
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub status: CrowdStatus,
    /// Weight-adjusted 0..1 score; absent when status is `NoData`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub latest_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
}
