//! Percentile-based batch congestion classifier
//!
//! Converts the latest headcount plus a trailing window of counts into a
//! bounded 0..1 score and a discrete status. Thresholds adapt to each
//! beach's own history once enough samples exist; sparse windows fall
//! back to static defaults. Stateless - every call derives everything
//! fresh from its inputs.
//!
//! Key behaviors:
//! - Score denominator is the window p90 (or a static fallback when sparse)
//! - Status compares the raw latest count against derived thresholds;
//!   calendar weighting touches only the score
//! - A stale or absent latest observation yields `NoData`, never `Relaxed`

use crate::domain::types::{Classification, CrowdStatus, Thresholds};
use crate::infra::config::{BatchConfig, Config};
use crate::services::weights::{WeightAdjuster, WeightContext};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

pub struct BatchClassifier {
    params: BatchConfig,
    weights: WeightAdjuster,
}

impl BatchClassifier {
    pub fn new(config: &Config) -> Self {
        Self { params: config.batch().clone(), weights: WeightAdjuster::new(config) }
    }

    /// Classify one beach's latest count against its trailing window
    ///
    /// `observed_at` is the capture time of `latest_count`; `None` or a
    /// timestamp outside the freshness window short-circuits to `NoData`
    /// with no score.
    pub fn classify(
        &self,
        beach_id: &str,
        latest_count: u32,
        observed_at: Option<DateTime<Utc>>,
        window: &[u32],
        now: DateTime<Utc>,
    ) -> Classification {
        let fresh = observed_at.is_some_and(|t| {
            now.signed_duration_since(t) <= Duration::minutes(self.params.freshness_mins)
        });
        if !fresh {
            debug!(beach_id = %beach_id, "classification_no_data");
            return Classification {
                status: CrowdStatus::NoData,
                score: None,
                latest_count,
                thresholds: None,
            };
        }

        let fallback = self.params.fallback_denominator as f64;
        let base = if window.len() >= self.params.min_samples {
            safe_ratio(latest_count as f64, percentile(window, 90.0) as f64, fallback)
        } else {
            safe_ratio(latest_count as f64, fallback, fallback)
        };

        let thresholds = self.derive_thresholds(window);
        let status = if latest_count >= thresholds.busy {
            CrowdStatus::Congested
        } else if latest_count >= thresholds.relax {
            CrowdStatus::Moderate
        } else {
            CrowdStatus::Relaxed
        };

        let weighted = self.weights.apply(base, &WeightContext::from_datetime(now));
        let score = round_half_up(weighted, self.params.score_precision);

        debug!(
            beach_id = %beach_id,
            status = %status,
            score = %score,
            latest_count = %latest_count,
            window_len = %window.len(),
            "classification"
        );

        Classification { status, score: Some(score), latest_count, thresholds: Some(thresholds) }
    }

    /// Derive the (relax, busy) threshold pair from the window
    ///
    /// Sparse windows get the static defaults; otherwise p50/p90 with the
    /// defaults as floors and a guaranteed separation band between the two.
    pub fn derive_thresholds(&self, window: &[u32]) -> Thresholds {
        let p = &self.params;
        if window.len() < p.min_samples {
            return Thresholds { relax: p.default_relax, busy: p.default_busy };
        }

        let relax = p.default_relax.max(percentile(window, 50.0));
        let mut busy = p.default_busy.max(percentile(window, 90.0));
        if busy < relax + p.min_threshold_gap {
            busy = relax + p.min_threshold_gap;
        }
        Thresholds { relax, busy }
    }
}

/// Nearest-rank percentile: sort ascending, take `ceil(p/100 * n) - 1`
/// clamped to valid indices. Empty input returns 0.
fn percentile(xs: &[u32], p: f64) -> u32 {
    if xs.is_empty() {
        return 0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_unstable();
    let last = sorted.len() as isize - 1;
    let idx = ((p / 100.0 * sorted.len() as f64).ceil() as isize - 1).clamp(0, last) as usize;
    sorted[idx]
}

/// Ratio guarded against bad denominators and non-finite results,
/// clamped to 0..1. A zero or negative denominator is replaced by the
/// fallback rather than raised as an error.
fn safe_ratio(num: f64, den: f64, fallback_den: f64) -> f64 {
    let den = if den > 0.0 { den } else { fallback_den };
    let v = num / den;
    if !v.is_finite() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

fn round_half_up(v: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FALLBACK: f64 = 20.0;

    fn classifier() -> BatchClassifier {
        BatchClassifier::new(&Config::default())
    }

    /// Wednesday morning in March: no weighting factors apply
    fn neutral_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_safe_ratio_bad_denominator_uses_fallback() {
        assert_eq!(safe_ratio(10.0, 0.0, FALLBACK), safe_ratio(10.0, FALLBACK, FALLBACK));
        assert_eq!(safe_ratio(10.0, -3.0, FALLBACK), safe_ratio(10.0, FALLBACK, FALLBACK));
        assert_eq!(safe_ratio(10.0, 0.0, FALLBACK), 0.5);
    }

    #[test]
    fn test_safe_ratio_stays_in_unit_interval() {
        assert_eq!(safe_ratio(50.0, 20.0, FALLBACK), 1.0);
        assert_eq!(safe_ratio(0.0, 20.0, FALLBACK), 0.0);
        let v = safe_ratio(7.0, 20.0, FALLBACK);
        assert!((0.0..=1.0).contains(&v));
    }

    #[test]
    fn test_safe_ratio_non_finite_is_zero() {
        assert_eq!(safe_ratio(f64::NAN, 20.0, FALLBACK), 0.0);
        assert_eq!(safe_ratio(f64::INFINITY, 20.0, FALLBACK), 0.0);
    }

    #[test]
    fn test_percentile_nearest_rank_on_twelve_samples() {
        let xs: Vec<u32> = (1..=12).collect();
        // ceil(0.5 * 12) - 1 = 5 -> 6; ceil(0.9 * 12) - 1 = 10 -> 11
        assert_eq!(percentile(&xs, 50.0), 6);
        assert_eq!(percentile(&xs, 90.0), 11);
    }

    #[test]
    fn test_percentile_sorts_unordered_input() {
        let xs = vec![12, 1, 7, 3, 9, 5, 11, 2, 8, 4, 10, 6];
        assert_eq!(percentile(&xs, 90.0), 11);
    }

    #[test]
    fn test_percentile_empty_is_zero() {
        assert_eq!(percentile(&[], 50.0), 0);
    }

    #[test]
    fn test_percentile_single_element() {
        assert_eq!(percentile(&[42], 50.0), 42);
        assert_eq!(percentile(&[42], 90.0), 42);
    }

    #[test]
    fn test_thresholds_sparse_window_uses_static_defaults() {
        let c = classifier();
        // 11 samples is one short of min_samples; content is irrelevant
        let window = vec![500; 11];
        assert_eq!(c.derive_thresholds(&window), Thresholds { relax: 6, busy: 16 });
        assert_eq!(c.derive_thresholds(&[]), Thresholds { relax: 6, busy: 16 });
    }

    #[test]
    fn test_thresholds_adapt_to_window_percentiles() {
        let c = classifier();
        let window: Vec<u32> = (10..=21).collect(); // p50 = 15, p90 = 20
        assert_eq!(c.derive_thresholds(&window), Thresholds { relax: 15, busy: 20 });
    }

    #[test]
    fn test_thresholds_keep_minimum_separation() {
        let c = classifier();
        // Flat window: p50 == p90 == 30, so busy is forced to relax + 4
        let window = vec![30; 12];
        let t = c.derive_thresholds(&window);
        assert_eq!(t, Thresholds { relax: 30, busy: 34 });
        assert!(t.busy >= t.relax + 4);
    }

    #[test]
    fn test_thresholds_never_drop_below_defaults() {
        let c = classifier();
        let window = vec![0; 12];
        assert_eq!(c.derive_thresholds(&window), Thresholds { relax: 6, busy: 16 });
    }

    #[test]
    fn test_status_follows_raw_count_against_thresholds() {
        let c = classifier();
        let now = neutral_now();
        let window = vec![0; 12]; // thresholds (6, 16)

        let congested = c.classify("b1", 16, Some(now), &window, now);
        assert_eq!(congested.status, CrowdStatus::Congested);

        let moderate = c.classify("b1", 6, Some(now), &window, now);
        assert_eq!(moderate.status, CrowdStatus::Moderate);

        let relaxed = c.classify("b1", 5, Some(now), &window, now);
        assert_eq!(relaxed.status, CrowdStatus::Relaxed);
    }

    #[test]
    fn test_score_weighted_but_status_not() {
        let c = classifier();
        // Saturday in August, peak hour: multiplier clamps to 1.2
        let now = Utc.with_ymd_and_hms(2025, 8, 2, 14, 0, 0).unwrap();
        // p50 = 5 -> relax max(6,5) = 6; p90 = 20 -> busy 20
        let window = vec![0, 0, 0, 0, 0, 5, 20, 20, 20, 20, 20, 20];
        let result = c.classify("b1", 10, Some(now), &window, now);

        // base = 10/20 = 0.5, weighted to 0.6
        assert_eq!(result.score, Some(0.6));
        // grade stays on the raw count: 10 >= 6 and < 20
        assert_eq!(result.status, CrowdStatus::Moderate);
        assert_eq!(result.thresholds, Some(Thresholds { relax: 6, busy: 20 }));
    }

    #[test]
    fn test_sparse_window_scores_against_fallback_denominator() {
        let c = classifier();
        let now = neutral_now();
        let result = c.classify("b1", 10, Some(now), &[1, 2, 3], now);
        // 10 / 20 with no weighting factors
        assert_eq!(result.score, Some(0.5));
        assert_eq!(result.status, CrowdStatus::Moderate);
    }

    #[test]
    fn test_score_rounds_half_up() {
        let c = classifier();
        let now = neutral_now();
        // p90 = 8, latest 1 -> 0.125, which rounds to 0.13
        let window = vec![1, 2, 3, 4, 5, 6, 7, 8, 8, 8, 8, 8];
        let result = c.classify("b1", 1, Some(now), &window, now);
        assert_eq!(result.score, Some(0.13));
    }

    #[test]
    fn test_missing_observation_is_no_data() {
        let c = classifier();
        let result = c.classify("b1", 0, None, &[5; 12], neutral_now());
        assert_eq!(result.status, CrowdStatus::NoData);
        assert_eq!(result.score, None);
        assert_eq!(result.thresholds, None);
    }

    #[test]
    fn test_stale_observation_is_no_data() {
        let c = classifier();
        let now = neutral_now();
        let stale = now - Duration::minutes(31);
        let result = c.classify("b1", 9, Some(stale), &[5; 12], now);
        assert_eq!(result.status, CrowdStatus::NoData);
        assert_eq!(result.score, None);
    }

    #[test]
    fn test_observation_at_freshness_boundary_still_classified() {
        let c = classifier();
        let now = neutral_now();
        let at_boundary = now - Duration::minutes(30);
        let result = c.classify("b1", 9, Some(at_boundary), &[5; 12], now);
        assert_ne!(result.status, CrowdStatus::NoData);
        assert!(result.score.is_some());
    }

    #[test]
    fn test_identical_inputs_yield_identical_results() {
        let c = classifier();
        let now = neutral_now();
        let window = vec![3, 9, 4, 12, 7, 5, 8, 2, 11, 6, 10, 1];
        let a = c.classify("b1", 7, Some(now), &window, now);
        let b = c.classify("b1", 7, Some(now), &window, now);
        assert_eq!(a, b);
    }
}
