//! Calendar-context score weighting
//!
//! Nudges a 0..1 congestion score by bounded multiplicative factors for
//! peak season, weekends, and the afternoon peak band. The combined
//! multiplier is clamped so context never swings the score by more than
//! the configured bounds. Applied to the numeric score only - the
//! displayed grade stays on raw headcounts.

use crate::infra::config::{Config, WeightsConfig};
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

/// Calendar facts extracted from an observation timestamp
#[derive(Debug, Clone, Copy)]
pub struct WeightContext {
    pub month: u32,
    pub weekday: Weekday,
    pub hour: u32,
}

impl WeightContext {
    pub fn from_datetime(ts: DateTime<Utc>) -> Self {
        Self { month: ts.month(), weekday: ts.weekday(), hour: ts.hour() }
    }
}

/// Pure score adjuster; no state beyond its parameters, safe to share
/// across threads without synchronization.
#[derive(Debug, Clone)]
pub struct WeightAdjuster {
    params: WeightsConfig,
}

impl WeightAdjuster {
    pub fn new(config: &Config) -> Self {
        Self { params: config.weights().clone() }
    }

    /// Apply the bounded context multiplier to a 0..1 score
    pub fn apply(&self, score: f64, ctx: &WeightContext) -> f64 {
        let p = &self.params;
        let mut w = 1.0;

        if p.peak_months.contains(&ctx.month) {
            w *= p.boost_factor;
        }
        if matches!(ctx.weekday, Weekday::Sat | Weekday::Sun) {
            w *= p.boost_factor;
        }
        if ctx.hour >= p.peak_hour_start && ctx.hour <= p.peak_hour_end {
            w *= p.boost_factor;
        }

        let w = w.clamp(p.min_weight, p.max_weight);
        (score * w).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn adjuster() -> WeightAdjuster {
        WeightAdjuster::new(&Config::default())
    }

    fn at(y: i32, mo: u32, d: u32, h: u32) -> WeightContext {
        WeightContext::from_datetime(Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap())
    }

    #[test]
    fn test_all_factors_clamp_to_upper_bound() {
        // 2025-07-12 is a Saturday: season + weekend + peak hour
        // 1.1^3 = 1.331 clamps to 1.2, so 0.5 -> 0.6
        let ctx = at(2025, 7, 12, 14);
        let adjusted = adjuster().apply(0.5, &ctx);
        assert!((adjusted - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_no_factors_leaves_score_unchanged() {
        // 2025-03-05 is a Wednesday morning
        let ctx = at(2025, 3, 5, 9);
        let adjusted = adjuster().apply(0.5, &ctx);
        assert!((adjusted - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_single_factor_applies_boost() {
        // 2025-07-09 is a Wednesday, off-peak hour: season only
        let ctx = at(2025, 7, 9, 9);
        let adjusted = adjuster().apply(0.5, &ctx);
        assert!((adjusted - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_result_clamped_to_one() {
        let ctx = at(2025, 7, 12, 14);
        let adjusted = adjuster().apply(0.95, &ctx);
        assert!((adjusted - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_multiplier_clamped_to_lower_bound() {
        let weights = WeightsConfig { boost_factor: 0.5, ..WeightsConfig::default() };
        let adjuster = WeightAdjuster::new(&Config::default().with_weights(weights));
        // Season only: w = 0.5 clamps up to 0.8
        let ctx = at(2025, 7, 9, 9);
        let adjusted = adjuster.apply(0.5, &ctx);
        assert!((adjusted - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_for_same_inputs() {
        let adjuster = adjuster();
        let ctx = at(2025, 8, 3, 15);
        assert_eq!(adjuster.apply(0.42, &ctx), adjuster.apply(0.42, &ctx));
    }
}
