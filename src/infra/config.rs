//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. Default: config/dev.toml
//!
//! Missing file falls back to built-in defaults with a warning so the
//! service still comes up on a bare host.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SiteConfig {
    /// Unique deployment identifier (e.g., "gangneung", "sokcho")
    #[serde(default = "default_site_id")]
    pub id: String,
}

fn default_site_id() -> String {
    "crowdwatch".to_string()
}

/// EMA and hysteresis parameters for the realtime engine
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// EMA smoothing constant in (0,1); higher reacts faster but is noisier
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Minimum dwell between level transitions (seconds)
    #[serde(default = "default_min_hold_secs")]
    pub min_hold_secs: u64,
    /// Relaxed -> Moderate when ema density reaches this (people/m2)
    #[serde(default = "default_up_relax_to_moderate")]
    pub up_relax_to_moderate: f64,
    /// Moderate -> Congested
    #[serde(default = "default_up_moderate_to_congested")]
    pub up_moderate_to_congested: f64,
    /// Moderate -> Relaxed
    #[serde(default = "default_down_moderate_to_relaxed")]
    pub down_moderate_to_relaxed: f64,
    /// Congested -> Moderate
    #[serde(default = "default_down_congested_to_moderate")]
    pub down_congested_to_moderate: f64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            min_hold_secs: default_min_hold_secs(),
            up_relax_to_moderate: default_up_relax_to_moderate(),
            up_moderate_to_congested: default_up_moderate_to_congested(),
            down_moderate_to_relaxed: default_down_moderate_to_relaxed(),
            down_congested_to_moderate: default_down_congested_to_moderate(),
        }
    }
}

fn default_alpha() -> f64 {
    0.3
}

fn default_min_hold_secs() -> u64 {
    180
}

fn default_up_relax_to_moderate() -> f64 {
    0.025
}

fn default_up_moderate_to_congested() -> f64 {
    0.060
}

fn default_down_moderate_to_relaxed() -> f64 {
    0.020
}

fn default_down_congested_to_moderate() -> f64 {
    0.050
}

/// Scoring and threshold parameters for the batch classifier
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Minimum window size before percentile thresholds are trusted
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    /// Score denominator used when the window is too small
    #[serde(default = "default_fallback_denominator")]
    pub fallback_denominator: u32,
    /// Static relax threshold, also the floor for the adaptive p50
    #[serde(default = "default_relax_threshold")]
    pub default_relax: u32,
    /// Static busy threshold, also the floor for the adaptive p90
    #[serde(default = "default_busy_threshold")]
    pub default_busy: u32,
    /// Minimum separation between relax and busy thresholds
    #[serde(default = "default_min_threshold_gap")]
    pub min_threshold_gap: u32,
    /// Decimal places for the returned score
    #[serde(default = "default_score_precision")]
    pub score_precision: u32,
    /// Observations older than this are reported as no_data (minutes)
    #[serde(default = "default_freshness_mins")]
    pub freshness_mins: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            fallback_denominator: default_fallback_denominator(),
            default_relax: default_relax_threshold(),
            default_busy: default_busy_threshold(),
            min_threshold_gap: default_min_threshold_gap(),
            score_precision: default_score_precision(),
            freshness_mins: default_freshness_mins(),
        }
    }
}

fn default_min_samples() -> usize {
    12
}

fn default_fallback_denominator() -> u32 {
    20
}

fn default_relax_threshold() -> u32 {
    6
}

fn default_busy_threshold() -> u32 {
    16
}

fn default_min_threshold_gap() -> u32 {
    4
}

fn default_score_precision() -> u32 {
    2
}

fn default_freshness_mins() -> i64 {
    30
}

/// Calendar weighting parameters for the score adjuster
#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    /// Months counted as peak season
    #[serde(default = "default_peak_months")]
    pub peak_months: Vec<u32>,
    /// First hour of the peak-traffic band (inclusive)
    #[serde(default = "default_peak_hour_start")]
    pub peak_hour_start: u32,
    /// Last hour of the peak-traffic band (inclusive)
    #[serde(default = "default_peak_hour_end")]
    pub peak_hour_end: u32,
    /// Multiplier applied per matching context factor
    #[serde(default = "default_boost_factor")]
    pub boost_factor: f64,
    /// Lower clamp on the combined multiplier
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    /// Upper clamp on the combined multiplier
    #[serde(default = "default_max_weight")]
    pub max_weight: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            peak_months: default_peak_months(),
            peak_hour_start: default_peak_hour_start(),
            peak_hour_end: default_peak_hour_end(),
            boost_factor: default_boost_factor(),
            min_weight: default_min_weight(),
            max_weight: default_max_weight(),
        }
    }
}

fn default_peak_months() -> Vec<u32> {
    vec![7, 8]
}

fn default_peak_hour_start() -> u32 {
    13
}

fn default_peak_hour_end() -> u32 {
    17
}

fn default_boost_factor() -> f64 {
    1.10
}

fn default_min_weight() -> f64 {
    0.8
}

fn default_max_weight() -> f64 {
    1.2
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Bounded observation channel capacity (backpressure)
    #[serde(default = "default_ingest_capacity")]
    pub channel_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { channel_capacity: default_ingest_capacity() }
    }
}

fn default_ingest_capacity() -> usize {
    1000
}

/// Static per-beach metadata
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub name: Option<String>,
    /// Reference sand area in m2; 0 means unknown (density floor applies)
    #[serde(default)]
    pub area_m2: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub locations: HashMap<String, LocationConfig>,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    realtime: RealtimeConfig,
    batch: BatchConfig,
    weights: WeightsConfig,
    metrics_interval_secs: u64,
    ingest_channel_capacity: usize,
    locations: HashMap<String, LocationConfig>,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            realtime: RealtimeConfig::default(),
            batch: BatchConfig::default(),
            weights: WeightsConfig::default(),
            metrics_interval_secs: default_metrics_interval_secs(),
            ingest_channel_capacity: default_ingest_capacity(),
            locations: HashMap::new(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            realtime: toml_config.realtime,
            batch: toml_config.batch,
            weights: toml_config.weights,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            ingest_channel_capacity: toml_config.ingest.channel_capacity,
            locations: toml_config.locations,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Reference sand area for a beach. Unknown ids return 0.0; the
    /// realtime engine's epsilon floor keeps the density finite.
    pub fn area_m2(&self, beach_id: &str) -> f64 {
        self.locations.get(beach_id).map(|l| l.area_m2).unwrap_or(0.0)
    }

    /// Display name for a beach id
    pub fn location_name(&self, beach_id: &str) -> String {
        self.locations
            .get(beach_id)
            .and_then(|l| l.name.clone())
            .unwrap_or_else(|| beach_id.to_string())
    }

    pub fn location_ids(&self) -> impl Iterator<Item = &str> {
        self.locations.keys().map(String::as_str)
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn realtime(&self) -> &RealtimeConfig {
        &self.realtime
    }

    pub fn batch(&self) -> &BatchConfig {
        &self.batch
    }

    pub fn weights(&self) -> &WeightsConfig {
        &self.weights
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn ingest_channel_capacity(&self) -> usize {
        self.ingest_channel_capacity
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to override realtime parameters
    #[cfg(test)]
    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    /// Builder method for tests to override batch parameters
    #[cfg(test)]
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Builder method for tests to override weighting parameters
    #[cfg(test)]
    pub fn with_weights(mut self, weights: WeightsConfig) -> Self {
        self.weights = weights;
        self
    }

    /// Builder method for tests to register a location
    #[cfg(test)]
    pub fn with_location(mut self, beach_id: &str, name: Option<&str>, area_m2: f64) -> Self {
        self.locations.insert(
            beach_id.to_string(),
            LocationConfig { name: name.map(str::to_string), area_m2 },
        );
        self
    }
}
