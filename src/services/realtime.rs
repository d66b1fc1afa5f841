//! Realtime congestion engine - EMA smoothing with hysteresis
//!
//! Folds live per-observation density readings into an exponentially
//! weighted state per beach and flips the three-level grade only after
//! sustained evidence. Transitions move one band at a time and honor a
//! minimum dwell since the last switch, so the published level never
//! flaps on sensor noise.

use crate::domain::types::{BeachSnapshot, CongestionLevel, UpdateResult};
use crate::infra::config::{Config, RealtimeConfig};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Floor on the effective area so density stays finite when a beach's
/// reference area is unknown or zero.
const AREA_EPSILON: f64 = 1e-6;

/// Per-beach mutable state; guarded by its own mutex in the registry
#[derive(Debug)]
struct BeachState {
    ema_density: f64,
    level: CongestionLevel,
    last_switch: DateTime<Utc>,
}

impl BeachState {
    fn new() -> Self {
        Self {
            ema_density: 0.0,
            level: CongestionLevel::Relaxed,
            last_switch: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn snapshot(&self) -> BeachSnapshot {
        BeachSnapshot {
            level: self.level,
            ema_density: self.ema_density,
            last_switch: self.last_switch,
        }
    }
}

/// Per-beach smoothed congestion state registry
///
/// The outer RwLock guards only map membership; each state carries its
/// own mutex, so updates to different beaches never contend and the
/// write lock is held only for first-seen insertion. Created once at
/// service start and injected into whatever drives it.
pub struct RealtimeEngine {
    params: RealtimeConfig,
    states: RwLock<FxHashMap<String, Arc<Mutex<BeachState>>>>,
}

impl RealtimeEngine {
    pub fn new(config: &Config) -> Self {
        Self { params: config.realtime().clone(), states: RwLock::new(FxHashMap::default()) }
    }

    /// Look up a beach's state handle, inserting a default on first access
    fn state_handle(&self, beach_id: &str) -> Arc<Mutex<BeachState>> {
        if let Some(state) = self.states.read().get(beach_id) {
            return state.clone();
        }
        let mut states = self.states.write();
        states
            .entry(beach_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(BeachState::new())))
            .clone()
    }

    /// Fold one observation into the beach's smoothed state
    ///
    /// `roi_ratio` absent or <= 0 means the full reference area was
    /// sensed. A zero or unknown `area_m2` falls onto the epsilon floor
    /// rather than producing an infinite density.
    pub fn update(
        &self,
        beach_id: &str,
        person_count: u32,
        roi_ratio: Option<f64>,
        area_m2: f64,
        now: DateTime<Utc>,
    ) -> UpdateResult {
        let p = &self.params;
        let roi = match roi_ratio {
            Some(r) if r > 0.0 => r,
            _ => 1.0,
        };
        let effective_area = (area_m2 * roi).max(AREA_EPSILON);
        let density = person_count as f64 / effective_area;

        let handle = self.state_handle(beach_id);
        let mut st = handle.lock();

        st.ema_density = p.alpha * density + (1.0 - p.alpha) * st.ema_density;

        let mut transition = None;
        let dwell_elapsed = now.signed_duration_since(st.last_switch)
            >= Duration::seconds(p.min_hold_secs as i64);
        if dwell_elapsed {
            let x = st.ema_density;
            // One band per transition; Relaxed and Congested never meet directly
            let next = match st.level {
                CongestionLevel::Relaxed if x >= p.up_relax_to_moderate => {
                    Some(CongestionLevel::Moderate)
                }
                CongestionLevel::Moderate if x >= p.up_moderate_to_congested => {
                    Some(CongestionLevel::Congested)
                }
                CongestionLevel::Moderate if x <= p.down_moderate_to_relaxed => {
                    Some(CongestionLevel::Relaxed)
                }
                CongestionLevel::Congested if x <= p.down_congested_to_moderate => {
                    Some(CongestionLevel::Moderate)
                }
                _ => None,
            };
            if let Some(to) = next {
                let from = st.level;
                st.level = to;
                st.last_switch = now;
                transition = Some((from, to));
                info!(
                    beach_id = %beach_id,
                    from = %from,
                    to = %to,
                    ema_density = format!("{:.5}", x),
                    "level_transition"
                );
            }
        }

        debug!(
            beach_id = %beach_id,
            person_count = %person_count,
            density = format!("{:.5}", density),
            ema_density = format!("{:.5}", st.ema_density),
            level = %st.level,
            "observation_folded"
        );

        UpdateResult { snapshot: st.snapshot(), density, effective_area, transition }
    }

    /// Current state for a beach, creating a default (Relaxed, ema 0)
    /// on first access. Never fails.
    pub fn get(&self, beach_id: &str) -> BeachSnapshot {
        self.state_handle(beach_id).lock().snapshot()
    }

    /// Number of beaches seen so far
    pub fn tracked_beaches(&self) -> usize {
        self.states.read().len()
    }
}
