//! Services - classification engines and score weighting
//!
//! This module contains the core congestion logic:
//! - `realtime` - EMA smoothing + hysteresis per-beach state engine
//! - `batch` - percentile-based classifier over historical windows
//! - `weights` - calendar-context score adjuster

pub mod batch;
pub mod realtime;
pub mod weights;

// Re-export commonly used types
pub use batch::BatchClassifier;
pub use realtime::RealtimeEngine;
pub use weights::{WeightAdjuster, WeightContext};
