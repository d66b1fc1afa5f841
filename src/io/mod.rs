//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `ingest` - JSONL observation reader (the collector seam)

pub mod ingest;

// Re-export commonly used types
pub use ingest::run_stdin_ingest;
