//! Progress telemetry for ingestion sessions.
//!
//! - [`SpeedEstimator`]: EMA throughput and ETA
//! - [`ProgressTracker`]: keyed, bounded store of session snapshots
//! - [`ProgressSink`]: how pipeline stages publish updates

mod speed;
mod tracker;
mod types;

pub use speed::{format_eta, SpeedEstimator, MIN_SAMPLE_INTERVAL, SMOOTHING_FACTOR};
pub use tracker::{ProgressTracker, SessionHandle};
pub use types::*;
