//! Data models and structures for netmon

pub mod config;
pub mod measurement;

// Re-export main model types
pub use config::Config;
pub use measurement::{
    FailureReason, LatencyStats, LatencyView, Measurement, MeasurementResult, Outcome,
    ResultView, Round, RoundView, ThroughputStats, ThroughputView,
};
