//! netmon
//!
//! An always-on network health daemon. It runs latency (ping) and throughput
//! (speed test) rounds on fixed intervals, exports the latest values as
//! Prometheus gauges, and serves on-demand rounds over HTTP for the bundled
//! CLI client.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod invoker;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use executor::{ProbeTimeouts, RoundExecutor};
pub use invoker::OnDemandInvoker;
pub use lifecycle::{LifecycleCoordinator, ShutdownOutcome};
pub use models::{Config, MeasurementResult, Outcome, Round, RoundView};
pub use probe::{DispatchProber, ProbeError, ProbeOutput, Prober};
pub use report::{CompositeReporter, GaugeReporter, LogReporter, Reporter};
pub use scheduler::{PeriodicScheduler, ScheduleIntervals, SchedulerHandle};
pub use types::{MeasurementKind, Target, TargetSet};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_PING_ADDRESSES: &[&str] = &["1.1.1.1", "8.8.8.8"];
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);
    pub const DEFAULT_PING_COUNT: u32 = 3;
    pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(20);
    pub const DEFAULT_SPEED_INTERVAL: Duration = Duration::from_secs(3600);
    pub const DEFAULT_SPEED_TIMEOUT: Duration = Duration::from_secs(300);
    pub const DEFAULT_HTTP_PORT: u16 = 8092;
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(59);
    pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
    pub const DEFAULT_SERVER_URL: &str = "http://localhost:8092";
    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
