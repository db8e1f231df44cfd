//! Reporter capability: records measurement results into a sink
//!
//! Reporters are shared by every concurrent round and on-demand invocation,
//! so implementations must be safe for concurrent use.

pub mod gauge;

use crate::error::Result;
use crate::logging::Logger;
use crate::models::{Measurement, MeasurementResult};
use async_trait::async_trait;
use std::sync::Arc;

pub use gauge::GaugeReporter;

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report(&self, result: &MeasurementResult) -> Result<()>;
}

/// Calls every reporter in order; returns the first error
pub struct CompositeReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl CompositeReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

#[async_trait]
impl Reporter for CompositeReporter {
    async fn report(&self, result: &MeasurementResult) -> Result<()> {
        let mut first_error = None;
        for reporter in &self.reporters {
            if let Err(e) = reporter.report(result).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Writes one line per successful result
pub struct LogReporter {
    logger: Logger,
}

impl LogReporter {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    fn describe(result: &MeasurementResult) -> Option<String> {
        match result.measurement.as_ref()? {
            Measurement::Latency(stats) => Some(format!(
                "ping for {}: {:.3}ms",
                result.label,
                stats.avg_rtt.as_secs_f64() * 1000.0
            )),
            Measurement::Throughput(stats) => Some(format!(
                "speedtest for {}: latency {:.3}ms, download {:.2} Mbit/s, upload {:.2} Mbit/s",
                result.label,
                stats.latency.as_secs_f64() * 1000.0,
                stats.download_mbps,
                stats.upload_mbps
            )),
        }
    }
}

#[async_trait]
impl Reporter for LogReporter {
    async fn report(&self, result: &MeasurementResult) -> Result<()> {
        // Failures are already logged by the round executor
        if let Some(line) = Self::describe(result) {
            self.logger.info(&line).result(result).log().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{FailureReason, LatencyStats};
    use crate::types::Target;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting {
        calls: AtomicUsize,
        fail_with: Option<&'static str>,
    }

    impl Counting {
        fn new(fail_with: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail_with })
        }
    }

    #[async_trait]
    impl Reporter for Counting {
        async fn report(&self, _result: &MeasurementResult) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(message) => Err(AppError::report(message)),
                None => Ok(()),
            }
        }
    }

    fn sample() -> MeasurementResult {
        MeasurementResult::success(
            Target::latency("1.1.1.1"),
            "1.1.1.1".to_string(),
            Measurement::Latency(LatencyStats::uniform(Duration::from_millis(12))),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_composite_calls_all_and_returns_first_error() {
        let first = Counting::new(Some("sink one down"));
        let second = Counting::new(Some("sink two down"));
        let third = Counting::new(None);
        let composite = CompositeReporter::new(vec![
            first.clone() as Arc<dyn Reporter>,
            second.clone() as Arc<dyn Reporter>,
            third.clone() as Arc<dyn Reporter>,
        ]);

        let err = composite.report(&sample()).await.unwrap_err();
        assert!(err.to_string().contains("sink one down"));
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 1);
        assert_eq!(third.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_composite_is_ok() {
        let composite = CompositeReporter::new(Vec::new());
        assert!(composite.is_empty());
        assert!(composite.report(&sample()).await.is_ok());
    }

    #[test]
    fn test_log_reporter_lines() {
        let line = LogReporter::describe(&sample()).unwrap();
        assert_eq!(line, "ping for 1.1.1.1: 12.000ms");

        let failed = MeasurementResult::failure(Target::latency("10.0.0.2"), FailureReason::Timeout, Utc::now());
        assert!(LogReporter::describe(&failed).is_none());
    }
}
