//! Stub probers and reporters shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use netmon::{
    logging::Logger,
    models::{FailureReason, LatencyStats, Measurement, MeasurementResult, ThroughputStats},
    probe::{ProbeError, ProbeOutput, Prober},
    report::Reporter,
    MeasurementKind, ProbeTimeouts, RoundExecutor, Target,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Behaviour is chosen by target id:
/// - `10.0.0.1` and numeric server ids succeed
/// - `10.0.0.2` reports a timeout
/// - `down` fails with an error
/// - `hang` waits until cancelled
/// - `slow` succeeds after `slow_delay`
/// - anything else succeeds immediately
pub struct StubProber {
    pub slow_delay: Duration,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    /// (start, end) of every `slow` probe
    pub slow_spans: Mutex<Vec<(Instant, Instant)>>,
}

impl StubProber {
    pub fn new(slow_delay: Duration) -> Self {
        Self {
            slow_delay,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            slow_spans: Mutex::new(Vec::new()),
        }
    }

    fn success(target: &Target) -> ProbeOutput {
        match target.kind {
            MeasurementKind::Latency => {
                ProbeOutput::new(Measurement::Latency(LatencyStats::uniform(Duration::from_millis(12))))
            }
            MeasurementKind::Throughput => ProbeOutput::new(Measurement::Throughput(ThroughputStats {
                latency: Duration::from_millis(8),
                download_mbps: 250.0,
                upload_mbps: 40.0,
            }))
            .with_label(format!("{} - Stub ISP", target.id)),
        }
    }

    async fn run(&self, target: &Target, cancel: &CancellationToken) -> Result<ProbeOutput, ProbeError> {
        match target.id.as_str() {
            "10.0.0.2" => Err(ProbeError::Timeout),
            "down" => Err(ProbeError::Failed("host unreachable".to_string())),
            "hang" => {
                cancel.cancelled().await;
                Err(ProbeError::Cancelled)
            }
            "slow" => {
                let start = Instant::now();
                tokio::select! {
                    _ = cancel.cancelled() => Err(ProbeError::Cancelled),
                    _ = tokio::time::sleep(self.slow_delay) => {
                        self.slow_spans.lock().push((start, Instant::now()));
                        Ok(Self::success(target))
                    }
                }
            }
            _ => Ok(Self::success(target)),
        }
    }
}

#[async_trait]
impl Prober for StubProber {
    async fn probe(
        &self,
        target: &Target,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeOutput, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if target.kind == MeasurementKind::Latency {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        }

        let result = self.run(target, &cancel).await;

        if target.kind == MeasurementKind::Latency {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}

/// Keeps every reported result
#[derive(Default)]
pub struct RecordingReporter {
    pub results: Mutex<Vec<MeasurementResult>>,
}

impl RecordingReporter {
    pub fn reasons_for(&self, id: &str) -> Vec<Option<FailureReason>> {
        self.results
            .lock()
            .iter()
            .filter(|r| r.target.id == id)
            .map(|r| r.outcome.failure_reason().cloned())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.results.lock().len()
    }
}

#[async_trait]
impl Reporter for RecordingReporter {
    async fn report(&self, result: &MeasurementResult) -> netmon::Result<()> {
        self.results.lock().push(result.clone());
        Ok(())
    }
}

pub fn executor(prober: Arc<StubProber>, reporter: Arc<dyn Reporter>, timeout: Duration) -> RoundExecutor {
    RoundExecutor::new(prober, reporter, ProbeTimeouts::new(timeout, timeout))
        .with_logger(Logger::quiet("EXECUTOR"))
}
