//! Round execution engine
//!
//! This module runs one measurement round for one kind:
//! - one task per target in a `JoinSet`, each bounded by a per-kind timeout
//! - a shared cancellation token observed by every task
//! - a full join before the round is returned; dropping the round aborts its tasks
//! - each result reported as soon as its task finishes

use crate::{
    error::AppError,
    logging::{Logger, RoundLogger},
    models::{Config, FailureReason, MeasurementResult, Round},
    probe::{ProbeError, Prober},
    report::Reporter,
    types::{MeasurementKind, Target},
};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Per-kind bound on a single probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub latency: Duration,
    pub throughput: Duration,
}

impl ProbeTimeouts {
    pub fn new(latency: Duration, throughput: Duration) -> Self {
        Self { latency, throughput }
    }

    pub fn for_kind(&self, kind: MeasurementKind) -> Duration {
        match kind {
            MeasurementKind::Latency => self.latency,
            MeasurementKind::Throughput => self.throughput,
        }
    }
}

impl From<&Config> for ProbeTimeouts {
    fn from(config: &Config) -> Self {
        Self::new(config.ping_timeout(), config.speed_timeout())
    }
}

/// Runs rounds against a prober and hands every result to a reporter.
///
/// Holds no mutable state, so one executor may run any number of rounds at once.
#[derive(Clone)]
pub struct RoundExecutor {
    prober: Arc<dyn Prober>,
    reporter: Arc<dyn Reporter>,
    timeouts: ProbeTimeouts,
    log: RoundLogger,
}

impl RoundExecutor {
    pub fn new(prober: Arc<dyn Prober>, reporter: Arc<dyn Reporter>, timeouts: ProbeTimeouts) -> Self {
        Self {
            prober,
            reporter,
            timeouts,
            log: RoundLogger::new(Logger::new("EXECUTOR".to_string())),
        }
    }

    pub fn with_logger(self, logger: Logger) -> Self {
        self.with_round_logger(RoundLogger::new(logger))
    }

    pub fn with_round_logger(mut self, log: RoundLogger) -> Self {
        self.log = log;
        self
    }

    pub fn timeouts(&self) -> ProbeTimeouts {
        self.timeouts
    }

    pub fn prober(&self) -> &Arc<dyn Prober> {
        &self.prober
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    pub fn logger(&self) -> &Logger {
        self.log.logger()
    }

    /// Run one round; returns once every target's task has finished
    pub async fn run_round(
        &self,
        kind: MeasurementKind,
        targets: &[Target],
        cancel: &CancellationToken,
    ) -> Round {
        let started_at = Utc::now();
        let clock = Instant::now();
        let round_id = self.log.round_started(kind, targets.len()).await;
        let timeout = self.timeouts.for_kind(kind);

        let mut units = JoinSet::new();
        for (index, target) in targets.iter().cloned().enumerate() {
            let executor = self.clone();
            let cancel = cancel.clone();
            units.spawn(async move { (index, executor.run_unit(round_id, target, timeout, cancel).await) });
        }

        let mut slots: Vec<Option<MeasurementResult>> = vec![None; targets.len()];
        let mut panicked = false;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => panicked |= e.is_panic(),
            }
        }

        let mut results = Vec::with_capacity(targets.len());
        for (slot, target) in slots.into_iter().zip(targets) {
            let result = match slot {
                Some(result) => result,
                None => {
                    let message = if panicked { "probe task panicked" } else { "probe task aborted" };
                    let result = MeasurementResult::failure(
                        target.clone(),
                        FailureReason::Error(message.to_string()),
                        started_at,
                    );
                    self.publish(&round_id, &result).await;
                    result
                }
            };
            results.push(result);
        }

        let round = Round {
            id: round_id,
            kind,
            results,
            started_at,
            duration: clock.elapsed(),
        };
        self.log.round_completed(&round).await;
        round
    }

    async fn run_unit(
        &self,
        round_id: Uuid,
        target: Target,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> MeasurementResult {
        let started_at = Utc::now();
        let result = self.measure(&target, timeout, &cancel, started_at).await;
        self.publish(&round_id, &result).await;
        result
    }

    async fn measure(
        &self,
        target: &Target,
        timeout: Duration,
        cancel: &CancellationToken,
        started_at: DateTime<Utc>,
    ) -> MeasurementResult {
        if cancel.is_cancelled() {
            return MeasurementResult::failure(target.clone(), FailureReason::Cancelled, started_at);
        }

        let probe = AssertUnwindSafe(self.prober.probe(target, timeout, cancel.clone())).catch_unwind();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProbeError::Cancelled),
            finished = tokio::time::timeout(timeout, probe) => match finished {
                Err(_) => Err(ProbeError::Timeout),
                Ok(Err(_)) => Err(ProbeError::Failed("probe task panicked".to_string())),
                Ok(Ok(outcome)) => outcome,
            },
        };

        match outcome {
            Ok(output) => {
                let label = output.label.unwrap_or_else(|| target.id.clone());
                MeasurementResult::success(target.clone(), label, output.measurement, started_at)
            }
            Err(e) => MeasurementResult::failure(target.clone(), e.into(), started_at),
        }
    }

    /// Log and report one result; reporter failures never reach the round
    async fn publish(&self, round_id: &Uuid, result: &MeasurementResult) {
        self.log.result(round_id, result).await;

        match AssertUnwindSafe(self.reporter.report(result)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.log.report_failed(round_id, result, &e).await,
            Err(_) => {
                self.log
                    .report_failed(round_id, result, &AppError::report("reporter panicked"))
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::{LatencyStats, Measurement};
    use crate::probe::ProbeOutput;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProber;

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(
            &self,
            target: &Target,
            _timeout: Duration,
            cancel: CancellationToken,
        ) -> std::result::Result<ProbeOutput, ProbeError> {
            match target.id.as_str() {
                "ok" => Ok(ProbeOutput::new(Measurement::Latency(LatencyStats::uniform(
                    Duration::from_millis(12),
                )))),
                "fail" => Err(ProbeError::Failed("unreachable".to_string())),
                "panic" => panic!("prober bug"),
                _ => {
                    // Never finishes on its own
                    cancel.cancelled().await;
                    Err(ProbeError::Cancelled)
                }
            }
        }
    }

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Reporter for Recording {
        async fn report(&self, result: &MeasurementResult) -> Result<()> {
            self.seen.lock().push(result.target.id.clone());
            if self.fail {
                Err(AppError::report("sink down"))
            } else {
                Ok(())
            }
        }
    }

    /// Never returns; counts entries and dropped futures
    #[derive(Default)]
    struct StuckReporter {
        entered: AtomicUsize,
        dropped: Arc<AtomicUsize>,
    }

    struct CountOnDrop(Arc<AtomicUsize>);

    impl Drop for CountOnDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Reporter for StuckReporter {
        async fn report(&self, _result: &MeasurementResult) -> Result<()> {
            let _guard = CountOnDrop(self.dropped.clone());
            self.entered.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn executor(reporter: Arc<Recording>) -> RoundExecutor {
        RoundExecutor::new(
            Arc::new(ScriptedProber),
            reporter,
            ProbeTimeouts::new(Duration::from_secs(5), Duration::from_secs(60)),
        )
        .with_logger(Logger::quiet("EXECUTOR"))
    }

    fn targets(ids: &[&str]) -> Vec<Target> {
        ids.iter().map(|id| Target::latency(*id)).collect()
    }

    #[test]
    fn test_timeouts_for_kind() {
        let config = Config::default();
        let timeouts = ProbeTimeouts::from(&config);
        assert_eq!(timeouts.for_kind(MeasurementKind::Latency), Duration::from_secs(20));
        assert_eq!(timeouts.for_kind(MeasurementKind::Throughput), Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_results_follow_target_order() {
        let reporter = Arc::new(Recording::default());
        let round = executor(reporter.clone())
            .run_round(MeasurementKind::Latency, &targets(&["fail", "ok"]), &CancellationToken::new())
            .await;

        let ids: Vec<&str> = round.results.iter().map(|r| r.target.id.as_str()).collect();
        assert_eq!(ids, vec!["fail", "ok"]);
        assert_eq!(
            round.results[0].outcome.failure_reason(),
            Some(&FailureReason::Error("unreachable".to_string()))
        );
        assert!(round.results[1].is_success());
        assert_eq!(round.results[1].label, "ok");
        assert_eq!(reporter.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_panicking_probe_is_isolated() {
        let reporter = Arc::new(Recording::default());
        let round = executor(reporter.clone())
            .run_round(MeasurementKind::Latency, &targets(&["panic", "ok"]), &CancellationToken::new())
            .await;

        assert_eq!(round.len(), 2);
        assert_eq!(
            round.results[0].outcome.failure_reason(),
            Some(&FailureReason::Error("probe task panicked".to_string()))
        );
        assert!(round.results[1].is_success());
        assert_eq!(reporter.seen.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_reporter_errors_do_not_change_outcomes() {
        let reporter = Arc::new(Recording { fail: true, ..Recording::default() });
        let round = executor(reporter.clone())
            .run_round(MeasurementKind::Latency, &targets(&["ok", "ok"]), &CancellationToken::new())
            .await;

        assert_eq!(round.success_count(), 2);
        assert_eq!(reporter.seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_times_out() {
        let reporter = Arc::new(Recording::default());
        let round = executor(reporter)
            .run_round(MeasurementKind::Latency, &targets(&["hang", "ok"]), &CancellationToken::new())
            .await;

        assert_eq!(round.results[0].outcome.failure_reason(), Some(&FailureReason::Timeout));
        assert!(round.results[1].is_success());
        assert!(round.duration >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_pre_cancelled_round_marks_everything_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let round = executor(Arc::new(Recording::default()))
            .run_round(MeasurementKind::Latency, &targets(&["ok", "hang"]), &cancel)
            .await;

        assert_eq!(round.cancelled_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_target_list_gives_empty_round() {
        let round = executor(Arc::new(Recording::default()))
            .run_round(MeasurementKind::Throughput, &[], &CancellationToken::new())
            .await;
        assert!(round.is_empty());
        assert_eq!(round.kind, MeasurementKind::Throughput);
    }

    #[tokio::test]
    async fn test_dropping_a_round_aborts_its_units() {
        let reporter = Arc::new(StuckReporter::default());
        let exec = RoundExecutor::new(
            Arc::new(ScriptedProber),
            reporter.clone(),
            ProbeTimeouts::new(Duration::from_secs(5), Duration::from_secs(60)),
        )
        .with_logger(Logger::quiet("EXECUTOR"));

        let round = tokio::spawn(async move {
            exec.run_round(MeasurementKind::Latency, &targets(&["ok", "ok"]), &CancellationToken::new())
                .await
        });

        while reporter.entered.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        round.abort();
        assert!(round.await.unwrap_err().is_cancelled());

        for _ in 0..100 {
            if reporter.dropped.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(reporter.dropped.load(Ordering::SeqCst), 2);
    }
}
