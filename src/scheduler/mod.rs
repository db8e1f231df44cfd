//! Periodic scheduling of measurement rounds
//!
//! Each kind runs its own loop: one round immediately at start, then one round
//! `interval` after the previous round finished. A per-kind running flag makes
//! overlapping rounds of the same kind impossible; ticks are never queued.

use crate::{
    executor::RoundExecutor,
    logging::Logger,
    models::Config,
    types::{MeasurementKind, TargetSet},
};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// Time between the end of one round and the start of the next, per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleIntervals {
    pub latency: Duration,
    pub throughput: Duration,
}

impl ScheduleIntervals {
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

impl From<&Config> for ScheduleIntervals {
    fn from(config: &Config) -> Self {
        Self::new(config.ping_interval(), config.speed_interval())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    Running,
}

#[derive(Debug, Default)]
struct KindState {
    running: AtomicBool,
    rounds_started: AtomicU64,
    rounds_completed: AtomicU64,
    ticks_skipped: AtomicU64,
}

/// Per-kind scheduling state, shared between the loops and observers
#[derive(Debug)]
pub struct ScheduleState {
    intervals: ScheduleIntervals,
    latency: KindState,
    throughput: KindState,
}

/// Holds a kind in `Running`; dropping it returns the kind to `Idle`
#[derive(Debug)]
pub struct RunningGuard<'a> {
    kind: &'a KindState,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.kind.rounds_completed.fetch_add(1, Ordering::SeqCst);
        self.kind.running.store(false, Ordering::SeqCst);
    }
}

impl ScheduleState {
    pub fn new(intervals: ScheduleIntervals) -> Self {
        Self {
            intervals,
            latency: KindState::default(),
            throughput: KindState::default(),
        }
    }

    fn kind(&self, kind: MeasurementKind) -> &KindState {
        match kind {
            MeasurementKind::Latency => &self.latency,
            MeasurementKind::Throughput => &self.throughput,
        }
    }

    pub fn interval(&self, kind: MeasurementKind) -> Duration {
        self.intervals.for_kind(kind)
    }

    /// Move `kind` from `Idle` to `Running`; `None` if a round is already running
    pub fn try_begin(&self, kind: MeasurementKind) -> Option<RunningGuard<'_>> {
        let state = self.kind(kind);
        match state.running.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(_) => {
                state.rounds_started.fetch_add(1, Ordering::SeqCst);
                Some(RunningGuard { kind: state })
            }
            Err(_) => {
                state.ticks_skipped.fetch_add(1, Ordering::SeqCst);
                None
            }
        }
    }

    pub fn state(&self, kind: MeasurementKind) -> RoundState {
        if self.kind(kind).running.load(Ordering::SeqCst) {
            RoundState::Running
        } else {
            RoundState::Idle
        }
    }

    pub fn is_running(&self, kind: MeasurementKind) -> bool {
        self.state(kind) == RoundState::Running
    }

    pub fn rounds_started(&self, kind: MeasurementKind) -> u64 {
        self.kind(kind).rounds_started.load(Ordering::SeqCst)
    }

    pub fn rounds_completed(&self, kind: MeasurementKind) -> u64 {
        self.kind(kind).rounds_completed.load(Ordering::SeqCst)
    }

    pub fn ticks_skipped(&self, kind: MeasurementKind) -> u64 {
        self.kind(kind).ticks_skipped.load(Ordering::SeqCst)
    }
}

/// Drives the round executor on a fixed interval for every kind
pub struct PeriodicScheduler {
    executor: RoundExecutor,
    targets: Arc<TargetSet>,
    intervals: ScheduleIntervals,
    logger: Logger,
}

impl PeriodicScheduler {
    pub fn new(executor: RoundExecutor, targets: Arc<TargetSet>, intervals: ScheduleIntervals) -> Self {
        let logger = executor.logger().named("SCHEDULER");
        Self {
            executor,
            targets,
            intervals,
            logger,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    /// Spawn one loop per kind. Loops end when `shutdown` (or the handle) is cancelled.
    pub fn start(self, shutdown: &CancellationToken) -> SchedulerHandle {
        let token = shutdown.child_token();
        let state = Arc::new(ScheduleState::new(self.intervals));

        let tasks = MeasurementKind::ALL
            .iter()
            .map(|&kind| {
                let run = KindLoop {
                    kind,
                    executor: self.executor.clone(),
                    targets: self.targets.clone(),
                    state: state.clone(),
                    token: token.clone(),
                    logger: self.logger.clone(),
                };
                tokio::spawn(run.run())
            })
            .collect();

        SchedulerHandle {
            token,
            state,
            tasks,
            logger: self.logger,
        }
    }
}

struct KindLoop {
    kind: MeasurementKind,
    executor: RoundExecutor,
    targets: Arc<TargetSet>,
    state: Arc<ScheduleState>,
    token: CancellationToken,
    logger: Logger,
}

impl KindLoop {
    async fn run(self) {
        let interval = self.state.interval(self.kind);
        self.logger
            .info(&format!("Scheduling {} rounds every {}s", self.kind, interval.as_secs()))
            .field("kind", self.kind)
            .field("targets", self.targets.targets(self.kind).len())
            .log()
            .await;

        while !self.token.is_cancelled() {
            match self.state.try_begin(self.kind) {
                Some(_running) => {
                    self.executor
                        .run_round(self.kind, self.targets.targets(self.kind), &self.token)
                        .await;
                }
                None => {
                    self.logger
                        .debug(&format!("Skipping {} tick, previous round still running", self.kind))
                        .field("kind", self.kind)
                        .log()
                        .await;
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.logger
            .debug(&format!("{} schedule stopped", self.kind))
            .field("kind", self.kind)
            .field("rounds_completed", self.state.rounds_completed(self.kind))
            .log()
            .await;
    }
}

/// Running scheduler; stopping cancels in-flight rounds
pub struct SchedulerHandle {
    token: CancellationToken,
    state: Arc<ScheduleState>,
    tasks: Vec<JoinHandle<()>>,
    logger: Logger,
}

impl SchedulerHandle {
    pub fn state(&self) -> &Arc<ScheduleState> {
        &self.state
    }

    /// Token passed to scheduled rounds
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop timers and cancel any running round, then wait for both loops
    pub async fn stop(self) {
        self.token.cancel();
        let exits = join_all(self.tasks).await;
        log_loop_exits(&self.logger, exits).await;
    }

    /// Like [`stop`](Self::stop) but gives up after `grace`.
    ///
    /// Returns `false` if the loops were still running and had to be aborted.
    pub async fn stop_within(self, grace: Duration) -> bool {
        self.token.cancel();
        let aborts: Vec<AbortHandle> = self.tasks.iter().map(|t| t.abort_handle()).collect();

        match tokio::time::timeout(grace, join_all(self.tasks)).await {
            Ok(exits) => {
                log_loop_exits(&self.logger, exits).await;
                true
            }
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                false
            }
        }
    }
}

/// Log kind loops that ended by panicking; returns how many did
async fn log_loop_exits(logger: &Logger, exits: Vec<std::result::Result<(), JoinError>>) -> usize {
    let mut panicked = 0;
    for exit in exits {
        if let Err(e) = exit {
            if e.is_panic() {
                panicked += 1;
                logger
                    .error("Schedule loop panicked")
                    .field("error", e.to_string())
                    .log()
                    .await;
            }
        }
    }
    panicked
}
