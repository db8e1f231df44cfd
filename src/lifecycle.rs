//! Process lifecycle: start the scheduler, wait for termination, drain

use crate::{
    logging::Logger,
    scheduler::{PeriodicScheduler, SchedulerHandle},
};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a coordinated run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// In-flight rounds finished within the grace period
    Drained,
    /// Grace period elapsed; remaining work was abandoned
    GraceElapsed,
}

pub struct LifecycleCoordinator {
    shutdown: CancellationToken,
    grace: Duration,
    logger: Logger,
}

impl LifecycleCoordinator {
    pub fn new(grace: Duration, logger: Logger) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            grace,
            logger,
        }
    }

    /// Root token; cancelled once termination has been requested
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Start `scheduler`, block until `termination` resolves, then stop it
    pub async fn run<F>(&self, scheduler: PeriodicScheduler, termination: F) -> ShutdownOutcome
    where
        F: Future<Output = ()>,
    {
        let handle = scheduler.start(&self.shutdown);
        self.logger.info("Scheduler started").log().await;

        tokio::select! {
            _ = termination => {
                self.logger.info("Termination requested, shutting down").log().await;
            }
            _ = self.shutdown.cancelled() => {
                self.logger.info("Shutdown token cancelled, shutting down").log().await;
            }
        }

        self.drain(handle).await
    }

    async fn drain(&self, handle: SchedulerHandle) -> ShutdownOutcome {
        self.shutdown.cancel();

        if handle.stop_within(self.grace).await {
            self.logger.info("Scheduler stopped").log().await;
            ShutdownOutcome::Drained
        } else {
            self.logger
                .warn(&format!(
                    "Scheduler did not stop within {}s, exiting anyway",
                    self.grace.as_secs()
                ))
                .field("grace_secs", self.grace.as_secs())
                .log()
                .await;
            ShutdownOutcome::GraceElapsed
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
