//! On-demand invocation of a round for caller-chosen targets
//!
//! Invocations do not take the scheduler's per-kind guard: they may overlap a
//! scheduled round and each other. Each one gets its own cancellation token,
//! cancelled when the caller's deadline passes or the caller goes away.

use crate::{
    error::{AppError, Result},
    executor::RoundExecutor,
    logging::Logger,
    models::{Round, RoundView},
    probe::ProbeError,
    types::{MeasurementKind, Target},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct OnDemandInvoker {
    executor: RoundExecutor,
    shutdown: Option<CancellationToken>,
    logger: Logger,
}

impl OnDemandInvoker {
    pub fn new(executor: RoundExecutor) -> Self {
        let logger = executor.logger().named("INVOKER");
        Self {
            executor,
            shutdown: None,
            logger,
        }
    }

    /// Also cancel invocations when `shutdown` fires
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn executor(&self) -> &RoundExecutor {
        &self.executor
    }

    /// Run one round for `ids` right now.
    ///
    /// Per-target failures are part of the returned round. Errors are returned
    /// only for an empty target list or an unavailable prober; no work starts
    /// in either case.
    pub async fn invoke<S: AsRef<str>>(
        &self,
        kind: MeasurementKind,
        ids: &[S],
        deadline: Duration,
    ) -> Result<Round> {
        let targets = Target::parse_list(kind, ids);
        if targets.is_empty() {
            return Err(AppError::validation(format!("no {} targets given", kind)));
        }
        for target in &targets {
            Target::check_id(kind, &target.id).map_err(AppError::validation)?;
        }

        self.executor
            .prober()
            .check_ready(kind)
            .await
            .map_err(|e| match e {
                ProbeError::Unavailable(message) => AppError::probe(message),
                other => AppError::probe(other.to_string()),
            })?;

        let token = match &self.shutdown {
            Some(shutdown) => shutdown.child_token(),
            None => CancellationToken::new(),
        };
        // Cancels the units if this future is dropped (e.g. the client disconnected)
        let _cancel_on_drop = token.clone().drop_guard();

        self.logger
            .debug(&format!("On-demand {} round for {} target(s)", kind, targets.len()))
            .field("kind", kind)
            .field("deadline_secs", deadline.as_secs_f64())
            .log()
            .await;

        let round = self.executor.run_round(kind, &targets, &token);
        tokio::pin!(round);

        let round = tokio::select! {
            round = &mut round => round,
            _ = tokio::time::sleep(deadline) => {
                self.logger
                    .warn(&format!("On-demand {} round hit its {:.0}s deadline", kind, deadline.as_secs_f64()))
                    .field("kind", kind)
                    .log()
                    .await;
                token.cancel();
                round.await
            }
        };

        Ok(round)
    }

    /// [`invoke`](Self::invoke) returning the serializable view
    pub async fn on_demand<S: AsRef<str>>(
        &self,
        kind: MeasurementKind,
        ids: &[S],
        deadline: Duration,
    ) -> Result<RoundView> {
        self.invoke(kind, ids, deadline).await.map(|round| round.view())
    }
}
