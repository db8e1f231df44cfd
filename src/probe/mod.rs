//! Probe capability: performs one measurement against one target
//!
//! The orchestrator only sees the [`Prober`] trait. The shipped probers delegate
//! the wire protocols to system tools (`ping`, `speedtest-cli`).

pub mod ping;
pub mod speedtest;

use crate::models::{FailureReason, Measurement};
use crate::types::{MeasurementKind, Target};
use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub use ping::SystemPingProber;
pub use speedtest::SpeedtestCliProber;

/// Errors a single probe can end with
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),

    /// The probe tool itself is missing or broken
    #[error("probe unavailable: {0}")]
    Unavailable(String),
}

impl From<ProbeError> for FailureReason {
    fn from(error: ProbeError) -> Self {
        match error {
            ProbeError::Timeout => FailureReason::Timeout,
            ProbeError::Cancelled => FailureReason::Cancelled,
            ProbeError::Failed(message) => FailureReason::Error(message),
            ProbeError::Unavailable(message) => FailureReason::Error(format!("probe unavailable: {}", message)),
        }
    }
}

/// Data returned by a successful probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutput {
    /// Human-readable label; the target id is used when absent
    pub label: Option<String>,
    pub measurement: Measurement,
}

impl ProbeOutput {
    pub fn new(measurement: Measurement) -> Self {
        Self { label: None, measurement }
    }

    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// External measurement capability.
///
/// Implementations must return promptly once `cancel` fires and must not retry.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(
        &self,
        target: &Target,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeOutput, ProbeError>;

    /// Cheap readiness check run before on-demand work starts
    async fn check_ready(&self, _kind: MeasurementKind) -> Result<(), ProbeError> {
        Ok(())
    }
}

/// Routes each target to the prober for its kind
pub struct DispatchProber {
    latency: Arc<dyn Prober>,
    throughput: Arc<dyn Prober>,
}

impl DispatchProber {
    pub fn new(latency: Arc<dyn Prober>, throughput: Arc<dyn Prober>) -> Self {
        Self { latency, throughput }
    }

    /// `ping` for latency and `speedtest-cli` for throughput
    pub fn system(ping_count: u32) -> Self {
        Self::new(
            Arc::new(SystemPingProber::new(ping_count)),
            Arc::new(SpeedtestCliProber::new()),
        )
    }

    fn route(&self, kind: MeasurementKind) -> &Arc<dyn Prober> {
        match kind {
            MeasurementKind::Latency => &self.latency,
            MeasurementKind::Throughput => &self.throughput,
        }
    }
}

#[async_trait]
impl Prober for DispatchProber {
    async fn probe(
        &self,
        target: &Target,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeOutput, ProbeError> {
        self.route(target.kind).probe(target, timeout, cancel).await
    }

    async fn check_ready(&self, kind: MeasurementKind) -> Result<(), ProbeError> {
        self.route(kind).check_ready(kind).await
    }
}

/// Run an external tool to completion, killing it if `cancel` fires first
pub(crate) async fn run_tool(
    binary: &str,
    args: &[&str],
    cancel: &CancellationToken,
) -> Result<Output, ProbeError> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .env("LC_ALL", "C")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| ProbeError::Unavailable(format!("failed to spawn {}: {}", binary, e)))?;

    tokio::select! {
        _ = cancel.cancelled() => Err(ProbeError::Cancelled),
        output = child.wait_with_output() => {
            output.map_err(|e| ProbeError::Failed(format!("failed to wait for {}: {}", binary, e)))
        }
    }
}

/// Last non-empty stderr line, for error messages
pub(crate) fn stderr_summary(output: &Output) -> Option<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LatencyStats;

    struct FixedProber(Result<ProbeOutput, ProbeError>);

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(
            &self,
            _target: &Target,
            _timeout: Duration,
            _cancel: CancellationToken,
        ) -> Result<ProbeOutput, ProbeError> {
            self.0.clone()
        }

        async fn check_ready(&self, _kind: MeasurementKind) -> Result<(), ProbeError> {
            match &self.0 {
                Err(ProbeError::Unavailable(m)) => Err(ProbeError::Unavailable(m.clone())),
                _ => Ok(()),
            }
        }
    }

    #[test]
    fn test_probe_error_to_failure_reason() {
        assert_eq!(FailureReason::from(ProbeError::Timeout), FailureReason::Timeout);
        assert_eq!(FailureReason::from(ProbeError::Cancelled), FailureReason::Cancelled);
        assert_eq!(
            FailureReason::from(ProbeError::Failed("no replies from 10.0.0.2".into())),
            FailureReason::Error("no replies from 10.0.0.2".into())
        );
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_kind() {
        let latency = ProbeOutput::new(Measurement::Latency(LatencyStats::uniform(Duration::from_millis(3))));
        let dispatch = DispatchProber::new(
            Arc::new(FixedProber(Ok(latency.clone()))),
            Arc::new(FixedProber(Err(ProbeError::Unavailable("speedtest-cli missing".into())))),
        );
        let cancel = CancellationToken::new();

        let out = dispatch.probe(&Target::latency("1.1.1.1"), Duration::from_secs(1), cancel.clone()).await;
        assert_eq!(out, Ok(latency));

        let out = dispatch.probe(&Target::throughput("5188"), Duration::from_secs(1), cancel).await;
        assert!(matches!(out, Err(ProbeError::Unavailable(_))));

        assert!(dispatch.check_ready(MeasurementKind::Latency).await.is_ok());
        assert!(dispatch.check_ready(MeasurementKind::Throughput).await.is_err());
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary_is_unavailable() {
        let cancel = CancellationToken::new();
        let err = run_tool("netmon-no-such-binary", &[], &cancel).await.unwrap_err();
        assert!(matches!(err, ProbeError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_observes_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run_tool("sleep", &["30"], &cancel).await.unwrap_err();
        assert_eq!(err, ProbeError::Cancelled);
    }
}
