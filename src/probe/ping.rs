//! Latency prober backed by the system `ping` binary

use super::{run_tool, stderr_summary, ProbeError, ProbeOutput, Prober};
use crate::models::{LatencyStats, Measurement};
use crate::types::{MeasurementKind, Target};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sends `count` echo requests per target via `ping -c`
#[derive(Debug, Clone)]
pub struct SystemPingProber {
    count: u32,
    binary: String,
}

impl SystemPingProber {
    pub fn new(count: u32) -> Self {
        Self::with_binary(count, "ping")
    }

    pub fn with_binary<S: Into<String>>(count: u32, binary: S) -> Self {
        Self {
            count: count.max(1),
            binary: binary.into(),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// `--` keeps the address from being read as an option
    fn args(&self, address: &str) -> Vec<String> {
        vec!["-c".to_string(), self.count.to_string(), "--".to_string(), address.to_string()]
    }
}

#[async_trait]
impl Prober for SystemPingProber {
    async fn probe(
        &self,
        target: &Target,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeOutput, ProbeError> {
        let args = self.args(&target.id);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = run_tool(&self.binary, &args, &cancel).await?;

        // ping exits non-zero on partial loss, so the summary decides
        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_ping_summary(&stdout) {
            Some(stats) => Ok(ProbeOutput::new(Measurement::Latency(stats)).with_label(target.id.clone())),
            None if !output.status.success() && stdout.trim().is_empty() => {
                let detail = stderr_summary(&output).unwrap_or_else(|| format!("no replies from {}", target.id));
                Err(ProbeError::Failed(detail))
            }
            None => Err(ProbeError::Failed(format!("no replies from {}", target.id))),
        }
    }

    /// The binary must start; busybox and BSD ping reject `-V`, so its exit status is ignored
    async fn check_ready(&self, _kind: MeasurementKind) -> Result<(), ProbeError> {
        run_tool(&self.binary, &["-V"], &CancellationToken::new()).await.map(|_| ())
    }
}

fn summary_regex() -> Option<&'static Regex> {
    static SUMMARY: OnceLock<Option<Regex>> = OnceLock::new();
    SUMMARY
        .get_or_init(|| {
            Regex::new(r"min/avg/max(?:/(?:mdev|stddev))? = ([\d.]+)/([\d.]+)/([\d.]+)(?:/([\d.]+))? ms").ok()
        })
        .as_ref()
}

/// Parse the `rtt min/avg/max/mdev = …` line of ping output.
///
/// Busybox prints no deviation; it is reported as zero.
pub fn parse_ping_summary(output: &str) -> Option<LatencyStats> {
    let caps = summary_regex()?.captures(output)?;
    let millis = |i: usize| -> Option<Duration> {
        let value: f64 = caps.get(i)?.as_str().parse().ok()?;
        if value.is_finite() && value >= 0.0 {
            Some(Duration::from_secs_f64(value / 1000.0))
        } else {
            None
        }
    };

    Some(LatencyStats {
        min_rtt: millis(1)?,
        avg_rtt: millis(2)?,
        max_rtt: millis(3)?,
        stddev_rtt: millis(4).unwrap_or(Duration::ZERO),
    })
}
