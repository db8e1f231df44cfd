//! Throughput prober backed by `speedtest-cli --json`

use super::{run_tool, stderr_summary, ProbeError, ProbeOutput, Prober};
use crate::models::{Measurement, ThroughputStats};
use crate::types::{MeasurementKind, Target};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs one download/upload test against a speed-test server id
#[derive(Debug, Clone)]
pub struct SpeedtestCliProber {
    binary: String,
}

impl Default for SpeedtestCliProber {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeedtestCliProber {
    pub fn new() -> Self {
        Self::with_binary("speedtest-cli")
    }

    pub fn with_binary<S: Into<String>>(binary: S) -> Self {
        Self { binary: binary.into() }
    }
}

#[derive(Debug, Deserialize)]
struct SpeedtestReport {
    /// Bits per second
    download: f64,
    /// Bits per second
    upload: f64,
    /// Milliseconds
    ping: f64,
    #[serde(default)]
    server: SpeedtestServer,
}

#[derive(Debug, Default, Deserialize)]
struct SpeedtestServer {
    #[serde(default)]
    sponsor: String,
}

/// Parse `speedtest-cli --json` output into stats and the sponsor name
pub fn parse_speedtest_report(json: &str) -> Result<(ThroughputStats, String), ProbeError> {
    let report: SpeedtestReport = serde_json::from_str(json.trim())
        .map_err(|e| ProbeError::Failed(format!("unexpected speedtest output: {}", e)))?;

    if !(report.ping.is_finite() && report.ping >= 0.0) {
        return Err(ProbeError::Failed(format!("invalid speedtest latency: {}", report.ping)));
    }

    let stats = ThroughputStats {
        latency: Duration::from_secs_f64(report.ping / 1000.0),
        download_mbps: report.download / 1_000_000.0,
        upload_mbps: report.upload / 1_000_000.0,
    };

    Ok((stats, report.server.sponsor))
}

#[async_trait]
impl Prober for SpeedtestCliProber {
    async fn probe(
        &self,
        target: &Target,
        _timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<ProbeOutput, ProbeError> {
        let output = run_tool(&self.binary, &["--json", "--server", &target.id], &cancel).await?;

        if !output.status.success() {
            let detail = stderr_summary(&output)
                .unwrap_or_else(|| format!("speedtest exited with {}", output.status));
            return Err(ProbeError::Failed(detail));
        }

        let (stats, sponsor) = parse_speedtest_report(&String::from_utf8_lossy(&output.stdout))?;
        let label = if sponsor.is_empty() {
            target.id.clone()
        } else {
            format!("{} - {}", target.id, sponsor)
        };

        Ok(ProbeOutput::new(Measurement::Throughput(stats)).with_label(label))
    }

    async fn check_ready(&self, _kind: MeasurementKind) -> Result<(), ProbeError> {
        let output = run_tool(&self.binary, &["--version"], &CancellationToken::new()).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(ProbeError::Unavailable(format!("{} --version exited with {}", self.binary, output.status)))
        }
    }
}
