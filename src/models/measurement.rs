//! Measurement results, rounds and their serializable views

use crate::types::{MeasurementKind, Target};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Round-trip time statistics from one latency probe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_rtt: Duration,
    pub avg_rtt: Duration,
    pub max_rtt: Duration,
    pub stddev_rtt: Duration,
}

impl LatencyStats {
    /// Stats where every field equals the single observed value
    pub fn uniform(rtt: Duration) -> Self {
        Self {
            min_rtt: rtt,
            avg_rtt: rtt,
            max_rtt: rtt,
            stddev_rtt: Duration::ZERO,
        }
    }
}

/// Numbers from one throughput test
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputStats {
    pub latency: Duration,
    /// Download rate in Mbit/s
    pub download_mbps: f64,
    /// Upload rate in Mbit/s
    pub upload_mbps: f64,
}

/// Kind-specific measurement data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Measurement {
    Latency(LatencyStats),
    Throughput(ThroughputStats),
}

impl Measurement {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            Measurement::Latency(_) => MeasurementKind::Latency,
            Measurement::Throughput(_) => MeasurementKind::Throughput,
        }
    }
}

/// Why a target produced no measurement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "message", rename_all = "lowercase")]
pub enum FailureReason {
    /// The per-target timeout elapsed
    Timeout,
    /// The round was cancelled (shutdown or caller deadline)
    Cancelled,
    /// The probe itself failed
    Error(String),
}

impl FailureReason {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "timeout",
            FailureReason::Cancelled => "cancelled",
            FailureReason::Error(_) => "error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::Cancelled => f.write_str("cancelled"),
            FailureReason::Error(message) => f.write_str(message),
        }
    }
}

/// Outcome of one target's unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure(FailureReason),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(reason) => Some(reason),
        }
    }
}

/// One target's result within a round. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementResult {
    pub target: Target,
    /// Human-readable label, e.g. "5188 - Sponsor" for speed servers
    pub label: String,
    pub measurement: Option<Measurement>,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl MeasurementResult {
    pub fn success(
        target: Target,
        label: String,
        measurement: Measurement,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target,
            label,
            measurement: Some(measurement),
            outcome: Outcome::Success,
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn failure(target: Target, reason: FailureReason, started_at: DateTime<Utc>) -> Self {
        Self {
            label: target.id.clone(),
            target,
            measurement: None,
            outcome: Outcome::Failure(reason),
            started_at,
            completed_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn latency_stats(&self) -> Option<&LatencyStats> {
        match &self.measurement {
            Some(Measurement::Latency(stats)) => Some(stats),
            _ => None,
        }
    }

    pub fn throughput_stats(&self) -> Option<&ThroughputStats> {
        match &self.measurement {
            Some(Measurement::Throughput(stats)) => Some(stats),
            _ => None,
        }
    }

    /// Wall-clock time spent on this target
    pub fn elapsed(&self) -> Duration {
        (self.completed_at - self.started_at).to_std().unwrap_or_default()
    }
}

/// The complete set of results from one execution of the round executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Correlation id shared by every log line of this round
    pub id: Uuid,
    pub kind: MeasurementKind,
    /// One result per target, in target order
    pub results: Vec<MeasurementResult>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl Round {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn cancelled_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.failure_reason() == Some(&FailureReason::Cancelled))
            .count()
    }

    /// Look up the result for a target id
    pub fn result_for(&self, target_id: &str) -> Option<&MeasurementResult> {
        self.results.iter().find(|r| r.target.id == target_id)
    }

    /// Success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.len() as f64 * 100.0
        }
    }

    pub fn view(&self) -> RoundView {
        RoundView::from(self)
    }
}

/// Response payload for an on-demand invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub results: Vec<ResultView>,
}

impl RoundView {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.error().is_none()).count()
    }
}

impl From<&Round> for RoundView {
    fn from(round: &Round) -> Self {
        Self {
            results: round.results.iter().map(ResultView::from).collect(),
        }
    }
}

/// Per-target entry of a [`RoundView`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultView {
    Latency(LatencyView),
    Throughput(ThroughputView),
}

impl ResultView {
    pub fn error(&self) -> Option<&str> {
        match self {
            ResultView::Latency(view) => view.error.as_deref(),
            ResultView::Throughput(view) => view.error.as_deref(),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ResultView::Latency(view) => &view.address,
            ResultView::Throughput(view) => &view.server_id,
        }
    }
}

/// Latency entry; durations in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyView {
    pub address: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stddev_rtt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Throughput entry; latency in seconds, rates in Mbit/s
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThroughputView {
    pub server_id: String,
    pub server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ul: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&MeasurementResult> for ResultView {
    fn from(result: &MeasurementResult) -> Self {
        let error = result.outcome.failure_reason().map(|r| r.to_string());

        match result.target.kind {
            MeasurementKind::Latency => {
                let stats = result.latency_stats();
                ResultView::Latency(LatencyView {
                    address: result.target.id.clone(),
                    label: result.label.clone(),
                    min_rtt: stats.map(|s| s.min_rtt.as_secs_f64()),
                    avg_rtt: stats.map(|s| s.avg_rtt.as_secs_f64()),
                    max_rtt: stats.map(|s| s.max_rtt.as_secs_f64()),
                    stddev_rtt: stats.map(|s| s.stddev_rtt.as_secs_f64()),
                    error,
                })
            }
            MeasurementKind::Throughput => {
                let stats = result.throughput_stats();
                ResultView::Throughput(ThroughputView {
                    server_id: result.target.id.clone(),
                    server: result.label.clone(),
                    latency: stats.map(|s| s.latency.as_secs_f64()),
                    dl: stats.map(|s| s.download_mbps),
                    ul: stats.map(|s| s.upload_mbps),
                    error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latency_result(address: &str, avg_ms: u64) -> MeasurementResult {
        MeasurementResult::success(
            Target::latency(address),
            address.to_string(),
            Measurement::Latency(LatencyStats::uniform(Duration::from_millis(avg_ms))),
            Utc::now(),
        )
    }

    fn round(results: Vec<MeasurementResult>) -> Round {
        Round {
            id: Uuid::new_v4(),
            kind: MeasurementKind::Latency,
            results,
            started_at: Utc::now(),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::Timeout.to_string(), "timeout");
        assert_eq!(FailureReason::Cancelled.to_string(), "cancelled");
        assert_eq!(FailureReason::Error("no route".into()).to_string(), "no route");
        assert_eq!(FailureReason::Error("x".into()).label(), "error");
    }

    #[test]
    fn test_round_counts() {
        let r = round(vec![
            latency_result("10.0.0.1", 12),
            MeasurementResult::failure(Target::latency("10.0.0.2"), FailureReason::Timeout, Utc::now()),
            MeasurementResult::failure(Target::latency("10.0.0.3"), FailureReason::Cancelled, Utc::now()),
        ]);
        assert_eq!(r.len(), 3);
        assert_eq!(r.success_count(), 1);
        assert_eq!(r.failure_count(), 2);
        assert_eq!(r.cancelled_count(), 1);
        assert!((r.success_rate() - 33.333).abs() < 0.01);
        assert!(r.result_for("10.0.0.2").is_some());
        assert!(r.result_for("10.0.0.9").is_none());
    }

    #[test]
    fn test_failure_label_defaults_to_target_id() {
        let result = MeasurementResult::failure(Target::throughput("5188"), FailureReason::Timeout, Utc::now());
        assert_eq!(result.label, "5188");
        assert!(result.measurement.is_none());
    }

    #[test]
    fn test_latency_view_json() {
        let r = round(vec![
            latency_result("10.0.0.1", 12),
            MeasurementResult::failure(Target::latency("10.0.0.2"), FailureReason::Timeout, Utc::now()),
        ]);
        let json = serde_json::to_value(r.view()).unwrap();
        let results = json["results"].as_array().unwrap();

        assert_eq!(results[0]["address"], "10.0.0.1");
        assert!((results[0]["avg_rtt"].as_f64().unwrap() - 0.012).abs() < 1e-9);
        assert!(results[0].get("error").is_none());

        assert_eq!(results[1]["address"], "10.0.0.2");
        assert_eq!(results[1]["error"], "timeout");
        assert!(results[1].get("avg_rtt").is_none());
    }

    #[test]
    fn test_throughput_view_json_shape() {
        let result = MeasurementResult::success(
            Target::throughput("5188"),
            "5188 - Example ISP".to_string(),
            Measurement::Throughput(ThroughputStats {
                latency: Duration::from_millis(8),
                download_mbps: 250.5,
                upload_mbps: 40.0,
            }),
            Utc::now(),
        );
        let view = ResultView::from(&result);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["server_id"], "5188");
        assert_eq!(json["server"], "5188 - Example ISP");
        assert_eq!(json["dl"], 250.5);
        assert_eq!(json["ul"], 40.0);
    }

    #[test]
    fn test_view_decodes_both_shapes() {
        let body = r#"{"results":[
            {"address":"1.1.1.1","label":"1.1.1.1","avg_rtt":0.01},
            {"server_id":"5188","server":"5188 - X","error":"timeout"}
        ]}"#;
        let view: RoundView = serde_json::from_str(body).unwrap();
        assert!(matches!(view.results[0], ResultView::Latency(_)));
        assert!(matches!(view.results[1], ResultView::Throughput(_)));
        assert_eq!(view.results[1].error(), Some("timeout"));
        assert_eq!(view.results[1].id(), "5188");
        assert_eq!(view.success_count(), 1);
    }
}
