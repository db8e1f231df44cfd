//! In-memory gauge registry exported in Prometheus text format
//!
//! Families are registered once when the reporter is constructed. The reporter
//! is then shared by reference instead of living in a global.

use super::Reporter;
use crate::error::Result;
use crate::models::{Measurement, MeasurementResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write;

pub const PING_MIN_RTT: &str = "netmon_ping_min_rtt_seconds";
pub const PING_AVG_RTT: &str = "netmon_ping_avg_rtt_seconds";
pub const PING_MAX_RTT: &str = "netmon_ping_max_rtt_seconds";
pub const PING_STDDEV_RTT: &str = "netmon_ping_stddev_rtt_seconds";
pub const SPEEDTEST_LATENCY: &str = "netmon_speedtest_latency_seconds";
pub const SPEEDTEST_SPEED: &str = "netmon_speedtest_speed_mbps";
pub const LAST_PROBE_TIMESTAMP: &str = "netmon_last_probe_timestamp_seconds";
pub const PROBE_FAILURES: &str = "netmon_probe_failures_total";

/// Content type of [`GaugeReporter::render_prometheus`]
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Counter => "counter",
        }
    }
}

type Labels = Vec<(&'static str, String)>;

#[derive(Debug)]
struct Family {
    help: &'static str,
    metric_type: MetricType,
    series: BTreeMap<Labels, f64>,
}

/// Gauges and failure counters for every probed target
#[derive(Debug)]
pub struct GaugeReporter {
    families: RwLock<BTreeMap<&'static str, Family>>,
}

impl Default for GaugeReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GaugeReporter {
    pub fn new() -> Self {
        let definitions = [
            (PING_MIN_RTT, "Minimum ping round-trip time", MetricType::Gauge),
            (PING_AVG_RTT, "Average ping round-trip time", MetricType::Gauge),
            (PING_MAX_RTT, "Maximum ping round-trip time", MetricType::Gauge),
            (PING_STDDEV_RTT, "Standard deviation of ping round-trip time", MetricType::Gauge),
            (SPEEDTEST_LATENCY, "Speed test server latency", MetricType::Gauge),
            (SPEEDTEST_SPEED, "Speed test rate in Mbit/s by direction", MetricType::Gauge),
            (LAST_PROBE_TIMESTAMP, "Unix time of the last completed probe", MetricType::Gauge),
            (PROBE_FAILURES, "Failed probes by reason", MetricType::Counter),
        ];

        let families = definitions
            .into_iter()
            .map(|(name, help, metric_type)| {
                (name, Family { help, metric_type, series: BTreeMap::new() })
            })
            .collect();

        Self { families: RwLock::new(families) }
    }

    fn set(&self, name: &'static str, labels: Labels, value: f64) {
        if let Some(family) = self.families.write().get_mut(name) {
            family.series.insert(labels, value);
        }
    }

    fn increment(&self, name: &'static str, labels: Labels) {
        if let Some(family) = self.families.write().get_mut(name) {
            *family.series.entry(labels).or_insert(0.0) += 1.0;
        }
    }

    /// Current value of one series
    pub fn value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let families = self.families.read();
        let family = families.get(name)?;
        family
            .series
            .iter()
            .find(|(series, _)| {
                series.len() == labels.len()
                    && series.iter().zip(labels).all(|((k, v), (lk, lv))| k == lk && v == lv)
            })
            .map(|(_, value)| *value)
    }

    /// Number of series recorded under a family
    pub fn series_count(&self, name: &str) -> usize {
        self.families.read().get(name).map_or(0, |f| f.series.len())
    }

    fn record(&self, result: &MeasurementResult) {
        let kind = result.target.kind;
        let id = result.target.id.clone();

        match (&result.measurement, result.outcome.failure_reason()) {
            (_, Some(reason)) => {
                self.increment(
                    PROBE_FAILURES,
                    vec![
                        ("kind", kind.as_str().to_string()),
                        ("target", id.clone()),
                        ("reason", reason.label().to_string()),
                    ],
                );
            }
            (Some(Measurement::Latency(stats)), None) => {
                let labels = vec![("address", id.clone())];
                self.set(PING_MIN_RTT, labels.clone(), stats.min_rtt.as_secs_f64());
                self.set(PING_AVG_RTT, labels.clone(), stats.avg_rtt.as_secs_f64());
                self.set(PING_MAX_RTT, labels.clone(), stats.max_rtt.as_secs_f64());
                self.set(PING_STDDEV_RTT, labels, stats.stddev_rtt.as_secs_f64());
            }
            (Some(Measurement::Throughput(stats)), None) => {
                let server = result.label.clone();
                self.set(SPEEDTEST_LATENCY, vec![("server", server.clone())], stats.latency.as_secs_f64());
                self.set(
                    SPEEDTEST_SPEED,
                    vec![("direction", "dl".to_string()), ("server", server.clone())],
                    stats.download_mbps,
                );
                self.set(
                    SPEEDTEST_SPEED,
                    vec![("direction", "ul".to_string()), ("server", server)],
                    stats.upload_mbps,
                );
            }
            (None, None) => {}
        }

        self.set(
            LAST_PROBE_TIMESTAMP,
            vec![("kind", kind.as_str().to_string()), ("target", id)],
            result.completed_at.timestamp_millis() as f64 / 1000.0,
        );
    }

    /// Export all families in Prometheus text format
    pub fn render_prometheus(&self) -> String {
        let families = self.families.read();
        let mut output = String::new();

        for (name, family) in families.iter() {
            let _ = writeln!(output, "# HELP {} {}", name, family.help);
            let _ = writeln!(output, "# TYPE {} {}", name, family.metric_type.as_str());

            for (labels, value) in &family.series {
                if labels.is_empty() {
                    let _ = writeln!(output, "{} {}", name, value);
                } else {
                    let rendered: Vec<String> = labels
                        .iter()
                        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
                        .collect();
                    let _ = writeln!(output, "{}{{{}}} {}", name, rendered.join(","), value);
                }
            }
        }

        output
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[async_trait]
impl Reporter for GaugeReporter {
    async fn report(&self, result: &MeasurementResult) -> Result<()> {
        self.record(result);
        Ok(())
    }
}
