//! Type definitions: measurement kinds, targets and the target set

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

pub use crate::error::{AppError, Result};

/// The two kinds of measurement netmon performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    /// ICMP round-trip latency to a fixed address
    Latency,
    /// Throughput and latency against a speed-test server
    Throughput,
}

impl MeasurementKind {
    /// All kinds, in scheduling order
    pub const ALL: [MeasurementKind; 2] = [MeasurementKind::Latency, MeasurementKind::Throughput];

    /// Short name used in logs, metric labels and URLs
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementKind::Latency => "ping",
            MeasurementKind::Throughput => "speed",
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeasurementKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ping" | "latency" => Ok(MeasurementKind::Latency),
            "speed" | "throughput" | "speedtest" => Ok(MeasurementKind::Throughput),
            _ => Err(AppError::parse(format!("Unknown measurement kind: {}", s))),
        }
    }
}

/// One endpoint a single measurement kind is performed against
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Network address (latency) or server id (throughput)
    pub id: String,
    /// Measurement kind this target belongs to
    pub kind: MeasurementKind,
}

impl Target {
    pub fn new<S: Into<String>>(kind: MeasurementKind, id: S) -> Self {
        Self { id: id.into(), kind }
    }

    pub fn latency<S: Into<String>>(address: S) -> Self {
        Self::new(MeasurementKind::Latency, address)
    }

    pub fn throughput<S: Into<String>>(server_id: S) -> Self {
        Self::new(MeasurementKind::Throughput, server_id)
    }

    /// Build targets of one kind from raw ids, trimming and dropping blanks
    pub fn parse_list<I, S>(kind: MeasurementKind, ids: I) -> Vec<Target>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ids.into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .map(|id| Target::new(kind, id))
            .collect()
    }

    /// Reject ids that are not an address (latency) or a plain server id (throughput)
    pub fn check_id(kind: MeasurementKind, id: &str) -> std::result::Result<(), String> {
        match id_problem(kind, id) {
            None => Ok(()),
            Some(problem) => Err(format!("invalid {} target '{}': {}", kind, id, problem)),
        }
    }
}

/// Why a target id was rejected
fn id_problem(kind: MeasurementKind, id: &str) -> Option<&'static str> {
    if id.is_empty() {
        return Some("empty id");
    }
    // Ids become positional arguments of the probe tools
    if id.starts_with('-') {
        return Some("must not start with '-'");
    }

    match kind {
        MeasurementKind::Latency if id.parse::<IpAddr>().is_ok() => None,
        MeasurementKind::Latency if is_hostname(id) => None,
        MeasurementKind::Latency => Some("not an IP address or host name"),
        MeasurementKind::Throughput if id.chars().all(|c| c.is_ascii_alphanumeric()) => None,
        MeasurementKind::Throughput => Some("server ids may only contain letters and digits"),
    }
}

fn is_hostname(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    !name.is_empty()
        && name.len() <= 253
        && name.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Immutable per-kind target lists, fixed at configuration time.
///
/// Order is preserved so logs and reports are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSet {
    latency: Vec<Target>,
    throughput: Vec<Target>,
}

impl TargetSet {
    /// Create a target set; every kind must have at least one target
    pub fn new<S: AsRef<str>>(addresses: &[S], server_ids: &[S]) -> Result<Self> {
        let latency = Target::parse_list(MeasurementKind::Latency, addresses);
        let throughput = Target::parse_list(MeasurementKind::Throughput, server_ids);

        if latency.is_empty() {
            return Err(AppError::config("At least one ping address is required"));
        }
        if throughput.is_empty() {
            return Err(AppError::config("At least one speed test server id is required"));
        }

        Ok(Self { latency, throughput })
    }

    /// Targets configured for the given kind
    pub fn targets(&self, kind: MeasurementKind) -> &[Target] {
        match kind {
            MeasurementKind::Latency => &self.latency,
            MeasurementKind::Throughput => &self.throughput,
        }
    }

    /// Total number of targets across kinds
    pub fn len(&self) -> usize {
        self.latency.len() + self.throughput.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
