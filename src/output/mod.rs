//! Terminal rendering of on-demand round results
//!
//! Tables are colored by latency level when color is enabled and fall back
//! to plain text otherwise.

use crate::models::{LatencyView, ResultView, RoundView, ThroughputView};
use colored::{Color, ColoredString, Colorize};
use std::fmt::Write as _;

/// Latency bands used for coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    Excellent,  // < 20ms
    Good,       // 20-50ms
    Fair,       // 50-150ms
    Poor,       // 150-500ms
    VeryPoor,   // > 500ms
}

impl PerformanceLevel {
    pub fn from_latency_ms(time_ms: f64) -> Self {
        if time_ms < 20.0 {
            Self::Excellent
        } else if time_ms < 50.0 {
            Self::Good
        } else if time_ms < 150.0 {
            Self::Fair
        } else if time_ms < 500.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }
}

pub struct RoundFormatter {
    enable_color: bool,
}

impl RoundFormatter {
    pub fn new(enable_color: bool) -> Self {
        Self { enable_color }
    }

    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Seconds rendered as a short human-readable duration
    fn format_seconds(seconds: f64) -> String {
        let ms = seconds * 1000.0;
        if ms < 1.0 {
            format!("{:.0}µs", ms * 1000.0)
        } else if ms < 1000.0 {
            format!("{:.1}ms", ms)
        } else {
            format!("{:.2}s", seconds)
        }
    }

    fn latency_cell(&self, seconds: Option<f64>, width: usize) -> String {
        match seconds {
            Some(s) => {
                let text = format!("{:>width$}", Self::format_seconds(s), width = width);
                let level = PerformanceLevel::from_latency_ms(s * 1000.0);
                self.colorize(&text, level.color()).to_string()
            }
            None => format!("{:>width$}", "-", width = width),
        }
    }

    fn status_cell(&self, error: Option<&str>) -> String {
        match error {
            None => self.colorize("ok", Color::Green).to_string(),
            Some(reason) => self.colorize(reason, Color::Red).to_string(),
        }
    }

    fn latency_row(&self, view: &LatencyView) -> String {
        format!(
            "{:<24} {} {} {} {} {}",
            truncate(&view.label, 24),
            self.latency_cell(view.min_rtt, 10),
            self.latency_cell(view.avg_rtt, 10),
            self.latency_cell(view.max_rtt, 10),
            self.latency_cell(view.stddev_rtt, 10),
            self.status_cell(view.error.as_deref()),
        )
    }

    fn throughput_row(&self, view: &ThroughputView) -> String {
        let rate = |value: Option<f64>| match value {
            Some(mbps) => format!("{:>12}", format!("{:.2} Mbit/s", mbps)),
            None => format!("{:>12}", "-"),
        };
        format!(
            "{:<36} {} {} {} {}",
            truncate(&view.server, 36),
            self.latency_cell(view.latency, 10),
            rate(view.dl),
            rate(view.ul),
            self.status_cell(view.error.as_deref()),
        )
    }

    /// Render a whole round as a table with a summary line
    pub fn format_round(&self, view: &RoundView) -> String {
        let mut output = String::new();
        if view.results.is_empty() {
            return self.colorize("No results.", Color::BrightBlack).to_string();
        }

        let header = match &view.results[0] {
            ResultView::Latency(_) => format!(
                "{:<24} {:>10} {:>10} {:>10} {:>10} {}",
                "Address", "Min", "Avg", "Max", "StdDev", "Status"
            ),
            ResultView::Throughput(_) => format!(
                "{:<36} {:>10} {:>12} {:>12} {}",
                "Server", "Latency", "Download", "Upload", "Status"
            ),
        };
        let rule = "─".repeat(header.chars().count());

        let _ = writeln!(output, "{}", self.bold(&header));
        let _ = writeln!(output, "{}", self.colorize(&rule, Color::BrightBlack));
        for result in &view.results {
            let row = match result {
                ResultView::Latency(v) => self.latency_row(v),
                ResultView::Throughput(v) => self.throughput_row(v),
            };
            let _ = writeln!(output, "{}", row);
        }
        let _ = writeln!(output, "{}", self.colorize(&rule, Color::BrightBlack));

        let succeeded = view.success_count();
        let total = view.results.len();
        let summary = format!("{}/{} targets succeeded", succeeded, total);
        let color = if succeeded == total { Color::Green } else if succeeded == 0 { Color::Red } else { Color::Yellow };
        let _ = write!(output, "{}", self.colorize(&summary, color));

        output
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view() -> RoundView {
        RoundView {
            results: vec![
                ResultView::Latency(LatencyView {
                    address: "10.0.0.1".to_string(),
                    label: "10.0.0.1".to_string(),
                    min_rtt: Some(0.011),
                    avg_rtt: Some(0.012),
                    max_rtt: Some(0.013),
                    stddev_rtt: Some(0.0005),
                    error: None,
                }),
                ResultView::Latency(LatencyView {
                    address: "10.0.0.2".to_string(),
                    label: "10.0.0.2".to_string(),
                    min_rtt: None,
                    avg_rtt: None,
                    max_rtt: None,
                    stddev_rtt: None,
                    error: Some("timeout".to_string()),
                }),
            ],
        }
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_latency_ms(5.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_latency_ms(35.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency_ms(900.0), PerformanceLevel::VeryPoor);
        assert_eq!(PerformanceLevel::VeryPoor.description(), "Very Poor");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(RoundFormatter::format_seconds(0.012), "12.0ms");
        assert_eq!(RoundFormatter::format_seconds(0.0005), "500µs");
        assert_eq!(RoundFormatter::format_seconds(2.5), "2.50s");
    }

    #[test]
    fn test_plain_latency_table() {
        let text = RoundFormatter::new(false).format_round(&view());
        assert!(text.starts_with("Address"));
        assert!(text.contains("10.0.0.1"));
        assert!(text.contains("12.0ms"));
        assert!(text.contains("timeout"));
        assert!(text.ends_with("1/2 targets succeeded"));
    }

    #[test]
    fn test_plain_throughput_table() {
        let view = RoundView {
            results: vec![ResultView::Throughput(ThroughputView {
                server_id: "5188".to_string(),
                server: "5188 - Example ISP".to_string(),
                latency: Some(0.008),
                dl: Some(250.5),
                ul: Some(40.0),
                error: None,
            })],
        };
        let text = RoundFormatter::new(false).format_round(&view);
        assert!(text.contains("5188 - Example ISP"));
        assert!(text.contains("250.50 Mbit/s"));
        assert!(text.ends_with("1/1 targets succeeded"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-label", 8), "a-ver...");
    }
}
