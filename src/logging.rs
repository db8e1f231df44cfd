//! Structured logging for netmon
//!
//! This module provides:
//! - Structured logging with levels, named components and extra fields
//! - Round correlation IDs so every line of one round can be grouped
//! - Console, compact and JSON line formats for log aggregators

use crate::error::{AppError, Result};
use crate::models::{Config, MeasurementResult, Measurement, Round};
use crate::types::MeasurementKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level - most detailed
    Trace = 0,
    /// Debug level - detailed information for debugging
    Debug = 1,
    /// Info level - general application information
    Info = 2,
    /// Warning level - potentially harmful situations
    Warn = 3,
    /// Error level - error events but application can continue
    Error = 4,
    /// Fatal level - severe error events that cause application termination
    Fatal = 5,
}

impl LogLevel {
    /// Get log level name as string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Get ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    /// Reset ANSI color code
    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// Log entry structure for structured logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    /// Correlation ID for tracking related events
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for structured logging
    Json,
    /// Compact single-line format
    Compact,
}

/// Shared logging context for session tracking
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
}

/// Logger implementation with multiple output formats.
///
/// Clones share the same context, so a session id set once is visible to all.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    /// Create a new logger
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Create a logger with specific configuration
    pub fn with_config(name: String, config: &Config) -> Self {
        let configured = config.log_level.parse().unwrap_or(LogLevel::Info);
        let min_level = if config.debug {
            configured.min(LogLevel::Debug)
        } else if config.verbose {
            configured.min(LogLevel::Info)
        } else {
            configured
        };

        Self {
            min_level,
            use_color: config.enable_color && !config.log_json,
            format: if config.log_json { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// A logger that only emits fatal entries, for tests and embedding
    pub fn quiet(name: &str) -> Self {
        let mut logger = Self::new(name.to_string());
        logger.set_level(LogLevel::Fatal);
        logger
    }

    /// Same sink and context under a different component name
    pub fn named(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Set minimum log level
    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    /// Set output format
    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    /// Enable or disable colored output
    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    /// Set session correlation ID
    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Create a log entry builder
    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    /// Check if a log level would be output
    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if entry.level < self.min_level {
            return;
        }

        if let Some(session_id) = &self.context.read().await.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }

        let output = self.render(&entry);

        // Warnings and above go to stderr
        if entry.level >= LogLevel::Warn {
            let _ = writeln!(io::stderr(), "{}", output);
        } else {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}",
            timestamp,
            formatted_level,
            entry.logger,
            entry.message
        );

        if let Some(correlation_id) = &entry.correlation_id {
            let short = correlation_id.get(..8).unwrap_or(correlation_id);
            output.push_str(&format!(" [{}]", short));
        }

        if !entry.fields.is_empty() {
            // Sorted so the same entry always renders the same way
            let mut fields: Vec<(&String, &serde_json::Value)> = entry.fields.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            let fields_str: Vec<String> = fields.iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            output.push_str(&format!(" {{{}}}", fields_str.join(", ")));
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!("{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}", entry.message),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!("{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder pattern for creating log entries
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
            },
        }
    }

    /// Add a correlation ID
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    /// Add a structured field
    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    /// Add the fields describing one measurement result
    pub fn result(self, result: &MeasurementResult) -> Self {
        let builder = self
            .field("kind", result.target.kind)
            .field("target", &result.target.id)
            .field("label", &result.label)
            .field("success", result.is_success())
            .field("elapsed_ms", result.elapsed().as_millis() as u64);

        let builder = match result.outcome.failure_reason() {
            Some(reason) => builder.field("reason", reason.to_string()),
            None => builder,
        };

        match &result.measurement {
            Some(Measurement::Latency(stats)) => builder
                .field("avg_rtt_ms", stats.avg_rtt.as_secs_f64() * 1000.0)
                .field("max_rtt_ms", stats.max_rtt.as_secs_f64() * 1000.0),
            Some(Measurement::Throughput(stats)) => builder
                .field("latency_ms", stats.latency.as_secs_f64() * 1000.0)
                .field("dl_mbps", stats.download_mbps)
                .field("ul_mbps", stats.upload_mbps),
            None => builder,
        }
    }

    /// Add error information
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error", error.to_string())
            .field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    /// Render without writing
    pub fn render(&self) -> String {
        self.logger.render(&self.entry)
    }

    /// Finalize and write the log entry
    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Logger for round lifecycle events
#[derive(Debug, Clone)]
pub struct RoundLogger {
    logger: Logger,
}

impl RoundLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Allocate a correlation id and log the start of a round
    pub async fn round_started(&self, kind: MeasurementKind, target_count: usize) -> Uuid {
        let round_id = Uuid::new_v4();
        self.logger.debug(&format!("Starting {} round for {} target(s)", kind, target_count))
            .correlation_id(&round_id.to_string())
            .field("kind", kind)
            .field("targets", target_count)
            .log()
            .await;
        round_id
    }

    /// Log one produced result; failures at warn level
    pub async fn result(&self, round_id: &Uuid, result: &MeasurementResult) {
        let level = if result.is_success() { LogLevel::Debug } else { LogLevel::Warn };
        let message = match result.outcome.failure_reason() {
            None => format!("{} {} succeeded", result.target.kind, result.target.id),
            Some(reason) => format!("{} {} failed: {}", result.target.kind, result.target.id, reason),
        };

        self.logger.log(level, &message)
            .correlation_id(&round_id.to_string())
            .result(result)
            .log()
            .await;
    }

    /// Log the summary of a finished round
    pub async fn round_completed(&self, round: &Round) {
        self.logger.info(&format!(
            "Completed {} round: {}/{} succeeded in {:.3}s",
            round.kind,
            round.success_count(),
            round.len(),
            round.duration.as_secs_f64()
        ))
            .correlation_id(&round.id.to_string())
            .field("kind", round.kind)
            .field("targets", round.len())
            .field("succeeded", round.success_count())
            .field("failed", round.failure_count())
            .field("cancelled", round.cancelled_count())
            .field("duration_ms", round.duration.as_millis() as u64)
            .log()
            .await;
    }

    /// Log a reporter failure; the round outcome is unaffected
    pub async fn report_failed(&self, round_id: &Uuid, result: &MeasurementResult, error: &AppError) {
        self.logger.warn(&format!("Failed to report {} result for {}", result.target.kind, result.target.id))
            .correlation_id(&round_id.to_string())
            .field("kind", result.target.kind)
            .field("target", &result.target.id)
            .error_info(error)
            .log()
            .await;
    }
}

/// Creates component loggers sharing one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create a logger with a specific name
    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    /// Create a round logger for a component
    pub async fn create_round_logger(&self, name: &str) -> RoundLogger {
        RoundLogger::new(self.create_logger(name).await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}
