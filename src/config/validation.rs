//! Soft configuration checks that produce warnings instead of errors

use crate::{error::Result, models::Config};
use colored::Colorize;
use std::collections::HashSet;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run hard validation, then collect advisory warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_schedule(config));
        warnings.extend(Self::validate_targets(config));
        warnings.extend(Self::validate_request_timeout(config));

        Ok(warnings)
    }

    fn validate_schedule(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.ping_timeout_secs > config.ping_interval_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Ping timeout ({}s) is longer than the ping interval ({}s); slow rounds will delay the next one",
                    config.ping_timeout_secs, config.ping_interval_secs
                ),
            ));
        }

        if config.speed_timeout_secs > config.speed_interval_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Speed test timeout ({}s) is longer than the speed test interval ({}s); slow rounds will delay the next one",
                    config.speed_timeout_secs, config.speed_interval_secs
                ),
            ));
        }

        if config.speed_interval_secs < 600 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Speed tests every {}s will consume significant bandwidth",
                    config.speed_interval_secs
                ),
            ));
        }

        warnings
    }

    fn validate_targets(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for duplicate in duplicates(&config.ping_addresses) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Ping address '{}' is listed more than once", duplicate),
            ));
        }

        for duplicate in duplicates(&config.speed_server_ids) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Speed test server '{}' is listed more than once", duplicate),
            ));
        }

        for id in &config.speed_server_ids {
            if !id.chars().all(|c| c.is_ascii_digit()) {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("Speed test server id '{}' is not numeric", id),
                ));
            }
        }

        warnings
    }

    fn validate_request_timeout(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.request_timeout_secs < config.ping_timeout_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Request timeout ({}s) is shorter than the ping timeout ({}s); on-demand pings may be cancelled",
                    config.request_timeout_secs, config.ping_timeout_secs
                ),
            ));
        }

        if config.request_timeout_secs < config.speed_timeout_secs {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Request timeout ({}s) is shorter than the speed test timeout ({}s); on-demand speed tests may be cancelled",
                    config.request_timeout_secs, config.speed_timeout_secs
                ),
            ));
        }

        warnings
    }
}

fn duplicates(values: &[String]) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    values
        .iter()
        .map(String::as_str)
        .filter(|value| !seen.insert(*value) && reported.insert(*value))
        .collect()
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Get color for terminal display
    pub fn color(&self) -> &'static str {
        match self {
            Self::Info => "blue",
            Self::Warning => "yellow",
            Self::Error => "red",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            speed_server_ids: vec!["5188".to_string()],
            ..Config::default()
        }
    }

    fn messages(config: &Config) -> Vec<String> {
        validate_config(config)
            .unwrap()
            .into_iter()
            .map(|w| w.message)
            .collect()
    }

    #[test]
    fn test_defaults_produce_no_warnings() {
        let warnings = validate_config(&config()).unwrap();
        assert!(
            warnings.iter().all(|w| w.level == ValidationLevel::Info),
            "{:?}",
            warnings
        );
    }

    #[test]
    fn test_timeout_longer_than_interval() {
        let mut config = config();
        config.ping_interval_secs = 10;
        config.ping_timeout_secs = 20;
        assert!(messages(&config).iter().any(|m| m.contains("longer than the ping interval")));
    }

    #[test]
    fn test_duplicate_targets_reported_once() {
        let mut config = config();
        config.ping_addresses = vec!["1.1.1.1".into(), "1.1.1.1".into(), "1.1.1.1".into()];
        let duplicates: Vec<_> = messages(&config)
            .into_iter()
            .filter(|m| m.contains("listed more than once"))
            .collect();
        assert_eq!(duplicates.len(), 1);
    }

    #[test]
    fn test_non_numeric_server_id() {
        let mut config = config();
        config.speed_server_ids = vec!["abc".into()];
        assert!(messages(&config).iter().any(|m| m.contains("'abc' is not numeric")));
    }

    #[test]
    fn test_request_timeout_shorter_than_ping_timeout() {
        let mut config = config();
        config.request_timeout_secs = 5;
        assert!(messages(&config).iter().any(|m| m.contains("shorter than the ping timeout")));
    }

    #[test]
    fn test_hard_errors_still_fail() {
        let mut config = config();
        config.ping_count = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "check this".to_string());
        assert_eq!(warning.format(false), "[WARNING] check this");
        assert_eq!(ValidationLevel::Error.color(), "red");
    }
}
