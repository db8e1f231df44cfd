//! Command-line interface

use crate::types::MeasurementKind;
use clap::{Args, Parser, Subcommand};

/// netmon - periodic network health measurements with an on-demand HTTP trigger
#[derive(Parser, Debug, Clone)]
#[command(name = "netmon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Force colored output
    #[arg(long, global = true)]
    pub color: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the daemon: scheduled measurements, metrics and on-demand HTTP endpoints
    Serve(ServeArgs),

    /// Ask a running server for an on-demand ping round
    Ping(QueryArgs),

    /// Ask a running server for an on-demand speed test round
    Speed(QueryArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// HTTP port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Addresses to ping (comma-separated)
    #[arg(long, value_name = "ADDRESSES")]
    pub ping_addresses: Option<String>,

    /// Speed test server ids (comma-separated)
    #[arg(long, value_name = "IDS")]
    pub speed_servers: Option<String>,

    /// Seconds between ping rounds
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub ping_interval: Option<u64>,

    /// Seconds between speed test rounds
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub speed_interval: Option<u64>,

    /// Echo requests per address per round
    #[arg(long)]
    pub ping_count: Option<u32>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Targets to measure (comma-separated); defaults to the configured list
    #[arg(long, value_name = "IDS")]
    pub servers: Option<String>,

    /// Base URL of the netmon server
    #[arg(long)]
    pub url: Option<String>,

    /// Print the raw JSON response
    #[arg(long)]
    pub json: bool,

    /// Seconds to wait for the server's response
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub timeout: Option<u64>,
}

impl Command {
    /// Measurement kind for the client subcommands
    pub fn query(&self) -> Option<(MeasurementKind, &QueryArgs)> {
        match self {
            Command::Serve(_) => None,
            Command::Ping(args) => Some((MeasurementKind::Latency, args)),
            Command::Speed(args) => Some((MeasurementKind::Throughput, args)),
        }
    }
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some((_, args)) = self.command.query() {
            if let Some(servers) = &args.servers {
                if servers.split(',').all(|s| s.trim().is_empty()) {
                    return Err("--servers must list at least one target".to_string());
                }
            }
        }

        Ok(())
    }

    pub fn is_serve(&self) -> bool {
        matches!(self.command, Command::Serve(_))
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }
}

/// Parse a positive number of seconds
fn parse_seconds(s: &str) -> Result<u64, String> {
    if s.starts_with('+') {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    cfg!(unix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_parsing() {
        let cli = Cli::parse_from(["netmon", "serve", "--port", "9000", "--speed-servers", "5188,1234"]);
        match &cli.command {
            Command::Serve(args) => {
                assert_eq!(args.port, Some(9000));
                assert_eq!(args.speed_servers.as_deref(), Some("5188,1234"));
                assert!(args.ping_interval.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(cli.is_serve());
    }

    #[test]
    fn test_query_parsing() {
        let cli = Cli::parse_from(["netmon", "--no-color", "ping", "--servers", "1.1.1.1", "--json"]);
        let (kind, args) = cli.command.query().unwrap();
        assert_eq!(kind, MeasurementKind::Latency);
        assert_eq!(args.servers.as_deref(), Some("1.1.1.1"));
        assert!(args.json);
        assert!(!cli.use_colors());

        let cli = Cli::parse_from(["netmon", "speed", "--url", "http://nas:8092", "--debug"]);
        let (kind, args) = cli.command.query().unwrap();
        assert_eq!(kind, MeasurementKind::Throughput);
        assert_eq!(args.url.as_deref(), Some("http://nas:8092"));
        assert!(cli.debug);
    }

    #[test]
    fn test_conflicting_color_flags() {
        let cli = Cli::parse_from(["netmon", "--color", "--no-color", "serve"]);
        assert!(cli.validate().is_err());
        assert!(Cli::parse_from(["netmon", "--color", "serve"]).use_colors());
    }

    #[test]
    fn test_blank_servers_rejected() {
        let cli = Cli::parse_from(["netmon", "ping", "--servers", " , "]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_seconds_parsing() {
        assert_eq!(parse_seconds("60"), Ok(60));
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("+5").is_err());
        assert!(parse_seconds("abc").is_err());
        assert!(Cli::try_parse_from(["netmon", "serve", "--ping-interval", "0"]).is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["netmon"]).is_err());
    }
}
