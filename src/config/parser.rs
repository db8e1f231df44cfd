//! Configuration assembly from defaults, .env, environment and CLI flags

use crate::{
    cli::{Cli, Command},
    config::env::EnvManager,
    error::{AppError, Result},
    models::{config::split_list, Config},
};
use std::path::PathBuf;

/// Configuration parser that combines all configuration sources
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
}

impl ConfigParser {
    /// Create a new configuration parser
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
        }
    }

    /// Read the env file from `path` instead of ./.env
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Parse configuration from all sources with proper priority
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file_from(&self.env_file, self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config)?;

        if self.cli.is_serve() {
            config.validate_for_daemon()?;
        } else {
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_overrides(&self, config: &mut Config) -> Result<()> {
        if self.cli.verbose {
            config.verbose = true;
        }

        if self.cli.debug {
            config.debug = true;
            config.verbose = true;
        }

        if self.cli.log_json {
            config.log_json = true;
        }

        if self.cli.color {
            config.enable_color = true;
        } else if self.cli.no_color || !self.cli.use_colors() {
            config.enable_color = false;
        }

        match &self.cli.command {
            Command::Serve(args) => {
                if let Some(port) = args.port {
                    config.http_port = port;
                }
                if let Some(addresses) = &args.ping_addresses {
                    config.ping_addresses = split_list(addresses);
                    if config.ping_addresses.is_empty() {
                        return Err(AppError::config("--ping-addresses must list at least one address"));
                    }
                }
                if let Some(ids) = &args.speed_servers {
                    config.speed_server_ids = split_list(ids);
                }
                if let Some(secs) = args.ping_interval {
                    config.ping_interval_secs = secs;
                }
                if let Some(secs) = args.speed_interval {
                    config.speed_interval_secs = secs;
                }
                if let Some(count) = args.ping_count {
                    config.ping_count = count;
                }
            }
            Command::Ping(args) | Command::Speed(args) => {
                if let Some(url) = &args.url {
                    config.server_url = url.trim().to_string();
                }
            }
        }

        Ok(())
    }
}

/// Short human-readable summary, printed at startup in verbose mode
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = String::new();

    summary.push_str("Configuration Summary:\n");
    summary.push_str(&format!(
        "  Ping: {} every {}s ({} echo requests, {}s timeout)\n",
        config.ping_addresses.join(", "),
        config.ping_interval_secs,
        config.ping_count,
        config.ping_timeout_secs
    ));

    let servers = if config.speed_server_ids.is_empty() {
        "(none)".to_string()
    } else {
        config.speed_server_ids.join(", ")
    };
    summary.push_str(&format!(
        "  Speed test: {} every {}s ({}s timeout)\n",
        servers, config.speed_interval_secs, config.speed_timeout_secs
    ));

    summary.push_str(&format!(
        "  HTTP: port {}, request timeout {}s\n",
        config.http_port, config.request_timeout_secs
    ));
    summary.push_str(&format!("  Server URL: {}\n", config.server_url));
    summary.push_str(&format!("  Shutdown grace: {}s\n", config.shutdown_grace_secs));
    summary.push_str(&format!("  Log level: {}{}\n", config.log_level, if config.log_json { " (json)" } else { "" }));
    summary.push_str(&format!("  Color output: {}\n", config.enable_color));

    summary
}
