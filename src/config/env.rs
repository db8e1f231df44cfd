//! .env file loading

use crate::error::{AppError, Result};
use std::path::Path;

/// Loads `NETMON_*` defaults from a .env file into the process environment
pub struct EnvManager;

impl EnvManager {
    /// Load a specific env file; variables already set in the process win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }
}
