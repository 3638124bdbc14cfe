//! Service configuration
//!
//! Layered: built-in defaults, then an optional config file, then
//! `CITY_ALERTS__*` environment variables (`__` separates nested keys,
//! e.g. `CITY_ALERTS__SWEEP__INTERVAL_SECS=30`).

use closure_scheduler::SweepConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_VAR: &str = "CITY_ALERTS_CONFIG";

const ENV_PREFIX: &str = "CITY_ALERTS";
const DEFAULT_FILE: &str = "city-alerts";

/// Service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// JSON snapshot holding alerts; in-memory only when unset
    pub snapshot_path: Option<PathBuf>,
    /// Maximum log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    pub sweep: SweepConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            snapshot_path: None,
            log_level: "info".to_string(),
            log_json: false,
            sweep: SweepConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `CITY_ALERTS_CONFIG` (or `./city-alerts.*`) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from);
        Self::load_with(path.as_deref(), env_source())
    }

    /// Load from an explicit file and environment source.
    ///
    /// An explicit `path` must exist; without one the default file name is
    /// optional.
    pub fn load_with(path: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_FILE).required(false),
        };

        Config::builder()
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()
    }

    /// Parsed log level, falling back to INFO on an unknown name
    pub fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// Environment source for `CITY_ALERTS__*` variables
pub fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
