//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::query::AggregationFunc;
use crate::storage::Direction;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Query pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Fixed seed for reservoir sampling; entropy when unset
    #[serde(default)]
    pub reservoir_seed: Option<u64>,

    /// Reducer used by `RESAMPLE` stages that do not name one
    #[serde(default = "default_reducer")]
    pub default_reducer: AggregationFunc,

    /// Scan direction used when a query gives no time range
    #[serde(default)]
    pub default_direction: Direction,
}

fn default_reducer() -> AggregationFunc {
    AggregationFunc::Avg
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reservoir_seed: None,
            default_reducer: default_reducer(),
            default_direction: Direction::Forward,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("chronicle").join("qp.toml")),
            Some(PathBuf::from("./qp.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(seed) = std::env::var("CHRONICLE_QP_SEED") {
            if let Ok(s) = seed.parse() {
                self.pipeline.reservoir_seed = Some(s);
            }
        }
        if let Ok(reducer) = std::env::var("CHRONICLE_QP_REDUCER") {
            if let Some(r) = AggregationFunc::from_str(&reducer) {
                self.pipeline.default_reducer = r;
            }
        }
        if let Ok(direction) = std::env::var("CHRONICLE_QP_DIRECTION") {
            if let Some(d) = Direction::from_str(&direction) {
                self.pipeline.default_direction = d;
            }
        }

        if let Ok(level) = std::env::var("CHRONICLE_QP_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("CHRONICLE_QP_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Chronicle Query Pipeline Configuration
#
# Environment variables override these settings:
# - CHRONICLE_QP_SEED
# - CHRONICLE_QP_REDUCER
# - CHRONICLE_QP_DIRECTION
# - CHRONICLE_QP_LOG_LEVEL
# - CHRONICLE_QP_LOG_FORMAT

[pipeline]
# Fixed seed for reservoir sampling (omit for a random seed)
# reservoir_seed = 42

# Reducer for RESAMPLE stages without an explicit one:
# avg, sum, min, max, count, first, last
default_reducer = "avg"

# Scan direction when a query has no BETWEEN clause: forward or backward
default_direction = "forward"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
