//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/faceopt/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/faceopt/` (~/.config/faceopt/)
//! - State/Logs: `$XDG_STATE_HOME/faceopt/` (~/.local/state/faceopt/)

use crate::error::{Error, Result};
use crate::types::OptimizationConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Step timing for the simulated runner
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Where exported configuration documents go
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Optimization preset used when no configuration file is given
    #[serde(default)]
    pub defaults: Option<OptimizationConfig>,
}

/// Timing of the simulated pipeline
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Shortest total duration of one step, in milliseconds
    #[serde(default = "default_step_min_ms")]
    pub step_min_ms: u64,

    /// Longest total duration of one step, in milliseconds
    #[serde(default = "default_step_max_ms")]
    pub step_max_ms: u64,

    /// Pause after each completed step, in milliseconds
    #[serde(default = "default_step_pause_ms")]
    pub step_pause_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_min_ms: default_step_min_ms(),
            step_max_ms: default_step_max_ms(),
            step_pause_ms: default_step_pause_ms(),
        }
    }
}

/// Upper bound for `step_max_ms` and `step_pause_ms` (one day)
pub const MAX_STEP_MS: u64 = 24 * 60 * 60 * 1000;

impl RunnerConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("step_max_ms", self.step_max_ms),
            ("step_pause_ms", self.step_pause_ms),
        ] {
            if value > MAX_STEP_MS {
                return Err(Error::Config(format!(
                    "runner.{key} ({value}) must not exceed {MAX_STEP_MS}"
                )));
            }
        }
        if self.step_max_ms == 0 {
            return Err(Error::Config(
                "runner.step_max_ms must be greater than 0".to_string(),
            ));
        }
        if self.step_min_ms > self.step_max_ms {
            return Err(Error::Config(format!(
                "runner.step_min_ms ({}) must not exceed runner.step_max_ms ({})",
                self.step_min_ms, self.step_max_ms
            )));
        }
        Ok(())
    }

    pub fn step_pause(&self) -> Duration {
        Duration::from_millis(self.step_pause_ms)
    }

    /// Minimum wall time a full run over `steps` steps can take
    pub fn minimum_run_duration(&self, steps: usize) -> Duration {
        let per_step =
            Duration::from_millis(self.step_min_ms).saturating_add(self.step_pause());
        per_step.saturating_mul(u32::try_from(steps).unwrap_or(u32::MAX))
    }
}

fn default_step_min_ms() -> u64 {
    5000
}

fn default_step_max_ms() -> u64 {
    10000
}

fn default_step_pause_ms() -> u64 {
    1000
}

/// Export configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ExportConfig {
    /// Output directory (defaults to the current directory)
    pub directory: Option<PathBuf>,
}

impl ExportConfig {
    /// Resolved output directory
    pub fn directory(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.runner.validate()?;

        Ok(config)
    }

    /// Optimization preset from `[defaults]`, or the built-in one
    pub fn default_optimization(&self) -> OptimizationConfig {
        self.defaults.clone().unwrap_or_default()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/faceopt/config.toml` (~/.config/faceopt/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("faceopt").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/faceopt/` (~/.local/state/faceopt/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("faceopt")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/faceopt/faceopt.log` (~/.local/state/faceopt/faceopt.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("faceopt.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// Called by the CLI before anything reads these variables.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
