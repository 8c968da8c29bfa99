//! Environment configuration
//!
//! TOML file with every field optional. Looked up from `INPUTENV_CONFIG`,
//! then `/etc/inputenv/config.toml`; defaults apply when neither exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Standard configuration paths
pub const CONFIG_DIR: &str = "/etc/inputenv";
pub const CONFIG_ENV: &str = "INPUTENV_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Directory holding `event*` nodes
    pub device_dir: PathBuf,
    /// How long construction waits for the worker to initialize
    pub init_timeout_ms: u64,
    /// Pause before per-device cleanup so feedback effects can settle
    pub cleanup_grace_ms: u64,
    /// Bound on shutdown waits; unbounded when absent
    pub shutdown_timeout_ms: Option<u64>,
    /// Replay length of one rumble effect
    pub rumble_duration_ms: u16,
    pub register_exit_hook: bool,
    /// Turn SIGINT/SIGTERM into a process exit that runs the exit hook
    pub handle_signals: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            device_dir: PathBuf::from("/dev/input"),
            init_timeout_ms: 2000,
            cleanup_grace_ms: 1000,
            shutdown_timeout_ms: None,
            rumble_duration_ms: 500,
            register_exit_hook: true,
            handle_signals: false,
        }
    }
}

impl EnvironmentConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let system_config = Path::new(CONFIG_DIR).join("config.toml");
        Self::load_first(explicit.as_deref(), &system_config)
    }

    /// An explicit path must exist; the system path is optional
    fn load_first(explicit: Option<&Path>, system_config: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if system_config.exists() {
            return Self::load(system_config);
        }

        tracing::warn!(
            "No configuration at {}, using defaults",
            system_config.display()
        );
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.init_timeout_ms == 0 {
            return Err(ConfigError::Invalid("init_timeout_ms must be positive".into()));
        }
        if self.shutdown_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "shutdown_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn cleanup_grace(&self) -> Duration {
        Duration::from_millis(self.cleanup_grace_ms)
    }

    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }
}
