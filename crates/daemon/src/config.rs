//! Configuration management for the PolyRun daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/polyrun/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("terminal size must be nonzero, got {0}x{1}")]
    InvalidTerminalSize(u16, u16),

    #[error("read_buffer_size must be greater than 0")]
    InvalidReadBufferSize,

    #[error("toolchain entry '{0}' must not be empty")]
    EmptyToolchain(&'static str),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the PolyRun daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Pseudo-terminal configuration for launched processes.
    pub terminal: TerminalConfig,

    /// Toolchain binaries per language.
    pub languages: ToolchainConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for storing daemon data.
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Pseudo-terminal configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerminalConfig {
    /// Terminal width for launched processes.
    pub cols: u16,

    /// Terminal height for launched processes.
    pub rows: u16,

    /// Chunk size for pty reads.
    pub read_buffer_size: usize,
}

/// Toolchain binary names, resolved via PATH unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Python interpreter.
    pub python: String,
    /// JavaScript runtime.
    pub node: String,
    /// PHP interpreter.
    pub php: String,
    /// Perl interpreter.
    pub perl: String,
    /// Java compiler.
    pub javac: String,
    /// Java launcher.
    pub java: String,
    /// C compiler.
    pub cc: String,
    /// C++ compiler.
    pub cxx: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: 80,
            rows: 24,
            read_buffer_size: 1024,
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            node: "node".to_string(),
            php: "php".to_string(),
            perl: "perl".to_string(),
            javac: "javac".to_string(),
            java: "java".to_string(),
            cc: "gcc".to_string(),
            cxx: "g++".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("polyrun")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("polyrun")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - POLYRUN_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - POLYRUN_DATA_DIR: Override the daemon data directory
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("POLYRUN_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(dir) = std::env::var("POLYRUN_DATA_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding data_dir from environment: {}", dir);
                self.daemon.data_dir = PathBuf::from(dir);
            }
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terminal.cols == 0 || self.terminal.rows == 0 {
            return Err(ConfigError::InvalidTerminalSize(
                self.terminal.cols,
                self.terminal.rows,
            ));
        }

        if self.terminal.read_buffer_size == 0 {
            return Err(ConfigError::InvalidReadBufferSize);
        }

        let toolchains = [
            ("python", &self.languages.python),
            ("node", &self.languages.node),
            ("php", &self.languages.php),
            ("perl", &self.languages.perl),
            ("javac", &self.languages.javac),
            ("java", &self.languages.java),
            ("cc", &self.languages.cc),
            ("cxx", &self.languages.cxx),
        ];
        for (name, value) in toolchains {
            if value.trim().is_empty() {
                return Err(ConfigError::EmptyToolchain(name));
            }
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/polyrun/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
