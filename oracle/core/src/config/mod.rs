//! TOML Configuration File Support
//!
//! Centralized configuration for the oracle client, read from a TOML file at
//! `~/.config/fromheart/oracle.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "https://fromheart.example.com"
//! connect_timeout_ms = 5000
//! health_timeout_ms = 5000
//!
//! [dialogue]
//! fragment_timeout_secs = 60
//! max_context_turns = 20
//! max_message_chars = 500
//! max_turns = 0
//! ```
//!
//! # Environment Variables
//!
//! - `FROMHEART_API_BASE` - oracle service base URL
//! - `FROMHEART_CSRF_TOKEN` - fixed CSRF token
//! - `FROMHEART_FRAGMENT_TIMEOUT_SECS` - fragment timeout
//! - `FROMHEART_MAX_CONTEXT_TURNS` - prior turns sent per message

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::streaming::DialogueConfig;

/// Default oracle service address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const ENV_API_BASE: &str = "FROMHEART_API_BASE";
const ENV_CSRF_TOKEN: &str = "FROMHEART_CSRF_TOKEN";
const ENV_FRAGMENT_TIMEOUT: &str = "FROMHEART_FRAGMENT_TIMEOUT_SECS";
const ENV_MAX_CONTEXT_TURNS: &str = "FROMHEART_MAX_CONTEXT_TURNS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Oracle service base URL
    pub base_url: Option<String>,

    /// Fixed CSRF token (generated per client when absent)
    pub csrf_token: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Health probe timeout in milliseconds
    pub health_timeout_ms: Option<u64>,
}

/// Dialogue section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueToml {
    /// Longest wait for acceptance or the next fragment, in seconds
    pub fragment_timeout_secs: Option<u64>,

    /// Prior turns sent with each message
    pub max_context_turns: Option<usize>,

    /// Longest accepted message in characters
    pub max_message_chars: Option<usize>,

    /// Turns kept per conversation (0 = unlimited)
    pub max_turns: Option<usize>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Dialogue configuration section
    pub dialogue: DialogueToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved settings for reaching the oracle service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendSettings {
    /// Base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Fixed CSRF token, if configured
    pub csrf_token: Option<String>,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Health probe timeout
    pub health_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            csrf_token: None,
            connect_timeout: Duration::from_millis(5000),
            health_timeout: Duration::from_millis(5000),
        }
    }
}

/// Centralized configuration for the oracle client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct OracleConfig {
    /// Backend settings
    pub backend: BackendSettings,

    /// Dialogue settings
    pub dialogue: DialogueConfig,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            dialogue: DialogueConfig::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl OracleConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the highest-priority source that contributed a value
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.backend.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must start with http:// or https://, got {url:?}"
            )));
        }
        let non_zero = [
            ("backend.connect_timeout_ms", self.backend.connect_timeout.is_zero()),
            ("backend.health_timeout_ms", self.backend.health_timeout.is_zero()),
            ("dialogue.fragment_timeout_secs", self.dialogue.fragment_timeout.is_zero()),
            ("dialogue.max_context_turns", self.dialogue.max_context_turns == 0),
            ("dialogue.max_message_chars", self.dialogue.max_message_chars == 0),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, zero)| *zero) {
            return Err(ConfigError::ValidationError(format!("{name} must be greater than zero")));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/fromheart/oracle.toml` or
/// `~/.config/fromheart/oracle.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("fromheart").join("oracle.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be read or parsed,
/// or if the merged values fail validation. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<OracleConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus the process environment
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<OracleConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration reading environment values through `env`
///
/// # Errors
///
/// See [`load_config`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<OracleConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = OracleConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_config = read_toml(config_path)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<OracleToml, ConfigError> {
    let toml_content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml::from_str(&toml_content)?)
}

fn apply_toml_config(config: &mut OracleConfig, toml: &OracleToml) {
    let backend = &toml.backend;
    if let Some(ref url) = backend.base_url {
        config.backend.base_url.clone_from(url);
    }
    if let Some(ref token) = backend.csrf_token {
        config.backend.csrf_token = Some(token.clone());
    }
    if let Some(ms) = backend.connect_timeout_ms {
        config.backend.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = backend.health_timeout_ms {
        config.backend.health_timeout = Duration::from_millis(ms);
    }

    let dialogue = &toml.dialogue;
    if let Some(secs) = dialogue.fragment_timeout_secs {
        config.dialogue.fragment_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = dialogue.max_context_turns {
        config.dialogue.max_context_turns = n;
    }
    if let Some(n) = dialogue.max_message_chars {
        config.dialogue.max_message_chars = n;
    }
    if let Some(n) = dialogue.max_turns {
        config.dialogue.max_turns = n;
    }
}

fn apply_env_config<F>(config: &mut OracleConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env(ENV_API_BASE) {
        config.backend.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Some(token) = env(ENV_CSRF_TOKEN) {
        config.backend.csrf_token = Some(token);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = env(ENV_FRAGMENT_TIMEOUT) {
        match secs.parse::<u64>() {
            Ok(secs) => {
                config.dialogue.fragment_timeout = Duration::from_secs(secs);
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %secs, "Ignoring invalid {ENV_FRAGMENT_TIMEOUT}"),
        }
    }
    if let Some(turns) = env(ENV_MAX_CONTEXT_TURNS) {
        match turns.parse::<usize>() {
            Ok(n) => {
                config.dialogue.max_context_turns = n;
                config.source = ConfigSource::Env;
            }
            Err(_) => tracing::warn!(value = %turns, "Ignoring invalid {ENV_MAX_CONTEXT_TURNS}"),
        }
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// CLI argument overrides for configuration
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Override base URL
    pub base_url: Option<String>,
    /// Override fragment timeout (seconds)
    pub fragment_timeout_secs: Option<u64>,
    /// Override prior turns sent per message
    pub max_context_turns: Option<usize>,
}

impl ConfigOverrides {
    /// Create empty overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set fragment timeout override
    #[must_use]
    pub fn with_fragment_timeout_secs(mut self, secs: u64) -> Self {
        self.fragment_timeout_secs = Some(secs);
        self
    }

    /// Set context turns override
    #[must_use]
    pub fn with_max_context_turns(mut self, turns: usize) -> Self {
        self.max_context_turns = Some(turns);
        self
    }

    /// Apply overrides to a configuration, then re-validate it
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if an override is invalid.
    pub fn apply(&self, config: &mut OracleConfig) -> Result<(), ConfigError> {
        if let Some(ref url) = self.base_url {
            config.backend.base_url.clone_from(url);
            config.source = ConfigSource::Cli;
        }
        if let Some(secs) = self.fragment_timeout_secs {
            config.dialogue.fragment_timeout = Duration::from_secs(secs);
            config.source = ConfigSource::Cli;
        }
        if let Some(turns) = self.max_context_turns {
            config.dialogue.max_context_turns = turns;
            config.source = ConfigSource::Cli;
        }
        config.validate()
    }
}
