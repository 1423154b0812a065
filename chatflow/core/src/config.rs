//! Client Configuration
//!
//! Settings for the proxy endpoints, streaming limits and conversation paging,
//! read from `~/.config/chatflow/client.toml`.
//!
//! # Precedence
//!
//! Later layers win:
//! 1. Built-in defaults
//! 2. The TOML file
//! 3. `CHATFLOW_*` environment variables
//! 4. Command-line flags (via [`ConfigOverrides`])
//!
//! # Example
//!
//! ```toml
//! [backend]
//! base_url = "http://grafana.internal:3000"
//! connect_timeout_ms = 5000
//!
//! [stream]
//! idle_timeout_ms = 120000
//! event_buffer = 64
//!
//! [conversations]
//! list_limit = 20
//! history_limit = 50
//! sort_by = "-updated_at"
//!
//! [input]
//! max_input_length = 10000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::BackendConfig;

// =============================================================================
// Error Types
// =============================================================================

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// File that was read
        path: PathBuf,
        /// IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Sources
// =============================================================================

/// Highest-priority layer that supplied a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Command-line flag
    Cli,
    /// `CHATFLOW_*` variable
    Env,
    /// `client.toml`
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
// File Layout
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Scheme, host and port of the chat proxy
    pub base_url: Option<String>,
    /// Streaming query endpoint path
    pub chat_path: Option<String>,
    /// Conversation list endpoint path
    pub conversations_path: Option<String>,
    /// Message history endpoint path
    pub history_path: Option<String>,
    /// Health endpoint path
    pub ping_path: Option<String>,
    /// TCP connect timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Idle timeout between chunks in milliseconds (0 disables)
    pub idle_timeout_ms: Option<u64>,
    /// Session event channel capacity
    pub event_buffer: Option<usize>,
}

/// Conversations section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationsToml {
    /// Conversations fetched per directory refresh
    pub list_limit: Option<u32>,
    /// History entries requested per page
    pub history_limit: Option<u32>,
    /// Directory sort order
    pub sort_by: Option<String>,
}

/// Input section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputToml {
    /// Maximum question length in characters (0 = unlimited)
    pub max_input_length: Option<usize>,
}

/// Whole `client.toml` document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Backend configuration section
    pub backend: BackendToml,
    /// Stream configuration section
    pub stream: StreamToml,
    /// Conversations configuration section
    pub conversations: ConversationsToml,
    /// Input configuration section
    pub input: InputToml,
}

// =============================================================================
// Resolved Settings
// =============================================================================

/// Stream settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    /// Idle timeout between chunks in milliseconds (0 disables)
    pub idle_timeout_ms: u64,
    /// Session event channel capacity
    pub event_buffer: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 120_000,
            event_buffer: 64,
        }
    }
}

/// Conversation directory and history settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationSettings {
    /// Conversations fetched per directory refresh
    pub list_limit: u32,
    /// History entries requested per page
    pub history_limit: u32,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            list_limit: 20,
            history_limit: 50,
        }
    }
}

/// Input settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSettings {
    /// Maximum question length in characters (0 = unlimited)
    pub max_input_length: usize,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            max_input_length: 10_000,
        }
    }
}

/// Centralized configuration for the chat client
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Chat proxy connection
    pub backend: BackendConfig,
    /// Streaming behaviour
    pub stream: StreamSettings,
    /// Conversation directory and history
    pub conversations: ConversationSettings,
    /// Input limits
    pub input: InputSettings,
    /// File the settings were read from
    pub config_file_path: Option<PathBuf>,
    /// Highest-priority layer that contributed
    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            stream: StreamSettings::default(),
            conversations: ConversationSettings::default(),
            input: InputSettings::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Which layer the settings came from
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Record which layer the settings came from
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Idle timeout as a duration (`None` when disabled)
    #[must_use]
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.stream.idle_timeout_ms > 0).then(|| Duration::from_millis(self.stream.idle_timeout_ms))
    }

    /// Check values that would make the client unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.backend.base_url.trim();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "backend.base_url must start with http:// or https://, got {base_url:?}"
            )));
        }
        if self.backend.chat_path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.chat_path must not be empty".to_string(),
            ));
        }
        if self.stream.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "stream.event_buffer must be at least 1".to_string(),
            ));
        }
        if self.conversations.list_limit == 0 || self.conversations.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "conversations limits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Location of `client.toml` under the user's config directory
///
/// Returns `$XDG_CONFIG_HOME/chatflow/client.toml` or
/// `~/.config/chatflow/client.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("chatflow").join("client.toml"))
}

/// Load defaults, `client.toml` and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Like [`load_config`] but reading the file at `path`
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or a value is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration, reading environment overrides through `env`
///
/// # Errors
///
/// Fails if the file cannot be read or parsed, or a value is invalid.
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<ClientConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ClientToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.set_source(ConfigSource::File);

            tracing::info!(
                path = %config_path.display(),
                "Read client.toml"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "No client.toml, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

/// Copy every value present in the file
fn apply_toml_config(config: &mut ClientConfig, toml: &ClientToml) {
    let backend = &toml.backend;
    if let Some(ref url) = backend.base_url {
        config.backend.base_url = url.clone();
    }
    if let Some(ref path) = backend.chat_path {
        config.backend.chat_path = path.clone();
    }
    if let Some(ref path) = backend.conversations_path {
        config.backend.conversations_path = path.clone();
    }
    if let Some(ref path) = backend.history_path {
        config.backend.history_path = path.clone();
    }
    if let Some(ref path) = backend.ping_path {
        config.backend.ping_path = path.clone();
    }
    if let Some(ms) = backend.connect_timeout_ms {
        config.backend.connect_timeout = Duration::from_millis(ms);
    }

    if let Some(ms) = toml.stream.idle_timeout_ms {
        config.stream.idle_timeout_ms = ms;
    }
    if let Some(size) = toml.stream.event_buffer {
        config.stream.event_buffer = size;
    }

    if let Some(limit) = toml.conversations.list_limit {
        config.conversations.list_limit = limit;
    }
    if let Some(limit) = toml.conversations.history_limit {
        config.conversations.history_limit = limit;
    }
    if let Some(ref sort) = toml.conversations.sort_by {
        config.backend.conversation_sort = sort.clone();
    }

    if let Some(length) = toml.input.max_input_length {
        config.input.max_input_length = length;
    }
}

/// Apply `CHATFLOW_*` variables found through `env`
fn apply_env_config<F>(config: &mut ClientConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("CHATFLOW_BASE_URL").filter(|v| !v.trim().is_empty()) {
        config.backend.base_url = url;
        config.set_source(ConfigSource::Env);
    }
    if let Some(ms) = env("CHATFLOW_CONNECT_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.backend.connect_timeout = Duration::from_millis(ms);
        config.set_source(ConfigSource::Env);
    }
    if let Some(ms) = env("CHATFLOW_IDLE_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
        config.stream.idle_timeout_ms = ms;
        config.set_source(ConfigSource::Env);
    }
    if let Some(limit) = env("CHATFLOW_LIST_LIMIT").and_then(|v| v.parse::<u32>().ok()) {
        config.conversations.list_limit = limit;
        config.set_source(ConfigSource::Env);
    }
    if let Some(limit) = env("CHATFLOW_HISTORY_LIMIT").and_then(|v| v.parse::<u32>().ok()) {
        config.conversations.history_limit = limit;
        config.set_source(ConfigSource::Env);
    }
    if let Some(length) = env("CHATFLOW_MAX_INPUT_LENGTH").and_then(|v| v.parse::<usize>().ok()) {
        config.input.max_input_length = length;
        config.set_source(ConfigSource::Env);
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line values layered over a loaded configuration
///
/// Apply after [`load_config`]; unset fields leave the loaded value alone.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,
    /// Idle timeout override (milliseconds)
    pub idle_timeout_ms: Option<u64>,
    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// No overrides
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

    /// Set idle timeout override
    #[must_use]
    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = Some(ms);
        self
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base_url.is_none() && self.idle_timeout_ms.is_none() && self.connect_timeout_ms.is_none()
    }

    /// Write every set override into `config`
    pub fn apply(&self, config: &mut ClientConfig) {
        if !self.is_empty() {
            config.set_source(ConfigSource::Cli);
        }
        if let Some(ref url) = self.base_url {
            config.backend.base_url = url.clone();
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.stream.idle_timeout_ms = ms;
        }
        if let Some(ms) = self.connect_timeout_ms {
            config.backend.connect_timeout = Duration::from_millis(ms);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
