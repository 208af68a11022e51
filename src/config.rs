//! Configuration management for booking-client.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::http::ClientConfig;

/// Default backend origin.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8004";

/// Credential file used when none is configured, relative to `$HOME`.
const DEFAULT_TOKEN_FILE: &str = ".booking-client/tokens.json";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection settings.
    pub backend: BackendSection,
    /// Credential storage settings.
    pub storage: StorageSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Backend configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// Backend origin.
    pub base_url: String,
    /// Whole-request timeout in seconds; `None` leaves requests unbounded.
    pub timeout_secs: Option<u64>,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
        }
    }
}

/// Storage configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Credential file; defaults to `~/.booking-client/tokens.json`.
    pub token_file: Option<PathBuf>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BOOKING_API_URL") {
            if !url.is_empty() {
                self.backend.base_url = url;
            }
        }

        if let Ok(path) = std::env::var("BOOKING_TOKEN_FILE") {
            if !path.is_empty() {
                self.storage.token_file = Some(PathBuf::from(path));
            }
        }

        if let Ok(level) = std::env::var("BOOKING_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref url) = args.api_url {
            self.backend.base_url = url.clone();
        }

        if let Some(ref path) = args.token_file {
            self.storage.token_file = Some(path.clone());
        }

        if let Some(secs) = args.timeout_secs {
            self.backend.timeout_secs = Some(secs);
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// Convert to the HTTP client settings.
    pub fn to_client_config(&self) -> Result<ClientConfig, ConfigError> {
        let url = Url::parse(&self.backend.base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.backend.base_url.clone()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(self.backend.base_url.clone()));
        }

        let mut client = ClientConfig::new(self.backend.base_url.clone());
        if let Some(secs) = self.backend.timeout_secs {
            client = client.with_timeout(Duration::from_secs(secs));
        }
        Ok(client)
    }

    /// Credential file path, falling back to the per-user default.
    pub fn token_file(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref path) = self.storage.token_file {
            return Ok(path.clone());
        }

        std::env::var_os("HOME")
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(DEFAULT_TOKEN_FILE))
            .ok_or(ConfigError::NoTokenFile)
    }

    /// Get the log level filter string.
    ///
    /// A bare level applies to this crate only; anything else is passed
    /// through as an `EnvFilter` directive.
    pub fn log_filter(&self) -> String {
        let level = self.logging.level.trim();
        match level {
            "error" | "warn" | "info" | "debug" | "trace" | "off" => {
                format!("booking_client={}", level)
            }
            _ => level.to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Backend URL is not an http(s) URL.
    InvalidUrl(String),
    /// No credential file configured and no home directory to default to.
    NoTokenFile,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidUrl(url) => write!(f, "invalid backend url: {}", url),
            Self::NoTokenFile => write!(
                f,
                "no credential file configured and HOME is not set; use --token-file"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
