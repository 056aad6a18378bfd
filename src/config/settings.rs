use serde::Deserialize;

use crate::config::credentials::CredentialsConfig;
use crate::utils::constants::*;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub mode: CredentialsMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            mode: CredentialsMode::default(),
        }
    }
}

/// Where the credentials for the upstream exchange come from.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CredentialsMode {
    /// Read once from configuration, served on `GET /api/token`.
    #[default]
    Fixed,
    /// Supplied in the body of every `POST /api/token`.
    PerRequest,
}

impl CredentialsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialsMode::Fixed => "fixed",
            CredentialsMode::PerRequest => "per_request",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// refresh this many seconds before the token expires
    #[serde(default = "default_skew_seconds")]
    pub skew_seconds: u64,
    /// used when upstream omits `expires_in` or sends a non-number
    #[serde(default = "default_expires_in_seconds")]
    pub default_expires_in_seconds: u64,
    #[serde(default)]
    pub scope: CacheScope,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            skew_seconds: default_skew_seconds(),
            default_expires_in_seconds: default_expires_in_seconds(),
            scope: CacheScope::default(),
        }
    }
}

/// How many cache slots exist.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheScope {
    /// One slot for every caller, whatever credentials they send.
    #[default]
    Shared,
    /// One slot per distinct credential set.
    PerCredentials,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_skew_seconds() -> u64 {
    DEFAULT_SKEW_SECS
}

fn default_expires_in_seconds() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
