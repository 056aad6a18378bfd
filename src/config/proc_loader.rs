use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Result};
use regex::Regex;
use tracing::{debug, error};

use crate::config::settings::{LogFormat, LoggingConfig, ServiceConfig};

/// Used when no config file is given: credentials come straight from the environment.
pub const DEFAULT_CONFIG: &str = r#"
settings:
  server:
    host: ${HOST:0.0.0.0}
    port: ${PORT:3000}
credentials:
  instance_url: ${VITE_API_URL}
  client_id: ${VITE_SF_CLIENT_ID}
  client_secret: ${VITE_SF_CLIENT_SECRET}
"#;

/// Load `KEY=value` pairs from an env file into the process environment.
/// Without a path, `.env` is searched from the working directory upwards.
/// Variables already set in the environment are left untouched.
pub fn load_env_file(path: Option<&Path>) -> Result<PathBuf, dotenvy::Error> {
    match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    }
}

/// Load config from a YAML file, expanding `${VAR}` / `${VAR:default}` placeholders first.
pub fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)?;
    parse_config(&expand_env_vars(&content)?)
}

/// Config built from [`DEFAULT_CONFIG`] and the current environment.
pub fn default_config() -> Result<ServiceConfig> {
    parse_config(&expand_env_vars(DEFAULT_CONFIG)?)
}

pub fn parse_config(content: &str) -> Result<ServiceConfig> {
    let mut service_config: ServiceConfig = serde_yaml::from_str(content)
        .inspect_err(|e| error!("parse config error: {}", e))?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }
    // `${VAR}` with an unset VAR expands to an empty string
    let creds = &mut service_config.credentials;
    for field in [&mut creds.instance_url, &mut creds.client_id, &mut creds.client_secret] {
        if field.as_deref().is_some_and(|v| v.trim().is_empty()) {
            *field = None;
        }
    }

    debug!("validation config ...");
    validate_service_config(&service_config)?;
    Ok(service_config)
}

pub fn validate_service_config(config: &ServiceConfig) -> Result<()> {
    let settings = &config.settings;
    if settings.server.port == 0 {
        bail!("settings.server.port must be greater than 0");
    }
    if settings.upstream.timeout_ms == 0 {
        bail!("settings.upstream.timeout_ms must be greater than 0");
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        bail!("settings.metrics.path '{}' must start with '/'", settings.metrics.path);
    }
    Ok(())
}

fn expand_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]+))?\}")?;
    Ok(re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string())
}
