use std::path::Path;
use anyhow::{anyhow, Result};

use crate::config::proc_loader::{default_config, file_to_config, validate_service_config};
use crate::config::settings::{CredentialsMode, ServiceConfig};

/// Load the config file when one is given, otherwise the environment-backed defaults.
pub fn run(config_path: Option<&str>) -> Result<ServiceConfig> {
    match config_path {
        Some(config_path) => file_to_config(Path::new(config_path))
            .map_err(|e| anyhow!("Invalid config format in '{}': {}", config_path, e)),
        None => default_config().map_err(|e| anyhow!("Invalid default config: {}", e)),
    }
}

/// Apply command-line overrides and validate the result again.
pub fn apply_overrides(
    mut service_config: ServiceConfig,
    port: Option<u16>,
    mode: Option<CredentialsMode>,
) -> Result<ServiceConfig> {
    if let Some(port) = port {
        service_config.settings.server.port = port;
    }
    if let Some(mode) = mode {
        service_config.settings.server.mode = mode;
    }
    validate_service_config(&service_config)
        .map_err(|e| anyhow!("Invalid command-line override: {}", e))?;
    Ok(service_config)
}
