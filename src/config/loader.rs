//! Environment-aware configuration loading.
//!
//! Resolution order:
//! 1. Base file `rcmd-config.yaml` in the config root
//! 2. Optional environment overlay `rcmd-config.{environment}.yaml`, deep-merged
//!    over the base
//! 3. Validation of the merged result
//!
//! The config root comes from `RCMD_CONFIG_PATH` (default `config`); the
//! environment from `RCMD_ENV` or `APP_ENV` (default `development`). A missing
//! base file is not an error, the compiled defaults apply.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ConfigResult, ConfigurationError, RcmdConfig};

const BASE_FILE_NAME: &str = "rcmd-config.yaml";

/// Loaded configuration plus the provenance needed for diagnostics
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: RcmdConfig,
    environment: String,
    config_root: PathBuf,
}

impl ConfigManager {
    /// Load using environment variables for the config root and environment name
    pub fn load() -> ConfigResult<Self> {
        let environment = detect_environment();
        let config_root =
            PathBuf::from(std::env::var("RCMD_CONFIG_PATH").unwrap_or_else(|_| "config".to_string()));
        Self::load_from(&config_root, &environment)
    }

    /// Load from an explicit root and environment name
    pub fn load_from(config_root: &Path, environment: &str) -> ConfigResult<Self> {
        let base_path = config_root.join(BASE_FILE_NAME);
        let base = match read_yaml(&base_path)? {
            Some(value) => value,
            None => {
                warn!(
                    path = %base_path.display(),
                    "base config file not found, using compiled defaults"
                );
                serde_yaml::Value::Mapping(Default::default())
            }
        };

        let overlay_path = config_root.join(format!("rcmd-config.{environment}.yaml"));
        let merged = match read_yaml(&overlay_path)? {
            Some(overlay) => {
                debug!(path = %overlay_path.display(), "applying environment overlay");
                deep_merge(base, overlay)
            }
            None => base,
        };

        let config: RcmdConfig =
            serde_yaml::from_value(merged).map_err(|e| ConfigurationError::Parse {
                path: base_path.display().to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;

        let manager = Self {
            config,
            environment: environment.to_string(),
            config_root: config_root.to_path_buf(),
        };
        manager.log_summary();
        Ok(manager)
    }

    pub fn config(&self) -> &RcmdConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_root(&self) -> &Path {
        &self.config_root
    }

    /// Log the effective configuration with security material masked
    fn log_summary(&self) {
        let c = &self.config;
        info!(
            environment = %self.environment,
            connect_timeout_seconds = c.ssh.connect_timeout_seconds,
            command_timeout_seconds = c.ssh.command_timeout_seconds,
            retry_max_attempts = c.ssh.retry.max_attempts,
            retry_backoff_ms = c.ssh.retry.backoff_ms,
            core_pool_size = c.executor.core_pool_size,
            max_pool_size = c.executor.max_pool_size,
            queue_capacity = c.executor.queue_capacity,
            allow_path = %c.policy.allow_path,
            deny_path = %c.policy.deny_path,
            reload_enabled = c.policy.reload_enabled,
            admin_api_key = if c.security.admin_api_key.is_some() {
                "<configured>"
            } else {
                "<unset>"
            },
            "configuration loaded"
        );
    }
}

/// Environment name from `RCMD_ENV`, then `APP_ENV`, defaulting to development
pub fn detect_environment() -> String {
    std::env::var("RCMD_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn read_yaml(path: &Path) -> ConfigResult<Option<serde_yaml::Value>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let value = serde_yaml::from_str(&raw).map_err(|e| ConfigurationError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(Some(value))
}

/// Recursive merge of mappings; overlay scalars and sequences replace base values
fn deep_merge(base: serde_yaml::Value, overlay: serde_yaml::Value) -> serde_yaml::Value {
    use serde_yaml::Value;
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}
