//! # Configuration System
//!
//! YAML-backed configuration for the execution core: transport timeouts and
//! retry bounds, worker pool sizing, policy file locations, and security
//! material. Loading is environment-aware (base file plus optional
//! environment overlay) with explicit validation and no silent fallbacks
//! beyond the documented defaults; see [`loader::ConfigManager`].

pub mod loader;

use serde::{Deserialize, Serialize};

pub use loader::ConfigManager;

use crate::constants;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration: {field}: {reason}")]
    Invalid { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Root configuration structure mirroring `rcmd-config.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcmdConfig {
    pub ssh: SshConfig,
    pub executor: ExecutorConfig,
    pub policy: PolicyConfig,
    pub security: SecurityConfig,
}

/// Transport timeouts and the connection retry protocol
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub connect_timeout_seconds: u64,
    pub command_timeout_seconds: u64,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first try
    pub max_attempts: u32,
    /// Base backoff; doubles per retry
    pub backoff_ms: u64,
}

/// Worker pool bounds. Tokio worker tasks are permanent, so `max_pool_size`
/// is the effective concurrency; `core_pool_size` is validated and logged
/// for parity with thread-pool deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub queue_capacity: usize,
}

/// Allow/deny pattern sources and the hot-reload schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow_path: String,
    pub deny_path: String,
    pub reload_enabled: bool,
    pub check_interval_ms: u64,
}

/// Security material; values are masked in sanitized logging output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub admin_api_key: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: constants::DEFAULT_CONNECT_TIMEOUT_SECONDS,
            command_timeout_seconds: constants::DEFAULT_COMMAND_TIMEOUT_SECONDS,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_RETRY_ATTEMPTS,
            backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            core_pool_size: constants::DEFAULT_CORE_POOL_SIZE,
            max_pool_size: constants::DEFAULT_MAX_POOL_SIZE,
            queue_capacity: constants::DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            allow_path: constants::DEFAULT_ALLOW_PATTERNS_PATH.to_string(),
            deny_path: constants::DEFAULT_DENY_PATTERNS_PATH.to_string(),
            reload_enabled: true,
            check_interval_ms: constants::DEFAULT_POLICY_CHECK_INTERVAL_MS,
        }
    }
}

impl RcmdConfig {
    /// Validate operational bounds; called after every load
    pub fn validate(&self) -> ConfigResult<()> {
        if self.ssh.connect_timeout_seconds == 0 {
            return Err(invalid("ssh.connect_timeout_seconds", "must be greater than 0"));
        }
        if self.ssh.command_timeout_seconds == 0 {
            return Err(invalid("ssh.command_timeout_seconds", "must be greater than 0"));
        }
        if self.ssh.retry.max_attempts == 0 {
            return Err(invalid("ssh.retry.max_attempts", "must be at least 1"));
        }
        if self.executor.max_pool_size == 0 {
            return Err(invalid("executor.max_pool_size", "must be greater than 0"));
        }
        if self.executor.core_pool_size > self.executor.max_pool_size {
            return Err(invalid(
                "executor.core_pool_size",
                "must not exceed executor.max_pool_size",
            ));
        }
        if self.executor.queue_capacity == 0 {
            return Err(invalid("executor.queue_capacity", "must be greater than 0"));
        }
        if self.policy.reload_enabled && self.policy.check_interval_ms == 0 {
            return Err(invalid(
                "policy.check_interval_ms",
                "must be greater than 0 when reload is enabled",
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigurationError {
    ConfigurationError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
