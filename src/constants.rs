//! # System Constants
//!
//! Operational defaults for the remote command execution core. Values mirror
//! the shipped configuration files; the config loader falls back to these
//! when a section is omitted.

/// Default SSH port when a credential does not specify one
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default transport connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;

/// Default remote command completion timeout in seconds
pub const DEFAULT_COMMAND_TIMEOUT_SECONDS: u64 = 30;

/// Default maximum connection attempts per execution (first try included)
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default base delay for exponential retry backoff in milliseconds
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;

/// Default number of worker tasks kept alive when idle
pub const DEFAULT_CORE_POOL_SIZE: usize = 5;

/// Default upper bound on concurrent remote sessions
pub const DEFAULT_MAX_POOL_SIZE: usize = 10;

/// Default dispatcher queue capacity; submissions beyond
/// `max_pool_size + queue_capacity` in flight are rejected
pub const DEFAULT_QUEUE_CAPACITY: usize = 25;

/// Default interval between policy source change checks in milliseconds
pub const DEFAULT_POLICY_CHECK_INTERVAL_MS: u64 = 5000;

/// Default allow-pattern file path
pub const DEFAULT_ALLOW_PATTERNS_PATH: &str = "config/policy/allow.patterns";

/// Default deny-pattern file path
pub const DEFAULT_DENY_PATTERNS_PATH: &str = "config/policy/deny.patterns";

/// Marker inserted between stdout and stderr in a merged success result
pub const STDERR_MARKER: &str = "\n[STDERR]\n";
