//! # Remote Execution Transport
//!
//! The seam between the dispatcher and the machinery that actually runs a
//! command on a remote host. [`RemoteSession`] is the contract; [`SshSession`]
//! is the production implementation driving the system `ssh` binary. The
//! connection/retry protocol lives in [`retry`].

pub mod retry;
pub mod ssh;

use async_trait::async_trait;
use std::time::Duration;

pub use retry::RetryPolicy;
pub use ssh::SshSession;

use crate::constants::STDERR_MARKER;

/// Connection material for one execution attempt.
///
/// Built per attempt from a credential lookup; never persisted. The secret
/// is excluded from `Debug` output and only readable inside the transport.
#[derive(Clone)]
pub struct ConnectionParameters {
    pub host: String,
    pub port: u16,
    pub username: String,
    secret: String,
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
}

impl ConnectionParameters {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        secret: impl Into<String>,
        connect_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            secret: secret.into(),
            connect_timeout,
            command_timeout,
        }
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Raw output of one successful session attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the session closed before the remote shell reported a code
    pub exit_code: Option<i32>,
}

/// Session failures, split along the retry boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Connectivity-level failure; worth another attempt
    #[error("connection failed: {0}")]
    Connection(String),

    /// Credential or permission rejection; retrying cannot help
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The remote command did not complete within the command timeout
    #[error("command timed out after {0} seconds")]
    CommandTimeout(u64),

    /// Local transport fault (spawn failure, broken pipe, I/O error)
    #[error("transport error: {0}")]
    Transport(String),

    /// The bounded retry loop ran out of attempts
    #[error("max retry attempts exceeded after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Whether another connection attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::CommandTimeout(_) | Self::Transport(_) => true,
            Self::Authentication(_) | Self::RetriesExhausted { .. } => false,
        }
    }

    /// Whether the underlying failure was a command timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::CommandTimeout(_) => true,
            Self::RetriesExhausted { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}

/// Terminal outcome of a remote execution, as reported to the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    /// Present only on success, and then only if the remote shell reported one
    pub exit_code: Option<i32>,
    /// Present only on failure
    pub error_message: Option<String>,
    /// Distinguishes TIMEOUT from FAILED at the lifecycle boundary
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn success(stdout: String, stderr: String, exit_code: Option<i32>) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            exit_code,
            error_message: None,
            timed_out: false,
        }
    }

    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            error_message: Some(error_message.into()),
            timed_out: false,
        }
    }

    pub fn from_session_error(error: &SessionError) -> Self {
        Self {
            timed_out: error.is_timeout(),
            ..Self::failure(error.to_string())
        }
    }

    /// Stdout with stderr appended under a marker, as stored on the record
    pub fn merged_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}{}{}", self.stdout, STDERR_MARKER, self.stderr)
        }
    }
}

/// Contract for opening a session to a remote host and running one command.
///
/// `execute` owns the full connection/retry protocol and always returns a
/// terminal [`ExecutionResult`]; `test_connection` is a single best-effort
/// attempt used for health checks, never for command execution.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn execute(&self, params: &ConnectionParameters, command: &str) -> ExecutionResult;

    async fn test_connection(&self, params: &ConnectionParameters) -> bool;
}
