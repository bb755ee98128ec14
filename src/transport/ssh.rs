//! # SSH Session
//!
//! Production [`RemoteSession`] implementation driving the system `ssh`
//! binary. Each attempt materializes the decrypted secret as a private-key
//! file readable only by the current user, spawns `ssh` in batch mode with
//! the configured connect timeout, and bounds the remote command with the
//! command timeout (an overrun kills the child). The key file and the child
//! process are cleaned up on every exit path.
//!
//! `ssh` reserves exit status 255 for its own failures; those are classified
//! into authentication (fatal) versus connection (retryable) by stderr.
//! Any other exit status, zero or not, is a completed remote execution whose
//! exit code is simply recorded.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use super::retry::{run_with_retry, RetryPolicy};
use super::{ConnectionParameters, ExecutionResult, RemoteSession, SessionError, SessionOutput};
use crate::config::SshConfig;
use crate::constants::DEFAULT_SSH_PORT;

/// stderr fragments that mark a credential/permission rejection
const AUTH_ERROR_PATTERNS: &[&str] = &[
    "permission denied",
    "authentication failed",
    "too many authentication failures",
    "no supported authentication",
    "host key verification failed",
];

pub struct SshSession {
    retry: RetryPolicy,
    /// Host-key verification is relaxed by default, matching the original
    /// deployment posture; production operators should pin known hosts.
    strict_host_key_checking: bool,
}

impl SshSession {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            strict_host_key_checking: false,
        }
    }

    pub fn from_config(config: &SshConfig) -> Self {
        Self::new(RetryPolicy::new(
            config.retry.max_attempts,
            std::time::Duration::from_millis(config.retry.backoff_ms),
        ))
    }

    pub fn with_strict_host_key_checking(mut self, strict: bool) -> Self {
        self.strict_host_key_checking = strict;
        self
    }

    fn build_args(
        &self,
        params: &ConnectionParameters,
        identity_path: &str,
        command: &str,
    ) -> Vec<String> {
        let mut args = vec!["-i".to_string(), identity_path.to_string()];

        if params.port != DEFAULT_SSH_PORT {
            args.push("-p".to_string());
            args.push(params.port.to_string());
        }

        let strict = if self.strict_host_key_checking {
            "yes"
        } else {
            "no"
        };
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", params.connect_timeout.as_secs()),
            "-o".to_string(),
            format!("StrictHostKeyChecking={strict}"),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", params.username, params.host));
        args.push(command.to_string());
        args
    }

    async fn execute_once(
        &self,
        params: &ConnectionParameters,
        command: &str,
        attempt: u32,
    ) -> Result<SessionOutput, SessionError> {
        // Dropped at the end of the attempt on every path, which removes the file.
        let identity = write_identity_file(params.secret())?;
        let identity_path = identity.path().display().to_string();

        debug!(
            host = %params.host,
            port = params.port,
            attempt,
            "opening ssh session"
        );

        let child = Command::new("ssh")
            .args(self.build_args(params, &identity_path, command))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SessionError::Transport(format!("failed to spawn ssh: {e}")))?;

        let output = match tokio::time::timeout(params.command_timeout, child.wait_with_output())
            .await
        {
            // Dropping the wait future kills the child via kill_on_drop.
            Err(_) => {
                return Err(SessionError::CommandTimeout(
                    params.command_timeout.as_secs(),
                ))
            }
            Ok(Err(e)) => return Err(SessionError::Transport(e.to_string())),
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code();

        if exit_code == Some(255) {
            return Err(classify_connection_failure(&stderr));
        }

        debug!(host = %params.host, exit_code, "remote command completed");
        Ok(SessionOutput {
            stdout,
            stderr,
            exit_code,
        })
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(&self, params: &ConnectionParameters, command: &str) -> ExecutionResult {
        match run_with_retry(&self.retry, |attempt| {
            self.execute_once(params, command, attempt)
        })
        .await
        {
            Ok(output) => {
                info!(host = %params.host, exit_code = output.exit_code, "remote execution succeeded");
                ExecutionResult::success(output.stdout, output.stderr, output.exit_code)
            }
            Err(error) => {
                info!(host = %params.host, error = %error, "remote execution failed");
                ExecutionResult::from_session_error(&error)
            }
        }
    }

    /// Single best-effort attempt, no retry loop; used for health checks.
    async fn test_connection(&self, params: &ConnectionParameters) -> bool {
        self.execute_once(params, "exit 0", 1).await.is_ok()
    }
}

/// Sort an ssh exit-255 failure into the retry taxonomy by its stderr.
fn classify_connection_failure(stderr: &str) -> SessionError {
    let lowered = stderr.to_lowercase();
    let summary = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("connection failed")
        .to_string();

    if AUTH_ERROR_PATTERNS.iter().any(|p| lowered.contains(p)) {
        SessionError::Authentication(summary)
    } else {
        SessionError::Connection(summary)
    }
}

/// Write the key material to a file only the current user can read.
fn write_identity_file(secret: &str) -> Result<tempfile::NamedTempFile, SessionError> {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new()
        .map_err(|e| SessionError::Transport(format!("failed to create identity file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))
            .map_err(|e| SessionError::Transport(format!("failed to restrict identity file: {e}")))?;
    }

    file.write_all(secret.as_bytes())
        .and_then(|()| {
            if secret.ends_with('\n') {
                Ok(())
            } else {
                file.write_all(b"\n")
            }
        })
        .map_err(|e| SessionError::Transport(format!("failed to write identity file: {e}")))?;

    Ok(file)
}
