//! End-to-end pipeline tests: policy admission, persistence, dispatch, and
//! terminal state application, with the transport replaced by a scripted
//! session double.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;

use rcmd_core::config::{ExecutorConfig, SshConfig};
use rcmd_core::credentials::{CredentialStore, InMemoryCredentialStore};
use rcmd_core::dispatcher::DispatcherError;
use rcmd_core::lifecycle::SubmitError;
use rcmd_core::policy::PolicyStore;
use rcmd_core::secrets::{Base64SecretCodec, SecretCodec};
use rcmd_core::transport::ConnectionParameters;
use rcmd_core::{
    Command, CommandLifecycle, CommandRepository, CommandState, CommandValidator, Dispatcher,
    ExecutionResult, HostCredential, InMemoryCommandRepository, RemoteSession,
};

/// Session double returning a fixed result; optionally blocks until released
struct ScriptedSession {
    result: ExecutionResult,
    started: Notify,
    release: Notify,
    block: bool,
}

impl ScriptedSession {
    fn returning(result: ExecutionResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            started: Notify::new(),
            release: Notify::new(),
            block: false,
        })
    }

    fn blocking(result: ExecutionResult) -> Arc<Self> {
        Arc::new(Self {
            result,
            started: Notify::new(),
            release: Notify::new(),
            block: true,
        })
    }
}

#[async_trait]
impl RemoteSession for ScriptedSession {
    async fn execute(&self, _params: &ConnectionParameters, _command: &str) -> ExecutionResult {
        self.started.notify_one();
        if self.block {
            self.release.notified().await;
        }
        self.result.clone()
    }

    async fn test_connection(&self, _params: &ConnectionParameters) -> bool {
        true
    }
}

struct Pipeline {
    lifecycle: CommandLifecycle,
    repository: Arc<InMemoryCommandRepository>,
    policy: Arc<PolicyStore>,
    allow_path: PathBuf,
    _policy_dir: tempfile::TempDir,
}

fn write_patterns(path: &PathBuf, patterns: &[&str]) {
    let mut file = std::fs::File::create(path).unwrap();
    for pattern in patterns {
        writeln!(file, "{pattern}").unwrap();
    }
}

async fn pipeline_with(
    session: Arc<ScriptedSession>,
    executor: ExecutorConfig,
    register_credential: bool,
) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let allow_path = dir.path().join("allow.patterns");
    let deny_path = dir.path().join("deny.patterns");
    write_patterns(&allow_path, &["^uptime$", "^ls .*$", "^df -h$"]);
    write_patterns(&deny_path, &[".*rm -rf.*"]);

    let policy = PolicyStore::load(allow_path.clone(), deny_path);
    let validator = CommandValidator::new(policy.clone());

    let codec = Base64SecretCodec::new();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    if register_credential {
        credentials
            .save(HostCredential::create(
                "web-01",
                None,
                "deploy",
                codec.encrypt("key-material").unwrap(),
                None,
            ))
            .await;
    }

    let dispatcher = Arc::new(Dispatcher::start(
        &executor,
        SshConfig::default(),
        credentials,
        Arc::new(codec),
        session,
    ));

    let repository = Arc::new(InMemoryCommandRepository::new());
    Pipeline {
        lifecycle: CommandLifecycle::new(repository.clone(), validator, dispatcher),
        repository,
        policy,
        allow_path,
        _policy_dir: dir,
    }
}

async fn wait_terminal(repository: &InMemoryCommandRepository, id: i64) -> Command {
    for _ in 0..200 {
        if let Some(command) = repository.find_by_id(id).await.unwrap() {
            if command.is_completed() {
                return command;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("command {id} never reached a terminal state");
}

#[tokio::test]
async fn test_allowed_command_runs_to_success() {
    let session = ScriptedSession::returning(ExecutionResult::success(
        "Filesystem   Size\n".into(),
        String::new(),
        Some(0),
    ));
    let pipeline = pipeline_with(session, ExecutorConfig::default(), true).await;

    let id = pipeline
        .lifecycle
        .submit_command("web-01", "df -h", "client-abc")
        .await
        .unwrap();

    let command = wait_terminal(&pipeline.repository, id).await;
    assert_eq!(command.status, CommandState::Success);
    assert_eq!(command.result.as_deref(), Some("Filesystem   Size\n"));
    assert_eq!(command.requested_by, "client-abc");
    assert!(command.duration_ms.unwrap() >= 0);
}

#[tokio::test]
async fn test_denied_command_never_reaches_dispatch() {
    let session = ScriptedSession::returning(ExecutionResult::success(
        "ok\n".into(),
        String::new(),
        Some(0),
    ));
    let pipeline = pipeline_with(session, ExecutorConfig::default(), true).await;

    let err = pipeline
        .lifecycle
        .submit_command("web-01", "sudo rm -rf /", "client-abc")
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Rejected { .. }));
    assert!(pipeline
        .repository
        .find_by_host("web-01")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_policy_reload_changes_admission() {
    let session = ScriptedSession::returning(ExecutionResult::success(
        "ok\n".into(),
        String::new(),
        Some(0),
    ));
    let pipeline = pipeline_with(session, ExecutorConfig::default(), true).await;

    let id = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap();
    wait_terminal(&pipeline.repository, id).await;

    // Shrink the allow-list and reload; the same command is now rejected.
    write_patterns(&pipeline.allow_path, &["^df -h$"]);
    pipeline.policy.reload();

    let err = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::Rejected {
            reason: "command not in allow-list".to_string()
        }
    );
}

#[tokio::test]
async fn test_saturation_is_synchronous_and_recorded() {
    let session = ScriptedSession::blocking(ExecutionResult::success(
        "ok\n".into(),
        String::new(),
        Some(0),
    ));
    let executor = ExecutorConfig {
        core_pool_size: 1,
        max_pool_size: 1,
        queue_capacity: 1,
    };
    let pipeline = pipeline_with(session.clone(), executor, true).await;

    let first = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap();
    session.started.notified().await;
    let _second = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap();

    let err = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        SubmitError::Dispatch(DispatcherError::Saturated { capacity: 1 })
    );

    // The refused submission still left a queryable FAILED record.
    let failed = pipeline
        .repository
        .find_by_status(CommandState::Failed)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(
        failed[0].error_message.as_deref(),
        Some("worker pool saturated")
    );

    session.release.notify_one();
    session.release.notify_one();
    wait_terminal(&pipeline.repository, first).await;
}

#[tokio::test]
async fn test_timed_out_execution_ends_in_timeout_state() {
    let session = ScriptedSession::returning(ExecutionResult {
        timed_out: true,
        ..ExecutionResult::failure("command timed out after 30 seconds")
    });
    let pipeline = pipeline_with(session, ExecutorConfig::default(), true).await;

    let id = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap();

    let command = wait_terminal(&pipeline.repository, id).await;
    assert_eq!(command.status, CommandState::Timeout);
    assert_eq!(
        command.error_message.as_deref(),
        Some("Command execution timeout")
    );
}

#[tokio::test]
async fn test_unknown_host_ends_in_failed_state() {
    let session = ScriptedSession::returning(ExecutionResult::success(
        "ok\n".into(),
        String::new(),
        Some(0),
    ));
    let pipeline = pipeline_with(session, ExecutorConfig::default(), false).await;

    let id = pipeline
        .lifecycle
        .submit_command("web-01", "uptime", "client-abc")
        .await
        .unwrap();

    let command = wait_terminal(&pipeline.repository, id).await;
    assert_eq!(command.status, CommandState::Failed);
    assert!(command
        .error_message
        .as_deref()
        .unwrap()
        .contains("no credential registered for host: web-01"));
}
