//! # Execution Dispatcher
//!
//! Bounded async worker pool between command admission and the transport.
//! Accepted work goes through a fixed-capacity queue consumed by a fixed set
//! of permanent worker tasks, so at most `max_pool_size` sessions are open
//! concurrently and at most `queue_capacity` requests wait behind them. When
//! both are full, submission fails fast with [`DispatcherError::Saturated`]
//! instead of buffering without bound.
//!
//! Each accepted request gets a oneshot completion channel that receives
//! exactly one terminal [`ExecutionResult`], whatever happens inside the
//! worker, including a panic in the unit of work.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ExecutorConfig, SshConfig};
use crate::credentials::CredentialStore;
use crate::secrets::SecretCodec;
use crate::transport::{ConnectionParameters, ExecutionResult, RemoteSession};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatcherError {
    /// Queue and workers are both full; the caller should surface backpressure
    #[error("worker pool saturated: {capacity} requests already queued")]
    Saturated { capacity: usize },

    /// The dispatcher has been shut down and accepts no further work
    #[error("dispatcher is shut down")]
    ShutDown,
}

/// One admitted command, ready for remote execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub command_id: i64,
    pub target_host: String,
    pub command_text: String,
    pub requested_by: String,
}

struct WorkItem {
    request: ExecutionRequest,
    completion: oneshot::Sender<ExecutionResult>,
}

/// Shared collaborators for the unit of work
struct WorkerContext {
    credentials: Arc<dyn CredentialStore>,
    secrets: Arc<dyn SecretCodec>,
    session: Arc<dyn RemoteSession>,
    ssh: SshConfig,
}

pub struct Dispatcher {
    queue: mpsc::Sender<WorkItem>,
    queue_capacity: usize,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Start the worker pool. Workers are permanent tasks; `core_pool_size`
    /// has no scaling effect here and is logged for operational parity.
    pub fn start(
        executor: &ExecutorConfig,
        ssh: SshConfig,
        credentials: Arc<dyn CredentialStore>,
        secrets: Arc<dyn SecretCodec>,
        session: Arc<dyn RemoteSession>,
    ) -> Self {
        let worker_count = executor.max_pool_size.max(1);
        let queue_capacity = executor.queue_capacity.max(1);

        let (tx, rx) = mpsc::channel::<WorkItem>(queue_capacity);
        let shared_rx = Arc::new(Mutex::new(rx));
        let context = Arc::new(WorkerContext {
            credentials,
            secrets,
            session,
            ssh,
        });

        let workers = (0..worker_count)
            .map(|worker_id| {
                let rx = Arc::clone(&shared_rx);
                let ctx = Arc::clone(&context);
                tokio::spawn(run_worker(worker_id, rx, ctx))
            })
            .collect();

        info!(
            core_pool_size = executor.core_pool_size,
            max_pool_size = worker_count,
            queue_capacity,
            "execution dispatcher started"
        );

        Self {
            queue: tx,
            queue_capacity,
            workers,
        }
    }

    /// Enqueue a request without blocking. On acceptance the returned channel
    /// resolves with the terminal result once a worker finishes the work.
    pub fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<oneshot::Receiver<ExecutionResult>, DispatcherError> {
        let (completion, receiver) = oneshot::channel();
        self.queue
            .try_send(WorkItem {
                request,
                completion,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DispatcherError::Saturated {
                    capacity: self.queue_capacity,
                },
                mpsc::error::TrySendError::Closed(_) => DispatcherError::ShutDown,
            })?;
        Ok(receiver)
    }

    /// Stop accepting work and wait for in-flight executions to drain
    pub async fn shutdown(self) {
        drop(self.queue);
        for worker in self.workers {
            if let Err(e) = worker.await {
                error!(error = %e, "dispatcher worker terminated abnormally");
            }
        }
        info!("execution dispatcher shut down");
    }
}

async fn run_worker(worker_id: usize, queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>, ctx: Arc<WorkerContext>) {
    debug!(worker_id, "dispatcher worker started");
    loop {
        // Lock held only while waiting for the next item, not while working.
        let item = queue.lock().await.recv().await;
        let Some(WorkItem {
            request,
            completion,
        }) = item
        else {
            break;
        };

        let command_id = request.command_id;
        let result = match AssertUnwindSafe(process_request(&ctx, &request))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                error!(worker_id, command_id, "execution unit of work panicked");
                ExecutionResult::failure(format!(
                    "internal execution failure: {}",
                    panic_message(panic.as_ref())
                ))
            }
        };

        if completion.send(result).is_err() {
            warn!(worker_id, command_id, "completion receiver dropped before delivery");
        }
    }
    debug!(worker_id, "dispatcher worker stopped");
}

/// Credential lookup, secret decryption, remote execution. Every failure
/// becomes a terminal result; nothing here escapes as a panic or error.
async fn process_request(ctx: &WorkerContext, request: &ExecutionRequest) -> ExecutionResult {
    info!(
        command_id = request.command_id,
        target_host = %request.target_host,
        requested_by = %request.requested_by,
        "executing remote command"
    );

    let Some(credential) = ctx.credentials.find_by_host(&request.target_host).await else {
        return ExecutionResult::failure(format!(
            "no credential registered for host: {}",
            request.target_host
        ));
    };
    if !credential.is_active() {
        return ExecutionResult::failure(format!(
            "host credential is deactivated: {}",
            request.target_host
        ));
    }

    let secret = match ctx.secrets.decrypt(&credential.encrypted_secret) {
        Ok(secret) => secret,
        Err(e) => {
            error!(
                command_id = request.command_id,
                target_host = %request.target_host,
                error = %e,
                "credential secret could not be decrypted"
            );
            return ExecutionResult::failure(format!("credential decryption failed: {e}"));
        }
    };

    let params = ConnectionParameters::new(
        credential.host.clone(),
        credential.port,
        credential.username.clone(),
        secret,
        Duration::from_secs(ctx.ssh.connect_timeout_seconds),
        Duration::from_secs(ctx.ssh.command_timeout_seconds),
    );

    let result = ctx.session.execute(&params, &request.command_text).await;
    if result.success {
        ctx.credentials.touch_connected(&request.target_host).await;
    }
    result
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialStore, InMemoryCredentialStore};
    use crate::models::HostCredential;
    use crate::secrets::{Base64SecretCodec, SecretCodec};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Session double that records calls and can block until released
    struct StubSession {
        calls: AtomicUsize,
        started: Notify,
        release: Notify,
        block: bool,
        panic: bool,
    }

    impl StubSession {
        fn immediate() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                started: Notify::new(),
                release: Notify::new(),
                block: false,
                panic: false,
            }
        }

        fn blocking() -> Self {
            Self {
                block: true,
                ..Self::immediate()
            }
        }

        fn panicking() -> Self {
            Self {
                panic: true,
                ..Self::immediate()
            }
        }
    }

    #[async_trait]
    impl RemoteSession for StubSession {
        async fn execute(&self, _params: &ConnectionParameters, command: &str) -> ExecutionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            if self.panic {
                panic!("stub session blew up");
            }
            if self.block {
                self.release.notified().await;
            }
            ExecutionResult::success(format!("ran: {command}\n"), String::new(), Some(0))
        }

        async fn test_connection(&self, _params: &ConnectionParameters) -> bool {
            true
        }
    }

    async fn store_with_host(host: &str) -> Arc<InMemoryCredentialStore> {
        let codec = Base64SecretCodec::new();
        let store = Arc::new(InMemoryCredentialStore::new());
        store
            .save(HostCredential::create(
                host,
                None,
                "deploy",
                codec.encrypt("key-material").unwrap(),
                None,
            ))
            .await;
        store
    }

    fn dispatcher_with(
        executor: ExecutorConfig,
        credentials: Arc<InMemoryCredentialStore>,
        session: Arc<StubSession>,
    ) -> Dispatcher {
        Dispatcher::start(
            &executor,
            SshConfig::default(),
            credentials,
            Arc::new(Base64SecretCodec::new()),
            session,
        )
    }

    fn request(id: i64, host: &str) -> ExecutionRequest {
        ExecutionRequest {
            command_id: id,
            target_host: host.to_string(),
            command_text: "uptime".to_string(),
            requested_by: "client-test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_execution_delivers_result_and_touches_credential() {
        let credentials = store_with_host("web-01").await;
        let session = Arc::new(StubSession::immediate());
        let dispatcher = dispatcher_with(ExecutorConfig::default(), credentials.clone(), session);

        let receiver = dispatcher.execute(request(1, "web-01")).unwrap();
        let result = receiver.await.unwrap();

        assert!(result.success);
        assert_eq!(result.stdout, "ran: uptime\n");
        let touched = credentials.find_by_host("web-01").await.unwrap();
        assert!(touched.last_connected_at.is_some());
    }

    #[tokio::test]
    async fn test_missing_credential_fails_without_session_call() {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let session = Arc::new(StubSession::immediate());
        let dispatcher =
            dispatcher_with(ExecutorConfig::default(), credentials, session.clone());

        let result = dispatcher.execute(request(1, "ghost")).unwrap().await.unwrap();

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("no credential registered"));
        assert_eq!(session.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deactivated_credential_fails_without_session_call() {
        let codec = Base64SecretCodec::new();
        let credentials = Arc::new(InMemoryCredentialStore::new());
        let mut credential = HostCredential::create(
            "web-01",
            None,
            "deploy",
            codec.encrypt("key-material").unwrap(),
            None,
        );
        credential.deactivate();
        credentials.save(credential).await;

        let session = Arc::new(StubSession::immediate());
        let dispatcher =
            dispatcher_with(ExecutorConfig::default(), credentials, session.clone());

        let result = dispatcher.execute(request(1, "web-01")).unwrap().await.unwrap();

        assert!(!result.success);
        assert!(result.error_message.as_deref().unwrap().contains("deactivated"));
        assert_eq!(session.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_undecryptable_secret_fails() {
        let credentials = Arc::new(InMemoryCredentialStore::new());
        credentials
            .save(HostCredential::create("web-01", None, "deploy", "not-encoded", None))
            .await;
        let session = Arc::new(StubSession::immediate());
        let dispatcher =
            dispatcher_with(ExecutorConfig::default(), credentials, session.clone());

        let result = dispatcher.execute(request(1, "web-01")).unwrap().await.unwrap();

        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("decryption failed"));
        assert_eq!(session.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_saturation_rejects_beyond_workers_plus_queue() {
        let credentials = store_with_host("web-01").await;
        let session = Arc::new(StubSession::blocking());
        let executor = ExecutorConfig {
            core_pool_size: 1,
            max_pool_size: 1,
            queue_capacity: 1,
        };
        let dispatcher = dispatcher_with(executor, credentials, session.clone());

        // First request occupies the single worker.
        let first = dispatcher.execute(request(1, "web-01")).unwrap();
        session.started.notified().await;

        // Second fills the queue; third must be rejected.
        let _second = dispatcher.execute(request(2, "web-01")).unwrap();
        let err = dispatcher.execute(request(3, "web-01")).unwrap_err();
        assert_eq!(err, DispatcherError::Saturated { capacity: 1 });

        session.release.notify_one();
        session.release.notify_one();
        assert!(first.await.unwrap().success);
    }

    #[tokio::test]
    async fn test_worker_panic_becomes_failure_result() {
        let credentials = store_with_host("web-01").await;
        let session = Arc::new(StubSession::panicking());
        let dispatcher = dispatcher_with(ExecutorConfig::default(), credentials, session);

        let result = dispatcher.execute(request(1, "web-01")).unwrap().await.unwrap();

        assert!(!result.success);
        let message = result.error_message.unwrap();
        assert!(message.contains("internal execution failure"));
        assert!(message.contains("stub session blew up"));

        // The pool survives the panic and keeps serving work.
        let err_free = dispatcher.execute(request(2, "web-01")).unwrap();
        assert!(!err_free.await.unwrap().success);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_rejects_new_work() {
        let credentials = store_with_host("web-01").await;
        let session = Arc::new(StubSession::immediate());
        let dispatcher = dispatcher_with(ExecutorConfig::default(), credentials, session);

        let receiver = dispatcher.execute(request(1, "web-01")).unwrap();
        dispatcher.shutdown().await;
        assert!(receiver.await.unwrap().success);
    }
}
