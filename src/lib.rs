//! # rcmd-core
//!
//! Core of a remote command execution service: policy-based admission
//! control with hot reload, a guarded command lifecycle state machine, a
//! bounded async dispatcher, and an SSH transport with a retry/backoff
//! connection protocol.
//!
//! ## Architecture
//!
//! ```text
//! submit_command
//!     │
//!     ▼
//! CommandValidator ──rejected──▶ synchronous error, no record
//!     │ allowed
//!     ▼
//! CommandRepository (PENDING record, id assigned)
//!     │
//!     ▼
//! Dispatcher ──saturated──▶ record FAILED, synchronous error
//!     │ queued
//!     ▼
//! worker: CredentialStore → SecretCodec → RemoteSession (retry/backoff)
//!     │
//!     ▼
//! completion task: EXECUTING → SUCCESS | FAILED | TIMEOUT
//! ```
//!
//! Persistence, credential storage, and secret handling are collaborator
//! traits with in-memory/development implementations; deployments supply
//! their own behind the same contracts.

pub mod admin;
pub mod config;
pub mod constants;
pub mod credentials;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod policy;
pub mod repository;
pub mod secrets;
pub mod state_machine;
pub mod transport;

pub use admin::AdminKeyService;
pub use config::{ConfigManager, RcmdConfig};
pub use dispatcher::{Dispatcher, DispatcherError, ExecutionRequest};
pub use error::{RcmdError, Result};
pub use lifecycle::{CommandLifecycle, SubmitError};
pub use models::{Command, HostCredential};
pub use policy::{CommandValidator, PolicyStore, ValidationResult};
pub use repository::{CommandRepository, InMemoryCommandRepository};
pub use state_machine::{CommandState, StateMachineError};
pub use transport::{ExecutionResult, RemoteSession, RetryPolicy, SshSession};
