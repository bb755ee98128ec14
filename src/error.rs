//! Crate-level error taxonomy.
//!
//! Each component defines its own error enum next to its implementation;
//! this module rolls them up into a single crate error for callers that
//! work across component boundaries.

use crate::config::ConfigurationError;
use crate::dispatcher::DispatcherError;
use crate::lifecycle::SubmitError;
use crate::repository::RepositoryError;
use crate::secrets::SecretError;
use crate::state_machine::StateMachineError;
use crate::transport::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum RcmdError {
    #[error(transparent)]
    StateMachine(#[from] StateMachineError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Dispatcher(#[from] DispatcherError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

pub type Result<T> = std::result::Result<T, RcmdError>;
