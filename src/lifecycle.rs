//! # Command Lifecycle
//!
//! Orchestrates a command from admission to terminal state. The submission
//! path is synchronous and fast: validate against policy, persist a PENDING
//! record, hand the work to the dispatcher, return the assigned id. A spawned
//! completion task applies the eventual [`ExecutionResult`] to the record, so
//! every accepted command ends in SUCCESS, FAILED, or TIMEOUT even when the
//! worker side misbehaves.

use std::sync::Arc;
use tracing::error;

use crate::dispatcher::{Dispatcher, DispatcherError, ExecutionRequest};
use crate::logging::log_command_operation;
use crate::models::Command;
use crate::policy::CommandValidator;
use crate::repository::{CommandRepository, RepositoryError};
use crate::state_machine::{CommandState, StateMachineError};
use crate::transport::ExecutionResult;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Admission rejection; no record was created
    #[error("command rejected: {reason}")]
    Rejected { reason: String },

    #[error(transparent)]
    Dispatch(#[from] DispatcherError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    StateMachine(#[from] StateMachineError),
}

#[derive(Clone)]
pub struct CommandLifecycle {
    repository: Arc<dyn CommandRepository>,
    validator: CommandValidator,
    dispatcher: Arc<Dispatcher>,
}

impl CommandLifecycle {
    pub fn new(
        repository: Arc<dyn CommandRepository>,
        validator: CommandValidator,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            repository,
            validator,
            dispatcher,
        }
    }

    /// Admit, persist, and dispatch one command; returns the assigned id.
    ///
    /// Rejections and saturation are synchronous. A rejected command leaves no
    /// record; a saturated one is persisted as FAILED so the refusal is
    /// queryable afterwards.
    pub async fn submit_command(
        &self,
        target_host: &str,
        command_text: &str,
        requested_by: &str,
    ) -> Result<i64, SubmitError> {
        let verdict = self.validator.validate(command_text);
        if !verdict.is_allowed() {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "command rejected".to_string());
            log_command_operation(
                "submit",
                None,
                Some(target_host),
                "rejected",
                Some(&reason),
            );
            return Err(SubmitError::Rejected { reason });
        }

        let command = Command::create(target_host, command_text.trim(), requested_by);
        let saved = self.repository.save(command).await?;
        let command_id = saved
            .id
            .ok_or_else(|| RepositoryError::Storage("save returned a record without an id".to_string()))?;

        let request = ExecutionRequest {
            command_id,
            target_host: saved.target_host.clone(),
            command_text: saved.command_text.clone(),
            requested_by: saved.requested_by.clone(),
        };

        let receiver = match self.dispatcher.execute(request) {
            Ok(receiver) => receiver,
            Err(e) => {
                // The record already exists; close it out as FAILED before
                // surfacing the backpressure to the caller.
                let mut record = saved;
                record.mark_executing()?;
                record.mark_failed("worker pool saturated")?;
                self.repository.save(record).await?;
                log_command_operation(
                    "submit",
                    Some(command_id),
                    Some(target_host),
                    "saturated",
                    None,
                );
                return Err(e.into());
            }
        };

        log_command_operation("submit", Some(command_id), Some(target_host), "accepted", None);

        let lifecycle = self.clone();
        tokio::spawn(async move {
            let result = match receiver.await {
                Ok(result) => result,
                // Worker task died without reporting; do not leave the record
                // stuck in a non-terminal state.
                Err(_) => ExecutionResult::failure("execution worker dropped the completion channel"),
            };
            lifecycle.apply_result(command_id, result).await;
        });

        Ok(command_id)
    }

    /// Apply a terminal execution result to the persisted record
    async fn apply_result(&self, command_id: i64, result: ExecutionResult) {
        if let Err(e) = self.finish_command(command_id, &result).await {
            error!(command_id, error = %e, "failed to record execution outcome");
        }
    }

    async fn finish_command(
        &self,
        command_id: i64,
        result: &ExecutionResult,
    ) -> Result<(), SubmitError> {
        let mut command = self
            .repository
            .find_by_id(command_id)
            .await?
            .ok_or(RepositoryError::NotFound { id: command_id })?;

        if command.status == CommandState::Pending {
            command.mark_executing()?;
        }

        if result.success {
            command.mark_success(result.merged_output(), result.exit_code)?;
        } else if result.timed_out {
            command.mark_timeout()?;
        } else {
            let message = result
                .error_message
                .clone()
                .unwrap_or_else(|| "execution failed".to_string());
            command.mark_failed(message)?;
        }

        let status = command.status.to_string();
        let saved = self.repository.save(command).await?;
        log_command_operation(
            "complete",
            saved.id,
            Some(&saved.target_host),
            &status,
            saved.error_message.as_deref(),
        );
        Ok(())
    }

    pub async fn get_command(&self, command_id: i64) -> Result<Command, SubmitError> {
        let command = self
            .repository
            .find_by_id(command_id)
            .await?
            .ok_or(RepositoryError::NotFound { id: command_id })?;
        Ok(command)
    }

    pub async fn commands_by_status(
        &self,
        status: CommandState,
    ) -> Result<Vec<Command>, SubmitError> {
        Ok(self.repository.find_by_status(status).await?)
    }

    pub async fn commands_by_host(&self, host: &str) -> Result<Vec<Command>, SubmitError> {
        Ok(self.repository.find_by_host(host).await?)
    }

    pub async fn commands_in_range(
        &self,
        from: chrono::DateTime<chrono::Utc>,
        to: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Command>, SubmitError> {
        Ok(self.repository.find_in_range(from, to).await?)
    }
}
