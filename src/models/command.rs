//! # Command Record
//!
//! One remote execution attempt, from admission to terminal outcome. State
//! changes go through the named transition operations below; each checks the
//! current state as a precondition and returns `StateMachineError` without
//! touching the record when the transition is illegal. Once a terminal state
//! is reached the record is immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state_machine::{CommandState, StateMachineError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Assigned by the repository on first save
    pub id: Option<i64>,
    pub target_host: String,
    pub command_text: String,
    pub status: CommandState,
    /// Captured stdout (stderr-merged); set only on success
    pub result: Option<String>,
    /// Set only on failure or timeout
    pub error_message: Option<String>,
    /// Whatever the remote shell reported; `None` means unknown, not failure
    pub exit_code: Option<i32>,
    /// Identity of the submitter
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Derived, never set directly; present once executed and completed exist
    pub duration_ms: Option<i64>,
}

impl Command {
    /// Create a new command record in PENDING
    pub fn create(target_host: impl Into<String>, command_text: impl Into<String>, requested_by: impl Into<String>) -> Self {
        Self {
            id: None,
            target_host: target_host.into(),
            command_text: command_text.into(),
            status: CommandState::Pending,
            result: None,
            error_message: None,
            exit_code: None,
            requested_by: requested_by.into(),
            created_at: Utc::now(),
            executed_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// Transition PENDING -> EXECUTING and stamp the execution time
    pub fn mark_executing(&mut self) -> Result<(), StateMachineError> {
        if self.status != CommandState::Pending {
            return Err(StateMachineError::invalid(
                self.status,
                "mark_executing",
                CommandState::Pending,
            ));
        }
        self.status = CommandState::Executing;
        self.executed_at = Some(Utc::now());
        Ok(())
    }

    /// Transition EXECUTING -> SUCCESS, storing the captured output and exit code
    pub fn mark_success(
        &mut self,
        result: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Result<(), StateMachineError> {
        self.require_executing("mark_success")?;
        self.status = CommandState::Success;
        self.result = Some(result.into());
        self.exit_code = exit_code;
        self.completed_at = Some(Utc::now());
        self.calculate_duration();
        Ok(())
    }

    /// Transition EXECUTING -> FAILED with a human-readable message
    pub fn mark_failed(&mut self, error_message: impl Into<String>) -> Result<(), StateMachineError> {
        self.require_executing("mark_failed")?;
        self.status = CommandState::Failed;
        self.error_message = Some(error_message.into());
        self.completed_at = Some(Utc::now());
        self.calculate_duration();
        Ok(())
    }

    /// Transition EXECUTING -> TIMEOUT
    pub fn mark_timeout(&mut self) -> Result<(), StateMachineError> {
        self.require_executing("mark_timeout")?;
        self.status = CommandState::Timeout;
        self.error_message = Some("Command execution timeout".to_string());
        self.completed_at = Some(Utc::now());
        self.calculate_duration();
        Ok(())
    }

    /// Check if the command reached a terminal state
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    /// Check if the command completed successfully
    pub fn is_success(&self) -> bool {
        self.status == CommandState::Success
    }

    fn require_executing(&self, operation: &'static str) -> Result<(), StateMachineError> {
        if self.status != CommandState::Executing {
            return Err(StateMachineError::invalid(
                self.status,
                operation,
                CommandState::Executing,
            ));
        }
        Ok(())
    }

    fn calculate_duration(&mut self) {
        if let (Some(executed), Some(completed)) = (self.executed_at, self.completed_at) {
            self.duration_ms = Some((completed - executed).num_milliseconds());
        }
    }
}
