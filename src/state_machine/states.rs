use serde::{Deserialize, Serialize};
use std::fmt;

/// Command lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandState {
    /// Initial state when the command record is created
    Pending,
    /// Command is currently running on the remote host
    Executing,
    /// Remote execution finished and reported back
    Success,
    /// Execution failed (admission was already passed; this is a runtime failure)
    Failed,
    /// Execution exceeded the command timeout
    Timeout,
}

impl CommandState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Timeout)
    }

    /// Check if the command is currently being processed
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Executing)
    }
}

impl fmt::Display for CommandState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Executing => write!(f, "executing"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl std::str::FromStr for CommandState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "executing" => Ok(Self::Executing),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "timeout" => Ok(Self::Timeout),
            _ => Err(format!("Invalid command state: {s}")),
        }
    }
}

impl Default for CommandState {
    fn default() -> Self {
        Self::Pending
    }
}
