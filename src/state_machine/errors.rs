use super::states::CommandState;

/// Errors raised by lifecycle transition operations.
///
/// An invalid transition signals a programming or race defect, not a normal
/// flow branch: the record is left unchanged and the caller is expected to
/// surface the error loudly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    #[error("cannot apply {operation} in {from} state, expected {expected}")]
    InvalidTransition {
        from: CommandState,
        operation: &'static str,
        expected: CommandState,
    },
}

impl StateMachineError {
    pub(crate) fn invalid(
        from: CommandState,
        operation: &'static str,
        expected: CommandState,
    ) -> Self {
        Self::InvalidTransition {
            from,
            operation,
            expected,
        }
    }
}
