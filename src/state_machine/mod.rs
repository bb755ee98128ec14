// State machine module for the command lifecycle
//
// Commands move PENDING -> EXECUTING -> {SUCCESS | FAILED | TIMEOUT}. The
// transitions themselves live on the `Command` entity as precondition-checked
// operations; this module owns the state definitions and transition errors.

pub mod errors;
pub mod states;

pub use errors::StateMachineError;
pub use states::CommandState;
