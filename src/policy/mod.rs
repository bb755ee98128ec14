//! # Command Admission Policy
//!
//! Pattern-based allow/deny admission control. The store publishes immutable
//! snapshots of compiled pattern sets and supports hot reload from the
//! backing files without blocking readers; the validator makes the
//! admission decision for a single command string.

pub mod store;
pub mod validator;

pub use store::{spawn_reload_task, PolicySnapshot, PolicyStore};
pub use validator::{CommandValidator, ValidationResult};
