//! Data model layer: the command record and the host credential entity.

pub mod command;
pub mod credential;

pub use command::Command;
pub use credential::HostCredential;
