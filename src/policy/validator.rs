//! # Command Validator
//!
//! Admission decision for a single command string, first match wins:
//!
//! 1. blank input is rejected outright;
//! 2. a full allow-pattern match admits the command;
//! 3. otherwise a full deny-pattern match rejects it;
//! 4. otherwise the command is rejected (default deny).
//!
//! Allow is checked before deny on purpose: operators carve explicit
//! exceptions with allow patterns, and absence from the allow-list is
//! already a rejection. Default deny is the only safe posture for a system
//! that runs arbitrary text as a shell command on a remote machine.

use std::sync::Arc;
use tracing::{debug, warn};

use super::store::PolicyStore;

/// Outcome of an admission check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Classifies command strings as allowed or rejected against the policy store
#[derive(Debug, Clone)]
pub struct CommandValidator {
    store: Arc<PolicyStore>,
}

impl CommandValidator {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    pub fn validate(&self, command: &str) -> ValidationResult {
        let trimmed = command.trim();
        if trimmed.is_empty() {
            return ValidationResult::rejected("empty command");
        }

        let snapshot = self.store.snapshot();

        if let Some(pattern) = snapshot.allow_match(trimmed) {
            debug!(command = %trimmed, pattern = %pattern.raw(), "command allowed by allow-list");
            return ValidationResult::allowed();
        }

        if let Some(pattern) = snapshot.deny_match(trimmed) {
            warn!(command = %trimmed, pattern = %pattern.raw(), "command rejected by deny-list");
            return ValidationResult::rejected(format!(
                "command matches deny pattern: {}",
                pattern.raw()
            ));
        }

        warn!(command = %trimmed, "command rejected, not in allow-list");
        ValidationResult::rejected("command not in allow-list")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn store_with(allow: &[&str], deny: &[&str]) -> (tempfile::TempDir, Arc<PolicyStore>) {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, lines: &[&str]| -> PathBuf {
            let path = dir.path().join(name);
            let mut file = std::fs::File::create(&path).unwrap();
            for line in lines {
                writeln!(file, "{line}").unwrap();
            }
            path
        };
        let allow_path = write("allow.patterns", allow);
        let deny_path = write("deny.patterns", deny);
        let store = PolicyStore::load(allow_path, deny_path);
        (dir, store)
    }

    #[test]
    fn test_empty_and_whitespace_rejected() {
        let (_dir, store) = store_with(&["^ls .*$"], &[]);
        let validator = CommandValidator::new(store);

        assert_eq!(validator.validate(""), ValidationResult::rejected("empty command"));
        assert_eq!(validator.validate("   \t "), ValidationResult::rejected("empty command"));
    }

    #[test]
    fn test_allow_list_admits_and_default_denies() {
        let (_dir, store) = store_with(&["^ls .*$"], &[]);
        let validator = CommandValidator::new(store);

        assert!(validator.validate("ls -la").is_allowed());
        let rejected = validator.validate("rm -rf /");
        assert!(!rejected.is_allowed());
        assert_eq!(rejected.reason.as_deref(), Some("command not in allow-list"));
    }

    #[test]
    fn test_deny_match_reason_identifies_pattern() {
        let (_dir, store) = store_with(&["^ls .*$"], &[".*rm -rf.*"]);
        let validator = CommandValidator::new(store);

        let rejected = validator.validate("sudo rm -rf /var");
        assert!(!rejected.is_allowed());
        assert_eq!(
            rejected.reason.as_deref(),
            Some("command matches deny pattern: .*rm -rf.*")
        );
    }

    #[test]
    fn test_allow_takes_precedence_over_deny() {
        // The same command matches both lists; allow wins by design.
        let (_dir, store) = store_with(&[".*rm -rf.*"], &[".*rm -rf.*"]);
        let validator = CommandValidator::new(store);

        assert!(validator.validate("rm -rf /tmp/scratch").is_allowed());
    }

    #[test]
    fn test_input_is_trimmed_before_matching() {
        let (_dir, store) = store_with(&["^ls -la$"], &[]);
        let validator = CommandValidator::new(store);

        assert!(validator.validate("  ls -la  ").is_allowed());
    }

    #[test]
    fn test_invalid_pattern_does_not_poison_validation() {
        let (_dir, store) = store_with(&["([unclosed", "^uptime$"], &["([also-bad"]);
        let validator = CommandValidator::new(store);

        // The broken patterns were skipped at load; valid ones still apply.
        assert!(validator.validate("uptime").is_allowed());
        assert!(!validator.validate("whoami").is_allowed());
    }
}
