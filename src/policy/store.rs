//! # Policy Store
//!
//! Loads allow/deny pattern lists from newline-separated files and publishes
//! them as an atomically swapped immutable snapshot. Readers clone an `Arc`
//! under a briefly held read lock and keep a consistent pair of sets for the
//! duration of a validation; reload builds the replacement snapshot entirely
//! off-lock and swaps the pointer, so readers are never blocked behind file
//! I/O or regex compilation.
//!
//! File format: one pattern per line, matched against the full command text.
//! Blank lines and `#` comments are ignored; patterns that fail to compile
//! are logged and skipped, never fatal. A missing file is an empty set.

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A pattern as written in the policy file plus its anchored compilation
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: String,
    regex: Regex,
}

impl CompiledPattern {
    fn compile(raw: &str) -> Option<Self> {
        // Anchor so a pattern must cover the full command text, not a substring.
        match Regex::new(&format!("^(?:{raw})$")) {
            Ok(regex) => Some(Self {
                raw: raw.to_string(),
                regex,
            }),
            Err(err) => {
                error!(pattern = %raw, error = %err, "invalid policy pattern skipped");
                None
            }
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn matches(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }
}

/// Immutable allow/deny pair published by the store
#[derive(Debug, Clone, Default)]
pub struct PolicySnapshot {
    allow: Vec<CompiledPattern>,
    deny: Vec<CompiledPattern>,
}

impl PolicySnapshot {
    pub(crate) fn compile<'a>(
        allow_lines: impl IntoIterator<Item = &'a str>,
        deny_lines: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            allow: compile_lines(allow_lines),
            deny: compile_lines(deny_lines),
        }
    }

    /// First allow pattern fully matching the command, if any
    pub fn allow_match(&self, command: &str) -> Option<&CompiledPattern> {
        self.allow.iter().find(|p| p.matches(command))
    }

    /// First deny pattern fully matching the command, if any
    pub fn deny_match(&self, command: &str) -> Option<&CompiledPattern> {
        self.deny.iter().find(|p| p.matches(command))
    }

    pub fn allow_len(&self) -> usize {
        self.allow.len()
    }

    pub fn deny_len(&self) -> usize {
        self.deny.len()
    }
}

fn compile_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Vec<CompiledPattern> {
    lines
        .into_iter()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(CompiledPattern::compile)
        .collect()
}

/// Modification stamps of the backing files at the last load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SourceStamps {
    allow: Option<SystemTime>,
    deny: Option<SystemTime>,
}

/// Hot-reloadable allow/deny pattern store
pub struct PolicyStore {
    allow_path: PathBuf,
    deny_path: PathBuf,
    snapshot: RwLock<Arc<PolicySnapshot>>,
    loaded_stamps: Mutex<SourceStamps>,
}

impl PolicyStore {
    /// Create the store and perform the initial load
    pub fn load(allow_path: impl Into<PathBuf>, deny_path: impl Into<PathBuf>) -> Arc<Self> {
        let store = Arc::new(Self {
            allow_path: allow_path.into(),
            deny_path: deny_path.into(),
            snapshot: RwLock::new(Arc::new(PolicySnapshot::default())),
            loaded_stamps: Mutex::new(SourceStamps::default()),
        });
        store.reload();
        store
    }

    /// Re-read both pattern files and publish a fresh snapshot atomically.
    ///
    /// Readers holding a previous snapshot keep their consistent pair; the
    /// two files are never observed partially updated.
    pub fn reload(&self) {
        let allow_text = read_policy_file(&self.allow_path);
        let deny_text = read_policy_file(&self.deny_path);
        let stamps = SourceStamps {
            allow: file_modified(&self.allow_path),
            deny: file_modified(&self.deny_path),
        };

        let next = Arc::new(PolicySnapshot::compile(
            allow_text.lines(),
            deny_text.lines(),
        ));

        info!(
            allow_patterns = next.allow_len(),
            deny_patterns = next.deny_len(),
            "command policy loaded"
        );

        *self.snapshot.write() = next;
        *self.loaded_stamps.lock() = stamps;
    }

    /// Consistent view of both pattern sets
    pub fn snapshot(&self) -> Arc<PolicySnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Raw allow patterns as loaded
    pub fn allow_patterns(&self) -> HashSet<String> {
        self.snapshot().allow.iter().map(|p| p.raw.clone()).collect()
    }

    /// Raw deny patterns as loaded
    pub fn deny_patterns(&self) -> HashSet<String> {
        self.snapshot().deny.iter().map(|p| p.raw.clone()).collect()
    }

    /// Check whether either backing file's modification time advanced since
    /// the last load. Change detection stays on the caller side of `reload`.
    pub fn source_changed(&self) -> bool {
        let loaded = *self.loaded_stamps.lock();
        let current = SourceStamps {
            allow: file_modified(&self.allow_path),
            deny: file_modified(&self.deny_path),
        };
        current != loaded
    }
}

impl std::fmt::Debug for PolicyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyStore")
            .field("allow_path", &self.allow_path)
            .field("deny_path", &self.deny_path)
            .finish()
    }
}

/// Periodically reload the store when the backing files change.
///
/// The returned handle can be aborted at shutdown; the loop holds only a
/// weak-free `Arc` and wakes once per `check_interval`.
pub fn spawn_reload_task(
    store: Arc<PolicyStore>,
    check_interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; the initial load already happened.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if store.source_changed() {
                info!("policy file changes detected, reloading");
                store.reload();
            } else {
                debug!("policy files unchanged");
            }
        }
    })
}

fn read_policy_file(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "policy file not found, using empty set");
            String::new()
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "failed to read policy file");
            String::new()
        }
    }
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}
