//! # Command Persistence
//!
//! Persistence is an external collaborator; the core depends only on the
//! [`CommandRepository`] contract. [`InMemoryCommandRepository`] backs tests
//! and single-process deployments; a database-backed implementation plugs in
//! behind the same trait without touching the pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

use crate::models::Command;
use crate::state_machine::CommandState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("command not found: {id}")]
    NotFound { id: i64 },

    #[error("storage error: {0}")]
    Storage(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait CommandRepository: Send + Sync {
    /// Persist the record, assigning an id on first save; returns the stored copy
    async fn save(&self, command: Command) -> RepositoryResult<Command>;

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Command>>;

    async fn find_by_status(&self, status: CommandState) -> RepositoryResult<Vec<Command>>;

    async fn find_by_host(&self, host: &str) -> RepositoryResult<Vec<Command>>;

    /// Commands created in `[from, to)`
    async fn find_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Command>>;
}

/// Map-backed repository with sequential id assignment
#[derive(Debug, Default)]
pub struct InMemoryCommandRepository {
    records: RwLock<HashMap<i64, Command>>,
    next_id: AtomicI64,
}

impl InMemoryCommandRepository {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

#[async_trait]
impl CommandRepository for InMemoryCommandRepository {
    async fn save(&self, mut command: Command) -> RepositoryResult<Command> {
        let id = match command.id {
            Some(id) => id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                command.id = Some(id);
                id
            }
        };
        self.records.write().await.insert(id, command.clone());
        Ok(command)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<Command>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn find_by_status(&self, status: CommandState) -> RepositoryResult<Vec<Command>> {
        let mut matches: Vec<Command> = self
            .records
            .read()
            .await
            .values()
            .filter(|c| c.status == status)
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches)
    }

    async fn find_by_host(&self, host: &str) -> RepositoryResult<Vec<Command>> {
        let mut matches: Vec<Command> = self
            .records
            .read()
            .await
            .values()
            .filter(|c| c.target_host == host)
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches)
    }

    async fn find_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Command>> {
        let mut matches: Vec<Command> = self
            .records
            .read()
            .await
            .values()
            .filter(|c| c.created_at >= from && c.created_at < to)
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.id);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let repo = InMemoryCommandRepository::new();
        let first = repo.save(Command::create("a", "ls", "k")).await.unwrap();
        let second = repo.save(Command::create("b", "ls", "k")).await.unwrap();
        assert_eq!(first.id, Some(1));
        assert_eq!(second.id, Some(2));
    }

    #[tokio::test]
    async fn test_resave_keeps_id_and_updates_record() {
        let repo = InMemoryCommandRepository::new();
        let mut saved = repo.save(Command::create("a", "ls", "k")).await.unwrap();
        saved.mark_executing().unwrap();
        let resaved = repo.save(saved).await.unwrap();
        assert_eq!(resaved.id, Some(1));

        let found = repo.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(found.status, CommandState::Executing);
    }

    #[tokio::test]
    async fn test_queries_by_status_and_host() {
        let repo = InMemoryCommandRepository::new();
        let mut running = repo.save(Command::create("web-01", "ls", "k")).await.unwrap();
        running.mark_executing().unwrap();
        repo.save(running).await.unwrap();
        repo.save(Command::create("web-02", "uptime", "k")).await.unwrap();

        let executing = repo.find_by_status(CommandState::Executing).await.unwrap();
        assert_eq!(executing.len(), 1);
        assert_eq!(executing[0].target_host, "web-01");

        let on_host = repo.find_by_host("web-02").await.unwrap();
        assert_eq!(on_host.len(), 1);
        assert_eq!(on_host[0].command_text, "uptime");
    }

    #[tokio::test]
    async fn test_time_range_query_is_half_open() {
        let repo = InMemoryCommandRepository::new();
        let saved = repo.save(Command::create("a", "ls", "k")).await.unwrap();
        let created = saved.created_at;

        let hit = repo
            .find_in_range(created, created + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(hit.len(), 1);

        let miss = repo
            .find_in_range(created - Duration::seconds(1), created)
            .await
            .unwrap();
        assert!(miss.is_empty());
    }
}
