//! Task document storage.
//!
//! [`TaskRepository`] is the seam between the service and whatever keeps the
//! documents. Two backends ship with the crate:
//! - [`MemoryTaskRepository`]: process-local, used for tests and ephemeral runs
//! - [`SqliteTaskRepository`]: one JSON document per row in a SQLite file

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::task::Task;

pub use memory::MemoryTaskRepository;
pub use sqlite::SqliteTaskRepository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize task document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to create storage directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage worker failed: {0}")]
    Background(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence of task documents.
///
/// Each call is atomic with respect to a single document; nothing spans
/// documents.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Upsert. Assigns a fresh id when `task.id` is `None` and returns the
    /// stored document.
    async fn save(&self, task: Task) -> StoreResult<Task>;

    async fn find_all(&self) -> StoreResult<Vec<Task>>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>>;

    /// Remove the document. Removing an absent id is not an error here;
    /// callers check [`exists_by_id`](Self::exists_by_id) first.
    async fn delete_by_id(&self, id: &str) -> StoreResult<()>;

    async fn exists_by_id(&self, id: &str) -> StoreResult<bool>;

    /// Tasks whose `name` contains `fragment`, ignoring case.
    async fn find_by_name_containing_ignore_case(&self, fragment: &str)
        -> StoreResult<Vec<Task>>;
}

/// Shared repository handle.
pub type SharedTaskRepository = Arc<dyn TaskRepository>;

/// Fill in a store-assigned id when the caller did not supply one.
pub(crate) fn assign_id(task: &mut Task) -> String {
    match &task.id {
        Some(id) => id.clone(),
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            task.id = Some(id.clone());
            id
        }
    }
}
