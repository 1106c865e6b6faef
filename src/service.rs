//! Task operations on top of a [`TaskRepository`] and a [`CommandExecutor`].
//!
//! Executing a task is a read-modify-write of the whole document: load it,
//! run its command, append the record, save it back. Those steps, and plain
//! saves of an existing id, hold a per-id lock so two executions of the same
//! task cannot drop each other's record.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

use crate::executor::{CommandExecutor, ExecError};
use crate::store::{SharedTaskRepository, StoreError};
use crate::task::Task;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Task not found with ID: {0}")]
    NotFound(String),

    #[error("Command execution failed: '{0}' is not on the secure allowlist. Access denied.")]
    DisallowedCommand(String),

    #[error("Command execution failed: {0}")]
    Spawn(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ExecError> for TaskError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Disallowed(program) => Self::DisallowedCommand(program),
            other => Self::Spawn(other.to_string()),
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;

#[derive(Clone)]
pub struct TaskService {
    repo: SharedTaskRepository,
    executor: CommandExecutor,
    locks: Arc<IdLocks>,
}

impl TaskService {
    pub fn new(repo: SharedTaskRepository) -> Self {
        Self::with_executor(repo, CommandExecutor::new())
    }

    pub fn with_executor(repo: SharedTaskRepository, executor: CommandExecutor) -> Self {
        Self {
            repo,
            executor,
            locks: Arc::new(IdLocks::default()),
        }
    }

    /// Create or replace a task. History supplied by the caller is stored
    /// as given.
    pub async fn save_task(&self, task: Task) -> TaskResult<Task> {
        let _guard = match task.id.as_deref() {
            Some(id) => Some(IdLocks::acquire(&self.locks, id).await),
            None => None,
        };
        Ok(self.repo.save(task).await?)
    }

    pub async fn find_all_tasks(&self) -> TaskResult<Vec<Task>> {
        Ok(self.repo.find_all().await?)
    }

    pub async fn find_task_by_id(&self, id: &str) -> TaskResult<Task> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| TaskError::NotFound(id.to_string()))
    }

    pub async fn delete_task_by_id(&self, id: &str) -> TaskResult<()> {
        let _guard = IdLocks::acquire(&self.locks, id).await;
        if !self.repo.exists_by_id(id).await? {
            return Err(TaskError::NotFound(id.to_string()));
        }
        self.repo.delete_by_id(id).await?;
        Ok(())
    }

    pub async fn search_tasks_by_name(&self, fragment: &str) -> TaskResult<Vec<Task>> {
        Ok(self
            .repo
            .find_by_name_containing_ignore_case(fragment)
            .await?)
    }

    /// Run the task's command and append the execution to its history.
    ///
    /// The work runs on its own tokio task, so dropping the returned future
    /// does not abandon a started execution; its record is still saved.
    pub async fn execute_task(&self, id: &str) -> TaskResult<Task> {
        let service = self.clone();
        let id = id.to_string();
        tokio::spawn(async move { service.execute_locked(&id).await })
            .await
            .map_err(|e| TaskError::Spawn(format!("execution worker failed: {}", e)))?
    }

    async fn execute_locked(&self, id: &str) -> TaskResult<Task> {
        let _guard = IdLocks::acquire(&self.locks, id).await;

        let mut task = self.find_task_by_id(id).await?;
        let execution = self.executor.execute(&task.command).await?;
        task.task_executions.push(execution);

        let saved = self.repo.save(task).await?;
        tracing::info!(
            "Executed task {} ({} executions recorded)",
            id,
            saved.task_executions.len()
        );
        Ok(saved)
    }
}

/// Lazily created async mutex per task id.
#[derive(Debug, Default)]
struct IdLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdLocks {
    async fn acquire(this: &Arc<Self>, id: &str) -> IdGuard {
        let lock = {
            let mut locks = this.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(id.to_string()).or_default())
        };
        let held = lock.lock_owned().await;
        IdGuard {
            locks: Arc::clone(this),
            id: id.to_string(),
            held: Some(held),
        }
    }
}

/// Releases the id lock on drop and forgets the entry once nobody else
/// holds or waits on it.
struct IdGuard {
    locks: Arc<IdLocks>,
    id: String,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for IdGuard {
    fn drop(&mut self) {
        drop(self.held.take());
        let mut locks = self.locks.locks.lock().unwrap_or_else(|e| e.into_inner());
        let idle = locks
            .get(&self.id)
            .map_or(false, |lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.id);
        }
    }
}
