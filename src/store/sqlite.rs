//! SQLite-backed task store.
//!
//! Each task is one row: the id, the name (kept as a column for inspection),
//! and the full document as JSON. rusqlite is synchronous, so every call hops
//! onto the blocking pool and takes the connection lock there.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{assign_id, StoreError, StoreResult, TaskRepository};
use crate::task::Task;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id       TEXT PRIMARY KEY,
        name     TEXT NOT NULL,
        document TEXT NOT NULL
    );
";

/// Task store persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTaskRepository {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        tracing::info!("Opened task database at {}", path.display());
        Self::bootstrap(conn)
    }

    pub fn in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Background("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }

    fn load_all(conn: &Connection) -> StoreResult<Vec<Task>> {
        let mut stmt = conn.prepare("SELECT document FROM tasks ORDER BY rowid ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(serde_json::from_str(&row?)?);
        }
        Ok(tasks)
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn save(&self, mut task: Task) -> StoreResult<Task> {
        let id = assign_id(&mut task);
        let document = serde_json::to_string(&task)?;
        let name = task.name.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO tasks (id, name, document) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, document = excluded.document",
                params![id, name, document],
            )?;
            Ok(())
        })
        .await?;
        Ok(task)
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        self.with_conn(Self::load_all).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM tasks WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match document {
                Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    async fn exists_by_id(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![id], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        fragment: &str,
    ) -> StoreResult<Vec<Task>> {
        // LIKE only folds ASCII, so the match happens here instead.
        let fragment = fragment.to_string();
        self.with_conn(move |conn| {
            Ok(Self::load_all(conn)?
                .into_iter()
                .filter(|t| t.name_contains_ignore_case(&fragment))
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskExecution;
    use chrono::Utc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_crud_lifecycle() {
        let repo = SqliteTaskRepository::in_memory().unwrap();

        let saved = repo.save(Task::new("build", "ops", "ls -la")).await.unwrap();
        let id = saved.id.clone().unwrap();

        let loaded = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(repo.exists_by_id(&id).await.unwrap());

        repo.delete_by_id(&id).await.unwrap();
        assert!(repo.find_by_id(&id).await.unwrap().is_none());
        assert!(!repo.exists_by_id(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_upsert_keeps_listing_order() {
        let repo = SqliteTaskRepository::in_memory().unwrap();
        let first = repo.save(Task::new("first", "o", "ls")).await.unwrap();
        repo.save(Task::new("second", "o", "ls")).await.unwrap();

        let mut updated = first;
        updated.command = "pwd".to_string();
        repo.save(updated).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "first");
        assert_eq!(all[0].command, "pwd");
    }

    #[tokio::test]
    async fn test_sqlite_name_search_folds_unicode() {
        let repo = SqliteTaskRepository::in_memory().unwrap();
        repo.save(Task::new("ÉCOLE nightly", "o", "ls")).await.unwrap();
        repo.save(Task::new("other", "o", "ls")).await.unwrap();

        let hits = repo.find_by_name_containing_ignore_case("école").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "ÉCOLE nightly");
    }

    #[tokio::test]
    async fn test_sqlite_history_survives_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("tasks.db");

        let id = {
            let repo = SqliteTaskRepository::open(&path).unwrap();
            let mut task = Task::new("t", "o", "echo hi");
            let now = Utc::now();
            task.task_executions.push(TaskExecution {
                start_time: now,
                end_time: now,
                output: "hi\n".to_string(),
            });
            repo.save(task).await.unwrap().id.unwrap()
        };

        let repo = SqliteTaskRepository::open(&path).unwrap();
        let loaded = repo.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(loaded.task_executions.len(), 1);
        assert_eq!(loaded.task_executions[0].output, "hi\n");
    }
}
