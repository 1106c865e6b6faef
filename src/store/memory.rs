//! In-process task store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{assign_id, StoreResult, TaskRepository};
use crate::task::Task;

#[derive(Debug)]
struct Entry {
    /// Insertion order, kept across updates so listings are stable.
    seq: u64,
    task: Task,
}

#[derive(Debug, Default)]
struct Inner {
    next_seq: u64,
    tasks: HashMap<String, Entry>,
}

/// Task store backed by a `HashMap`. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryTaskRepository {
    inner: RwLock<Inner>,
}

impl MemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(entries: Vec<&Entry>) -> Vec<Task> {
        let mut entries = entries;
        entries.sort_by_key(|e| e.seq);
        entries.into_iter().map(|e| e.task.clone()).collect()
    }
}

#[async_trait]
impl TaskRepository for MemoryTaskRepository {
    async fn save(&self, mut task: Task) -> StoreResult<Task> {
        let id = assign_id(&mut task);
        let mut inner = self.inner.write().await;
        let seq = match inner.tasks.get(&id) {
            Some(existing) => existing.seq,
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                seq
            }
        };
        inner.tasks.insert(
            id,
            Entry {
                seq,
                task: task.clone(),
            },
        );
        Ok(task)
    }

    async fn find_all(&self) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(Self::sorted(inner.tasks.values().collect()))
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Task>> {
        let inner = self.inner.read().await;
        Ok(inner.tasks.get(id).map(|e| e.task.clone()))
    }

    async fn delete_by_id(&self, id: &str) -> StoreResult<()> {
        self.inner.write().await.tasks.remove(id);
        Ok(())
    }

    async fn exists_by_id(&self, id: &str) -> StoreResult<bool> {
        Ok(self.inner.read().await.tasks.contains_key(id))
    }

    async fn find_by_name_containing_ignore_case(
        &self,
        fragment: &str,
    ) -> StoreResult<Vec<Task>> {
        let inner = self.inner.read().await;
        Ok(Self::sorted(
            inner
                .tasks
                .values()
                .filter(|e| e.task.name_contains_ignore_case(fragment))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_assigns_id_and_keeps_given_one() {
        let repo = MemoryTaskRepository::new();

        let saved = repo.save(Task::new("a", "o", "ls")).await.unwrap();
        let id = saved.id.clone().unwrap();
        assert!(!id.is_empty());

        let mut explicit = Task::new("b", "o", "pwd");
        explicit.id = Some("fixed".to_string());
        let saved = repo.save(explicit).await.unwrap();
        assert_eq!(saved.id.as_deref(), Some("fixed"));

        assert!(repo.exists_by_id(&id).await.unwrap());
        assert!(repo.exists_by_id("fixed").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_replaces_document_in_place() {
        let repo = MemoryTaskRepository::new();
        let first = repo.save(Task::new("first", "o", "ls")).await.unwrap();
        repo.save(Task::new("second", "o", "ls")).await.unwrap();

        let mut updated = first.clone();
        updated.name = "renamed".to_string();
        repo.save(updated).await.unwrap();

        let all = repo.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "renamed");
        assert_eq!(all[1].name, "second");
    }

    #[tokio::test]
    async fn test_delete_then_find_is_none() {
        let repo = MemoryTaskRepository::new();
        let saved = repo.save(Task::new("a", "o", "ls")).await.unwrap();
        let id = saved.id.unwrap();

        repo.delete_by_id(&id).await.unwrap();
        assert!(repo.find_by_id(&id).await.unwrap().is_none());
        assert!(!repo.exists_by_id(&id).await.unwrap());

        // Absent ids are a no-op at this layer.
        repo.delete_by_id(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_name_search_ignores_case() {
        let repo = MemoryTaskRepository::new();
        repo.save(Task::new("Alpha", "o", "ls")).await.unwrap();
        repo.save(Task::new("beta-ALPHA", "o", "ls")).await.unwrap();
        repo.save(Task::new("gamma", "o", "ls")).await.unwrap();

        let hits = repo.find_by_name_containing_ignore_case("alpha").await.unwrap();
        let names: Vec<_> = hits.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta-ALPHA"]);

        let all = repo.find_by_name_containing_ignore_case("").await.unwrap();
        assert_eq!(all.len(), 3);

        let none = repo.find_by_name_containing_ignore_case("delta").await.unwrap();
        assert!(none.is_empty());
    }
}
