use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::domain::DownloadTask;

/// Shared map from task id to its status record.
///
/// Cloning is cheap and every clone sees the same tasks. Entries are locked
/// individually, so tasks do not block each other.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<DashMap<String, DownloadTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Returns `false` and leaves the registry untouched if the id is taken.
    pub fn insert(&self, task: DownloadTask) -> bool {
        match self.tasks.entry(task.id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(task);
                true
            }
        }
    }

    /// Snapshot of a task.
    pub fn get(&self, task_id: &str) -> Option<DownloadTask> {
        self.tasks.get(task_id).map(|task| task.value().clone())
    }

    /// Mutate a task in place. Returns `None` for unknown ids.
    pub fn update<R>(&self, task_id: &str, f: impl FnOnce(&mut DownloadTask) -> R) -> Option<R> {
        self.tasks
            .get_mut(task_id)
            .map(|mut task| f(task.value_mut()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.tasks.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskStatus;

    #[test]
    fn test_insert_does_not_overwrite() {
        let registry = TaskRegistry::new();
        assert!(registry.insert(DownloadTask::new("a".into())));
        registry.update("a", |t| t.set_message("changed"));
        assert!(!registry.insert(DownloadTask::new("a".into())));
        assert_eq!(registry.get("a").unwrap().message, "changed");
        assert_eq!(registry.ids(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unknown_task() {
        let registry = TaskRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.update("missing", |t| t.status).is_none());
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn test_snapshots_are_independent() {
        let registry = TaskRegistry::new();
        registry.insert(DownloadTask::new("a".into()));
        let before = registry.get("a").unwrap();
        registry.update("a", |t| t.mark_ready(Vec::new()));
        assert_eq!(before.status, TaskStatus::Analyzing);
        assert_eq!(registry.get("a").unwrap().status, TaskStatus::Ready);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = TaskRegistry::new();
        let other = registry.clone();
        registry.insert(DownloadTask::new("a".into()));
        assert!(other.get("a").is_some());
        other.update("a", |t| t.set_message("from clone"));
        assert_eq!(registry.get("a").unwrap().message, "from clone");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_on_distinct_tasks() {
        let registry = TaskRegistry::new();
        let mut handles = Vec::new();
        for i in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let id = format!("task-{}", i);
                registry.insert(DownloadTask::new(id.clone()));
                registry.update(&id, |t| t.begin_download(100));
                for n in 0..100 {
                    registry.update(&id, |t| t.record_progress(format!("item {}", n)));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..8 {
            let task = registry.get(&format!("task-{}", i)).unwrap();
            assert_eq!(task.completed, 100);
            assert_eq!(task.status, TaskStatus::Downloading);
        }
    }
}
