//! Pending-task registry shared across sessions.

use std::collections::BTreeMap;

use dashmap::DashMap;

use super::PendingTask;

/// Thread-safe registry of outstanding tasks, at most one per (session, tool).
///
/// Injected into gates, teams and the [`super::Hitl`] API rather than held in a
/// global so tests can use one store per session.
pub trait PendingTaskStore: Send + Sync {
    /// First outstanding task of a session (ordered by tool name).
    fn get(&self, session_id: &str) -> Option<PendingTask>;

    fn get_for_tool(&self, session_id: &str, tool_name: &str) -> Option<PendingTask>;

    fn list(&self, session_id: &str) -> Vec<PendingTask>;

    /// Insert or replace the task for its (session, tool).
    fn put(&self, task: PendingTask);

    fn remove(&self, session_id: &str, tool_name: &str) -> Option<PendingTask>;

    fn clear_session(&self, session_id: &str) -> usize;
}

#[derive(Debug, Default)]
pub struct MemoryPendingTaskStore {
    tasks: DashMap<String, BTreeMap<String, PendingTask>>,
}

impl MemoryPendingTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_count(&self) -> usize {
        self.tasks.len()
    }
}

impl PendingTaskStore for MemoryPendingTaskStore {
    fn get(&self, session_id: &str) -> Option<PendingTask> {
        self.tasks
            .get(session_id)
            .and_then(|tasks| tasks.values().next().cloned())
    }

    fn get_for_tool(&self, session_id: &str, tool_name: &str) -> Option<PendingTask> {
        self.tasks
            .get(session_id)
            .and_then(|tasks| tasks.get(tool_name).cloned())
    }

    fn list(&self, session_id: &str) -> Vec<PendingTask> {
        self.tasks
            .get(session_id)
            .map(|tasks| tasks.values().cloned().collect())
            .unwrap_or_default()
    }

    fn put(&self, task: PendingTask) {
        self.tasks
            .entry(task.session_id.clone())
            .or_default()
            .insert(task.tool_name.clone(), task);
    }

    fn remove(&self, session_id: &str, tool_name: &str) -> Option<PendingTask> {
        let removed = self
            .tasks
            .get_mut(session_id)
            .and_then(|mut tasks| tasks.remove(tool_name));
        self.tasks.remove_if(session_id, |_, tasks| tasks.is_empty());
        removed
    }

    fn clear_session(&self, session_id: &str) -> usize {
        self.tasks
            .remove(session_id)
            .map(|(_, tasks)| tasks.len())
            .unwrap_or(0)
    }
}
