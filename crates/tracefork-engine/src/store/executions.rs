//! Trace execution store

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracefork_core::TraceExecution;

/// Persistence for recorded and forked executions
pub trait ExecutionStore: Send + Sync {
    /// Execution by id
    fn get(&self, execution_id: &str) -> Option<Arc<TraceExecution>>;

    /// Owning project of an execution
    fn project_id(&self, execution_id: &str) -> Option<String>;

    /// Insert or replace, recording the owning project
    fn upsert(&self, execution: TraceExecution, project_id: Option<&str>);
}

#[derive(Debug, Default)]
struct ExecutionTable {
    by_id: HashMap<String, Arc<TraceExecution>>,
    project_index: HashMap<String, String>,
    insert_order: VecDeque<String>,
}

/// Capacity-bounded in-memory execution store
///
/// Once over capacity the oldest-inserted execution is evicted, so fork
/// spam cannot grow memory without bound. Stored executions are immutable
/// behind `Arc`; replacing one swaps the pointer.
#[derive(Debug)]
pub struct InMemoryExecutionStore {
    table: RwLock<ExecutionTable>,
    max_traces: usize,
    default_project_id: String,
}

impl InMemoryExecutionStore {
    /// Create store holding at most `max_traces` executions
    #[must_use]
    pub fn new(max_traces: usize, default_project_id: impl Into<String>) -> Self {
        Self {
            table: RwLock::new(ExecutionTable::default()),
            max_traces: max_traces.max(1),
            default_project_id: default_project_id.into(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execution ids, oldest first
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.table.read().insert_order.iter().cloned().collect()
    }
}

impl Default for InMemoryExecutionStore {
    fn default() -> Self {
        Self::new(200, "project-default")
    }
}

impl ExecutionStore for InMemoryExecutionStore {
    fn get(&self, execution_id: &str) -> Option<Arc<TraceExecution>> {
        self.table.read().by_id.get(execution_id).cloned()
    }

    fn project_id(&self, execution_id: &str) -> Option<String> {
        self.table.read().project_index.get(execution_id).cloned()
    }

    fn upsert(&self, mut execution: TraceExecution, project_id: Option<&str>) {
        let project = project_id
            .map(str::to_string)
            .or_else(|| execution.project_id.clone())
            .unwrap_or_else(|| self.default_project_id.clone());
        execution.project_id = Some(project.clone());
        let id = execution.execution_id.clone();

        let mut table = self.table.write();
        if !table.by_id.contains_key(&id) {
            table.insert_order.push_back(id.clone());
        }
        table.project_index.insert(id.clone(), project);
        table.by_id.insert(id, Arc::new(execution));

        while table.insert_order.len() > self.max_traces {
            let Some(oldest) = table.insert_order.pop_front() else {
                break;
            };
            table.by_id.remove(&oldest);
            table.project_index.remove(&oldest);
            tracing::debug!(execution_id = %oldest, "evicted execution over capacity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(id: &str) -> TraceExecution {
        TraceExecution::new(id, "agent")
    }

    #[test]
    fn upsert_resolves_project() {
        let store = InMemoryExecutionStore::new(10, "project-default");
        store.upsert(exec("a"), Some("project-x"));
        store.upsert(exec("b").with_project("project-y"), None);
        store.upsert(exec("c"), None);

        assert_eq!(store.project_id("a").as_deref(), Some("project-x"));
        assert_eq!(store.project_id("b").as_deref(), Some("project-y"));
        assert_eq!(store.project_id("c").as_deref(), Some("project-default"));
        assert_eq!(
            store.get("a").unwrap().project_id.as_deref(),
            Some("project-x")
        );
        assert!(store.get("zzz").is_none());
        assert!(store.project_id("zzz").is_none());
    }

    #[test]
    fn evicts_oldest_over_capacity() {
        let store = InMemoryExecutionStore::new(2, "p");
        store.upsert(exec("a"), None);
        store.upsert(exec("b"), None);
        store.upsert(exec("c"), None);

        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_none());
        assert!(store.project_id("a").is_none());
        assert_eq!(store.ids(), vec!["b", "c"]);
    }

    #[test]
    fn reupsert_keeps_insert_position() {
        let store = InMemoryExecutionStore::new(2, "p");
        store.upsert(exec("a"), None);
        store.upsert(exec("b"), None);
        store.upsert(exec("a").with_project("q"), None);
        store.upsert(exec("c"), None);

        assert!(store.get("a").is_none());
        assert_eq!(store.ids(), vec!["b", "c"]);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let store = InMemoryExecutionStore::default();
        store.upsert(exec("a"), None);
        let before = store.get("a").unwrap();
        store.upsert(exec("a").with_status(tracefork_core::ExecutionStatus::Failed), None);

        assert_eq!(before.status, tracefork_core::ExecutionStatus::Pending);
        assert_eq!(
            store.get("a").unwrap().status,
            tracefork_core::ExecutionStatus::Failed
        );
    }
}
