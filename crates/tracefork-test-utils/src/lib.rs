//! Testing utilities for the tracefork workspace
//!
//! Shared fixtures: node builders, trees of an exact size, wired services
//! and a job store that records every status write.

#![allow(missing_docs)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracefork_core::{DecisionNode, ExecutionStatus, TraceExecution};
use tracefork_engine::{
    EngineConfig, ExecutionStore, ForkJob, ForkJobPatch, ForkJobStatus, ForkJobStore,
    HeaderScopeResolver, InMemoryForkJobStore, RequestContext, StoreError, TraceForkService,
    ADMIN_OVERRIDE_HEADER, USER_HEADER,
};

pub const PROJECT_A: &str = "project-a";
pub const PROJECT_B: &str = "project-b";
pub const ADMIN_USER: &str = "admin-1";

pub fn node(id: &str, outcome: &str, confidence: f64, cost: f64, duration: f64) -> DecisionNode {
    DecisionNode::new(id, outcome, confidence)
        .with_label(format!("step {id}"))
        .with_context(format!("context for {id}"))
        .with_cost(cost)
        .with_duration(duration)
}

/// Tree of exactly `count` nodes with ids `{prefix}-0` .. `{prefix}-{count-1}`
///
/// Fan-out 4 keeps it shallow; `{prefix}-0` is the root.
pub fn tree_with_nodes(prefix: &str, count: usize) -> DecisionNode {
    assert!(count > 0, "a tree needs at least one node");
    let mut nodes: Vec<DecisionNode> = (0..count)
        .map(|i| {
            let spread = f64::from(u32::try_from(i % 7).unwrap());
            node(&format!("{prefix}-{i}"), "proceed", 60.0 + spread * 5.0, 1.0 + spread, 0.5)
        })
        .collect();
    for i in (1..count).rev() {
        let mut child = nodes.pop().unwrap();
        let parent = &mut nodes[(i - 1) / 4];
        child.parent_decision_id = Some(parent.node_id.clone());
        parent.children.insert(0, child);
    }
    nodes.pop().unwrap()
}

/// Root `A` (90 / cost 10 / 5s) with one child `B` (80 / cost 4 / 2s)
pub fn sample_execution() -> TraceExecution {
    TraceExecution::new("exec-1", "agent-1")
        .with_status(ExecutionStatus::Success)
        .with_root(
            node("A", "call_api", 90.0, 10.0, 5.0)
                .with_child(node("B", "parse_response", 80.0, 4.0, 2.0)),
        )
}

pub fn execution_with_root(execution_id: &str, root: DecisionNode) -> TraceExecution {
    TraceExecution::new(execution_id, "agent-1")
        .with_status(ExecutionStatus::Success)
        .with_root(root)
}

/// Defaults with no run delay
pub fn test_config() -> EngineConfig {
    EngineConfig::default().with_run_delay_ms(0)
}

pub fn test_scopes() -> HeaderScopeResolver {
    HeaderScopeResolver::new()
        .with_project(PROJECT_A)
        .with_project(PROJECT_B)
        .with_bootstrap_admin(ADMIN_USER)
}

/// In-memory service with `sample_execution` owned by [`PROJECT_A`]
pub fn sample_service(config: &EngineConfig) -> TraceForkService {
    let service = TraceForkService::in_memory(config, test_scopes());
    service
        .executions()
        .upsert(sample_execution(), Some(PROJECT_A));
    service
}

pub fn project_ctx(project_id: &str) -> RequestContext {
    RequestContext::for_project(project_id)
}

pub fn admin_ctx() -> RequestContext {
    RequestContext::new()
        .with_header(ADMIN_OVERRIDE_HEADER, "true")
        .with_header(USER_HEADER, ADMIN_USER)
}

pub fn fork_body(execution_id: &str, node_id: &str, alternative: &str) -> String {
    serde_json::json!({
        "execution_id": execution_id,
        "node_id": node_id,
        "alternative_outcome": alternative,
    })
    .to_string()
}

/// Poll a job until terminal, returning every status observed
pub async fn poll_until_terminal(
    jobs: &dyn ForkJobStore,
    fork_id: &str,
    every: Duration,
) -> (ForkJob, Vec<ForkJobStatus>) {
    let mut seen = Vec::new();
    for _ in 0..2000 {
        let job = jobs.get(fork_id).expect("job exists");
        seen.push(job.status);
        if job.is_terminal() {
            return (job, seen);
        }
        tokio::time::sleep(every).await;
    }
    panic!("fork {fork_id} never reached a terminal state");
}

/// Job store that records each accepted status write
#[derive(Debug, Default)]
pub struct RecordingJobStore {
    inner: InMemoryForkJobStore,
    writes: Mutex<Vec<(String, ForkJobStatus)>>,
}

impl RecordingJobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Statuses written for `fork_id`, in order
    pub fn statuses(&self, fork_id: &str) -> Vec<ForkJobStatus> {
        self.writes
            .lock()
            .iter()
            .filter(|(id, _)| id == fork_id)
            .map(|(_, status)| *status)
            .collect()
    }
}

impl ForkJobStore for RecordingJobStore {
    fn create(&self, job: ForkJob) -> Result<ForkJob, StoreError> {
        let job = self.inner.create(job)?;
        self.writes.lock().push((job.fork_id.clone(), job.status));
        Ok(job)
    }

    fn update(&self, fork_id: &str, patch: ForkJobPatch) -> Result<ForkJob, StoreError> {
        let writes_status = patch.status.is_some();
        let job = self.inner.update(fork_id, patch)?;
        if writes_status {
            self.writes.lock().push((job.fork_id.clone(), job.status));
        }
        Ok(job)
    }

    fn get(&self, fork_id: &str) -> Option<ForkJob> {
        self.inner.get(fork_id)
    }
}

/// Serialized bytes of a stored execution
pub fn stored_bytes(store: &dyn ExecutionStore, execution_id: &str) -> Vec<u8> {
    let execution = store.get(execution_id).expect("execution stored");
    serde_json::to_vec(execution.as_ref()).expect("execution serializes")
}
