//! End-to-end tests for the asynchronous fork path.
//!
//! Guarantees exercised here:
//! - A fork is accepted as `queued` and finishes in exactly one terminal
//!   state, observed only by polling.
//! - Status writes follow `queued -> running -> completed | failed` and
//!   never go backwards.
//! - Failures inside the run step, panics included, land in the job record.
//! - The base execution is never modified by forking it.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tracefork_core::{DecisionNode, ExecutionStatus, ForkMode, TraceExecution};
use tracefork_engine::{
    EngineConfig, ErrorKind, ExecutionStore, FeatureFlags, ForkJobStatus, ForkOrchestrator,
    InMemoryExecutionStore, InMemoryFeatureFlags, InMemoryForkJobStore, TraceForkService,
};
use tracefork_test_utils::{
    admin_ctx, execution_with_root, fork_body, poll_until_terminal, project_ctx, sample_execution,
    sample_service, stored_bytes, test_config, test_scopes, tree_with_nodes, RecordingJobStore,
    PROJECT_A, PROJECT_B,
};

fn service_over(
    config: &EngineConfig,
    executions: Arc<dyn ExecutionStore>,
    jobs: Arc<dyn tracefork_engine::ForkJobStore>,
) -> TraceForkService {
    TraceForkService::new(
        ForkOrchestrator::new(executions, jobs, config),
        Arc::new(test_scopes()),
        Arc::new(InMemoryFeatureFlags::new(config.flags)),
        config,
    )
}

/// Tenet: forking A with "retry_with_cache" yields root confidence 84, the
/// selection recorded in context, and two affected nodes.
#[tokio::test]
async fn fork_completes_with_scoped_execution() {
    let service = sample_service(&test_config());
    let ctx = project_ctx(PROJECT_A);

    let handle = service
        .submit_fork(&ctx, &fork_body("exec-1", "A", "retry_with_cache"))
        .unwrap();
    assert_eq!(handle.job.status, ForkJobStatus::Queued);
    let fork_id = handle.fork_id().to_string();

    let job = handle.completion().await.unwrap();
    assert_eq!(job.status, ForkJobStatus::Completed);
    assert_eq!(job.affected_nodes, Some(2));
    assert_eq!(job.mode, Some(ForkMode::Scoped));
    assert!(job.timings_ms.and_then(|t| t.fork_exec_ms).is_some());
    assert!(job.error.is_none());

    let polled = service.fork_status(&ctx, &fork_id).unwrap();
    assert_eq!(polled, job);

    let fork_execution_id = job.fork_execution_id.unwrap();
    let forked = service.get_trace(&ctx, &fork_execution_id).unwrap();
    let root = &forked.root_decisions[0];
    assert_eq!(root.confidence_score, 84.0);
    assert_eq!(root.decision_outcome, "retry_with_cache");
    assert!(root.decision_context.contains("retry_with_cache"));
    assert_eq!(forked.status, ExecutionStatus::Warning);
    assert_eq!(forked.source_execution_id.as_deref(), Some("exec-1"));
    assert_eq!(forked.fork_node_id.as_deref(), Some("A"));
    assert_eq!(forked.project_id.as_deref(), Some(PROJECT_A));

    let (cost, duration) = forked.totals();
    assert!((forked.cost - cost).abs() < 1e-9);
    assert!((forked.duration - duration).abs() < 1e-9);
}

/// Tenet: with the fork flag off nothing is created.
#[tokio::test]
async fn disabled_fork_creates_no_job() {
    let config = test_config().with_flags(FeatureFlags::default().with_fork_disabled(true));
    let executions = Arc::new(InMemoryExecutionStore::default());
    executions.upsert(sample_execution(), Some(PROJECT_A));
    let jobs = Arc::new(InMemoryForkJobStore::new());
    let service = service_over(&config, executions, jobs.clone());

    let err = service
        .create_fork(&project_ctx(PROJECT_A), &fork_body("exec-1", "A", "retry"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceDisabled);
    assert_eq!(err.status_code(), 503);
    assert!(jobs.is_empty());
}

/// Tenet: a trace in another project reads exactly like a missing trace.
#[tokio::test]
async fn cross_project_fork_is_not_found() {
    let service = sample_service(&test_config());
    let ctx = project_ctx(PROJECT_B);

    let hidden = service
        .create_fork(&ctx, &fork_body("exec-1", "A", "retry"))
        .unwrap_err();
    let missing = service
        .create_fork(&ctx, &fork_body("exec-9", "A", "retry"))
        .unwrap_err();

    assert_eq!(hidden.status_code(), 404);
    assert_eq!(hidden.kind(), missing.kind());
    assert_eq!(
        hidden.to_string().replace("exec-1", "<id>"),
        missing.to_string().replace("exec-9", "<id>")
    );
    let hidden_body = serde_json::to_value(hidden.body()).unwrap();
    let missing_body = serde_json::to_value(missing.body()).unwrap();
    assert_eq!(
        hidden_body.as_object().unwrap().keys().collect::<Vec<_>>(),
        missing_body.as_object().unwrap().keys().collect::<Vec<_>>()
    );
}

/// Tenet: the bootstrap admin can fork any project's trace; the fork joins
/// the base trace's project.
#[tokio::test]
async fn admin_fork_inherits_base_project() {
    let service = sample_service(&test_config());
    let handle = service
        .submit_fork(&admin_ctx(), &fork_body("exec-1", "B", "skip"))
        .unwrap();
    assert_eq!(handle.job.project_id, PROJECT_A);

    let job = handle.completion().await.unwrap();
    assert_eq!(job.affected_nodes, Some(1));
    let fork_execution_id = job.fork_execution_id.unwrap();
    assert!(service
        .get_trace(&project_ctx(PROJECT_A), &fork_execution_id)
        .is_ok());
    assert!(service
        .get_trace(&project_ctx(PROJECT_B), &fork_execution_id)
        .is_err());
}

/// Tenet: the committed fork path accepts 3000 nodes and fails on 3001,
/// reporting the failure only through the job.
#[tokio::test]
async fn fork_size_bound_surfaces_as_job_failure() {
    let service = sample_service(&test_config());
    let executions = service.executions();
    executions.upsert(
        execution_with_root("exec-3000", tree_with_nodes("n", 3000)),
        Some(PROJECT_A),
    );
    executions.upsert(
        execution_with_root("exec-3001", tree_with_nodes("n", 3001)),
        Some(PROJECT_A),
    );
    let ctx = project_ctx(PROJECT_A);

    let ok = service
        .submit_fork(&ctx, &fork_body("exec-3000", "n-0", "alt"))
        .unwrap()
        .completion()
        .await
        .unwrap();
    assert_eq!(ok.status, ForkJobStatus::Completed);
    assert_eq!(ok.affected_nodes, Some(3000));

    let handle = service
        .submit_fork(&ctx, &fork_body("exec-3001", "n-0", "alt"))
        .unwrap();
    assert_eq!(handle.job.status, ForkJobStatus::Queued);
    let failed = handle.completion().await.unwrap();
    assert_eq!(failed.status, ForkJobStatus::Failed);
    assert_eq!(
        failed.error.as_deref(),
        Some("Fork subtree too large to re-execute safely (3001 nodes, limit 3000).")
    );
    assert!(failed.fork_execution_id.is_none());
}

/// Tenet: every status write and every poll moves forward through the
/// lifecycle.
#[tokio::test]
async fn status_sequence_is_monotonic() {
    let config = test_config().with_run_delay_ms(20);
    let executions = Arc::new(InMemoryExecutionStore::default());
    executions.upsert(sample_execution(), Some(PROJECT_A));
    let jobs = RecordingJobStore::new();
    let service = service_over(&config, executions, jobs.clone());

    let ok = service
        .create_fork(&project_ctx(PROJECT_A), &fork_body("exec-1", "A", "retry"))
        .unwrap();
    let bad = service
        .create_fork(&project_ctx(PROJECT_A), &fork_body("exec-1", "missing", "retry"))
        .unwrap();

    let (done, seen_ok) =
        poll_until_terminal(jobs.as_ref(), &ok.fork_id, Duration::from_millis(1)).await;
    assert_eq!(done.status, ForkJobStatus::Completed);
    let (failed, seen_bad) =
        poll_until_terminal(jobs.as_ref(), &bad.fork_id, Duration::from_millis(1)).await;
    assert_eq!(failed.status, ForkJobStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("Decision node not found: missing"));

    use ForkJobStatus::{Completed, Failed, Queued, Running};
    assert_eq!(jobs.statuses(&ok.fork_id), vec![Queued, Running, Completed]);
    assert_eq!(jobs.statuses(&bad.fork_id), vec![Queued, Running, Failed]);

    assert_eq!(seen_ok.first(), Some(&Queued));
    for (seen, terminal) in [(seen_ok, Completed), (seen_bad, Failed)] {
        let order = [Queued, Running, terminal];
        let ranks: Vec<usize> = seen
            .iter()
            .map(|s| order.iter().position(|o| o == s).unwrap())
            .collect();
        assert!(ranks.windows(2).all(|w| w[0] <= w[1]), "out of order: {seen:?}");
    }
}

/// Tenet: forking leaves the stored base execution byte-for-byte intact.
#[tokio::test]
async fn base_execution_is_not_mutated() {
    let service = sample_service(&test_config());
    let before = stored_bytes(service.executions().as_ref(), "exec-1");

    for alt in ["retry_with_cache", "skip", "escalate"] {
        let job = service
            .submit_fork(&project_ctx(PROJECT_A), &fork_body("exec-1", "A", alt))
            .unwrap()
            .completion()
            .await
            .unwrap();
        assert_eq!(job.status, ForkJobStatus::Completed);
    }
    service
        .compare(&project_ctx(PROJECT_A), &fork_body("exec-1", "A", "retry"))
        .unwrap();

    assert_eq!(before, stored_bytes(service.executions().as_ref(), "exec-1"));
}

/// Execution store that panics when asked to store a forked execution
struct PanickingStore {
    inner: InMemoryExecutionStore,
}

impl ExecutionStore for PanickingStore {
    fn get(&self, execution_id: &str) -> Option<Arc<TraceExecution>> {
        self.inner.get(execution_id)
    }

    fn project_id(&self, execution_id: &str) -> Option<String> {
        self.inner.project_id(execution_id)
    }

    fn upsert(&self, execution: TraceExecution, project_id: Option<&str>) {
        assert!(
            !execution.execution_id.starts_with("fork_"),
            "storage offline"
        );
        self.inner.upsert(execution, project_id);
    }
}

/// Tenet: a panic in the run step fails the job instead of stranding it in
/// `running`.
#[tokio::test]
async fn run_step_panic_fails_job() {
    let config = test_config();
    let store = PanickingStore {
        inner: InMemoryExecutionStore::default(),
    };
    store.upsert(sample_execution(), Some(PROJECT_A));
    let service = service_over(
        &config,
        Arc::new(store),
        Arc::new(InMemoryForkJobStore::new()),
    );

    let handle = service
        .submit_fork(&project_ctx(PROJECT_A), &fork_body("exec-1", "A", "retry"))
        .unwrap();
    let fork_id = handle.fork_id().to_string();
    let job = handle.completion().await.unwrap();

    assert_eq!(job.status, ForkJobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("panicked"), "{error}");
    assert!(error.contains("storage offline"), "{error}");
    assert_eq!(
        service
            .fork_status(&project_ctx(PROJECT_A), &fork_id)
            .unwrap()
            .status,
        ForkJobStatus::Failed
    );
}

/// Tenet: a fork of a forked trace records the fork as its source.
#[tokio::test]
async fn forks_chain() {
    let service = sample_service(&test_config());
    let ctx = project_ctx(PROJECT_A);
    let first = service
        .submit_fork(&ctx, &fork_body("exec-1", "A", "retry"))
        .unwrap()
        .completion()
        .await
        .unwrap()
        .fork_execution_id
        .unwrap();

    let second = service
        .submit_fork(&ctx, &fork_body(&first, "B", "skip"))
        .unwrap()
        .completion()
        .await
        .unwrap();
    let forked = service
        .get_trace(&ctx, second.fork_execution_id.as_deref().unwrap())
        .unwrap();
    assert_eq!(forked.source_execution_id.as_deref(), Some(first.as_str()));

    let node_b: &DecisionNode = &forked.root_decisions[0].children[0];
    assert_eq!(node_b.decision_outcome, "skip");
}
