//! Fork job orchestration
//!
//! Submitting a fork does the cheap checks inline and answers with a
//! `queued` job; the scoped re-execution runs later on its own task:
//! - `queued` is written before the caller gets its handle
//! - the run step writes `running`, then exactly one terminal state
//! - any failure inside the run step, panics included, lands in the job
//!   record and never reaches the submitter
//!
//! There is no cancellation or timeout. A run step that never returns
//! leaves its job `running`. A run step whose `running` write is rejected
//! by the job store stops there and leaves the job `queued`.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::job::{ForkJob, ForkJobPatch};
use crate::request::AlternativeRequest;
use crate::scope::ProjectScope;
use crate::store::{ExecutionStore, ForkJobStore};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracefork_core::{build_scoped_fork_execution, ScopedFork, TraceExecution};
use ulid::Ulid;

/// Not-found message shared by absent and out-of-scope executions
pub(crate) fn trace_not_found(execution_id: &str) -> EngineError {
    EngineError::NotFound(format!("Trace {execution_id} not found."))
}

/// Handle to a submitted fork
#[derive(Debug)]
pub struct ForkHandle {
    /// Job record as created
    pub job: ForkJob,
    completion: JoinHandle<Option<ForkJob>>,
}

impl ForkHandle {
    #[inline]
    #[must_use]
    pub fn fork_id(&self) -> &str {
        &self.job.fork_id
    }

    /// Wait for the run step and return the terminal record
    ///
    /// `None` if the run step could not write its final state.
    pub async fn completion(self) -> Option<ForkJob> {
        self.completion.await.ok().flatten()
    }
}

/// Schedules and runs scoped forks
#[derive(Clone)]
pub struct ForkOrchestrator {
    executions: Arc<dyn ExecutionStore>,
    jobs: Arc<dyn ForkJobStore>,
    subtree_limit: usize,
    run_delay: Duration,
    default_project_id: Arc<str>,
}

impl std::fmt::Debug for ForkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForkOrchestrator")
            .field("subtree_limit", &self.subtree_limit)
            .field("run_delay", &self.run_delay)
            .field("default_project_id", &self.default_project_id)
            .finish_non_exhaustive()
    }
}

impl ForkOrchestrator {
    #[must_use]
    pub fn new(
        executions: Arc<dyn ExecutionStore>,
        jobs: Arc<dyn ForkJobStore>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            executions,
            jobs,
            subtree_limit: config.fork_subtree_limit,
            run_delay: config.run_delay(),
            default_project_id: Arc::from(config.default_project_id.as_str()),
        }
    }

    #[inline]
    #[must_use]
    pub fn executions(&self) -> &Arc<dyn ExecutionStore> {
        &self.executions
    }

    #[inline]
    #[must_use]
    pub fn jobs(&self) -> &Arc<dyn ForkJobStore> {
        &self.jobs
    }

    /// Accept a fork request and schedule its run step
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// - `InvalidInput` for empty fields
    /// - `NotFound` if the execution is absent or outside `scope`
    /// - `Internal` without a runtime or if the job cannot be recorded;
    ///   nothing is left behind in either case
    pub fn submit(
        &self,
        scope: &ProjectScope,
        request: &AlternativeRequest,
    ) -> Result<ForkHandle, EngineError> {
        request.validate()?;

        let execution_id = request.execution_id.as_str();
        let base = self
            .executions
            .get(execution_id)
            .ok_or_else(|| trace_not_found(execution_id))?;
        let owner = self.executions.project_id(execution_id);
        if !scope.permits(owner.as_deref()) {
            tracing::debug!(execution_id, "fork target outside caller scope");
            return Err(trace_not_found(execution_id));
        }

        let runtime = Handle::try_current()
            .map_err(|_| EngineError::Internal("no async runtime to run the fork".into()))?;

        let project_id = scope
            .project_id
            .clone()
            .or(owner)
            .unwrap_or_else(|| self.default_project_id.to_string());
        let fork_id = format!(
            "fork_job_{}_{}_{}",
            request.execution_id,
            request.node_id,
            Ulid::new()
        );
        let job = self.jobs.create(ForkJob::queued(
            fork_id.as_str(),
            project_id.as_str(),
            request.execution_id.as_str(),
            request.node_id.as_str(),
            request.alternative_outcome.as_str(),
        ))?;

        tracing::info!(
            fork_id = %job.fork_id,
            execution_id,
            node_id = %request.node_id,
            project_id = %project_id,
            "fork queued"
        );

        let run = ForkRun {
            fork_id,
            project_id,
            base,
            request: request.clone(),
        };
        let completion = runtime.spawn(self.clone().run(run));
        Ok(ForkHandle { job, completion })
    }

    async fn run(self, run: ForkRun) -> Option<ForkJob> {
        if !self.run_delay.is_zero() {
            tokio::time::sleep(self.run_delay).await;
        }

        let fork_id = run.fork_id.clone();
        if let Err(error) = self.jobs.update(&fork_id, ForkJobPatch::running()) {
            tracing::error!(fork_id = %fork_id, %error, "could not mark fork running");
            return None;
        }

        let started = Instant::now();
        let executions = Arc::clone(&self.executions);
        let limit = self.subtree_limit;
        let outcome =
            tokio::task::spawn_blocking(move || run.execute(executions.as_ref(), limit)).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let patch = match outcome {
            Ok(Ok((fork_execution_id, affected_nodes))) => {
                tracing::info!(
                    fork_id = %fork_id,
                    fork_execution_id = %fork_execution_id,
                    affected_nodes,
                    elapsed_ms,
                    "fork completed"
                );
                ForkJobPatch::completed(fork_execution_id, affected_nodes, elapsed_ms)
            }
            Ok(Err(error)) => {
                tracing::warn!(fork_id = %fork_id, %error, elapsed_ms, "fork failed");
                ForkJobPatch::failed(error.to_string(), elapsed_ms)
            }
            Err(join) => {
                let error = EngineError::Internal(join_failure(join));
                tracing::error!(fork_id = %fork_id, %error, elapsed_ms, "fork run aborted");
                ForkJobPatch::failed(error.to_string(), elapsed_ms)
            }
        };

        match self.jobs.update(&fork_id, patch) {
            Ok(job) => Some(job),
            Err(error) => {
                tracing::error!(fork_id = %fork_id, %error, "could not record fork outcome");
                None
            }
        }
    }
}

struct ForkRun {
    fork_id: String,
    project_id: String,
    base: Arc<TraceExecution>,
    request: AlternativeRequest,
}

impl ForkRun {
    fn execute(
        self,
        executions: &dyn ExecutionStore,
        limit: usize,
    ) -> Result<(String, usize), EngineError> {
        let request = &self.request;
        let fork_execution_id = format!(
            "fork_{}_{}_{}",
            request.execution_id,
            request.node_id,
            Ulid::new()
        );
        let ScopedFork {
            execution,
            affected_nodes,
        } = build_scoped_fork_execution(
            &self.base,
            &fork_execution_id,
            &request.node_id,
            &request.alternative_outcome,
            limit,
        )?;
        executions.upsert(execution, Some(&self.project_id));
        Ok((fork_execution_id, affected_nodes))
    }
}

fn join_failure(join: JoinError) -> String {
    if join.is_cancelled() {
        return "fork run was cancelled".to_string();
    }
    let payload = join.into_panic();
    format!("fork run panicked: {}", panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
