//! Request surface
//!
//! Transport-neutral handlers for the trace fork and comparison endpoints.
//! Each handler takes the request metadata and the raw body, and checks in
//! a fixed order: feature flag, body, project scope, then the execution.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::flags::{FeatureFlagSource, FeatureFlags, FlagUpdate, InMemoryFeatureFlags};
use crate::job::{ForkJob, ForkJobStatus};
use crate::orchestrator::{trace_not_found, ForkHandle, ForkOrchestrator};
use crate::request::AlternativeRequest;
use crate::scope::{HeaderScopeResolver, ProjectScope, RequestContext, ScopeResolver};
use crate::store::{ExecutionStore, InMemoryExecutionStore, InMemoryForkJobStore};
use serde::Serialize;
use std::sync::Arc;
use tracefork_core::{build_trace_comparison, TraceComparison, TraceExecution};

/// Status code of an accepted fork
pub const ACCEPTED: u16 = 202;

/// Response to an accepted fork request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkAccepted {
    pub fork_id: String,
    pub status: ForkJobStatus,
    pub base_execution_id: String,
    pub fork_node_id: String,
    pub selected_alternative_outcome: String,
    pub poll_url: String,
}

impl ForkAccepted {
    fn from_job(job: &ForkJob) -> Self {
        Self {
            fork_id: job.fork_id.clone(),
            status: job.status,
            base_execution_id: job.base_execution_id.clone(),
            fork_node_id: job.fork_node_id.clone(),
            selected_alternative_outcome: job.selected_alternative_outcome.clone(),
            poll_url: format!("/api/traces/fork/{}", job.fork_id),
        }
    }

    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        ACCEPTED
    }
}

/// Fork and comparison request handlers over injected collaborators
#[derive(Clone)]
pub struct TraceForkService {
    orchestrator: ForkOrchestrator,
    scopes: Arc<dyn ScopeResolver>,
    flags: Arc<dyn FeatureFlagSource>,
    compare_subtree_limit: usize,
}

impl std::fmt::Debug for TraceForkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceForkService")
            .field("orchestrator", &self.orchestrator)
            .field("flags", &self.flags.flags())
            .field("compare_subtree_limit", &self.compare_subtree_limit)
            .finish_non_exhaustive()
    }
}

impl TraceForkService {
    #[must_use]
    pub fn new(
        orchestrator: ForkOrchestrator,
        scopes: Arc<dyn ScopeResolver>,
        flags: Arc<dyn FeatureFlagSource>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            orchestrator,
            scopes,
            flags,
            compare_subtree_limit: config.compare_subtree_limit,
        }
    }

    /// Service over fresh in-memory stores
    #[must_use]
    pub fn in_memory(config: &EngineConfig, scopes: HeaderScopeResolver) -> Self {
        let executions = Arc::new(InMemoryExecutionStore::new(
            config.max_traces,
            config.default_project_id.clone(),
        ));
        let jobs = Arc::new(InMemoryForkJobStore::new());
        let orchestrator = ForkOrchestrator::new(executions, jobs, config);
        Self::new(
            orchestrator,
            Arc::new(scopes),
            Arc::new(InMemoryFeatureFlags::new(config.flags)),
            config,
        )
    }

    #[inline]
    #[must_use]
    pub fn orchestrator(&self) -> &ForkOrchestrator {
        &self.orchestrator
    }

    /// Execution store shared with the orchestrator
    #[inline]
    #[must_use]
    pub fn executions(&self) -> &Arc<dyn ExecutionStore> {
        self.orchestrator.executions()
    }

    /// Accept a fork request; the fork itself runs asynchronously
    ///
    /// # Errors
    /// `ServiceDisabled`, `InvalidInput` or `NotFound`; none of them
    /// creates a job
    pub fn create_fork(
        &self,
        ctx: &RequestContext,
        body: &str,
    ) -> Result<ForkAccepted, EngineError> {
        self.submit_fork(ctx, body).map(|handle| ForkAccepted::from_job(&handle.job))
    }

    /// Like [`create_fork`](Self::create_fork), returning the run handle
    ///
    /// # Errors
    /// Same as [`create_fork`](Self::create_fork)
    pub fn submit_fork(&self, ctx: &RequestContext, body: &str) -> Result<ForkHandle, EngineError> {
        if self.flags.flags().fork_disabled {
            return Err(EngineError::ServiceDisabled(
                "Trace forking is disabled by server configuration.".into(),
            ));
        }
        let request = AlternativeRequest::from_json(body)?;
        let scope = self.scopes.resolve(ctx)?;
        self.orchestrator.submit(&scope, &request)
    }

    /// Current state of a fork job
    ///
    /// # Errors
    /// Scope rejection, or `NotFound` for an unknown or out-of-scope job
    pub fn fork_status(&self, ctx: &RequestContext, fork_id: &str) -> Result<ForkJob, EngineError> {
        let scope = self.scopes.resolve(ctx)?;
        self.orchestrator
            .jobs()
            .get(fork_id)
            .filter(|job| scope.permits(Some(job.project_id.as_str())))
            .ok_or_else(|| EngineError::NotFound(format!("Fork job {fork_id} not found.")))
    }

    /// Synchronous side-by-side comparison for an alternative outcome
    ///
    /// # Errors
    /// `ServiceDisabled`, `InvalidInput`, `NotFound` (execution or node),
    /// or `ResourceLimitExceeded` for an oversized subtree
    pub fn compare(
        &self,
        ctx: &RequestContext,
        body: &str,
    ) -> Result<TraceComparison, EngineError> {
        if self.flags.flags().compare_disabled {
            return Err(EngineError::ServiceDisabled(
                "Trace comparison is disabled by server configuration.".into(),
            ));
        }
        let request = AlternativeRequest::from_json(body)?;
        let scope = self.scopes.resolve(ctx)?;
        let execution = self.scoped_execution(&scope, &request.execution_id)?;
        let comparison = build_trace_comparison(
            &execution,
            &request.node_id,
            &request.alternative_outcome,
            self.compare_subtree_limit,
        )?;
        tracing::info!(
            comparison_id = %comparison.comparison_id,
            execution_id = %request.execution_id,
            node_id = %request.node_id,
            diff_compute_ms = comparison.timings_ms.diff_compute_ms,
            "comparison built"
        );
        Ok(comparison)
    }

    /// Fetch an execution visible to the caller
    ///
    /// # Errors
    /// Scope rejection, or `NotFound`
    pub fn get_trace(
        &self,
        ctx: &RequestContext,
        execution_id: &str,
    ) -> Result<Arc<TraceExecution>, EngineError> {
        let scope = self.scopes.resolve(ctx)?;
        self.scoped_execution(&scope, execution_id)
    }

    #[must_use]
    pub fn flags(&self) -> FeatureFlags {
        self.flags.flags()
    }

    /// Patch feature flags from a JSON body
    ///
    /// # Errors
    /// `InvalidInput` on malformed JSON or non-boolean fields
    pub fn update_flags(&self, body: &str) -> Result<FeatureFlags, EngineError> {
        let update = FlagUpdate::from_json(body)?;
        Ok(self.flags.update(update))
    }

    fn scoped_execution(
        &self,
        scope: &ProjectScope,
        execution_id: &str,
    ) -> Result<Arc<TraceExecution>, EngineError> {
        let executions = self.orchestrator.executions();
        let execution = executions
            .get(execution_id)
            .ok_or_else(|| trace_not_found(execution_id))?;
        if scope.permits(executions.project_id(execution_id).as_deref()) {
            Ok(execution)
        } else {
            Err(trace_not_found(execution_id))
        }
    }
}
