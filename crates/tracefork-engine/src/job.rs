//! Fork job records
//!
//! A job is created `queued` at request time and written exactly twice
//! afterwards by its deferred run: once to `running`, once to a terminal
//! state. Patches carry only the fields a write changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracefork_core::ForkMode;

/// Fork job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkJobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl ForkJobStatus {
    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// No further transitions once terminal
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ForkJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkTimings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_exec_ms: Option<u64>,
}

impl ForkTimings {
    #[inline]
    #[must_use]
    pub fn fork_exec(ms: u64) -> Self {
        Self {
            fork_exec_ms: Some(ms),
        }
    }
}

/// Asynchronous progress of one fork request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkJob {
    pub fork_id: String,
    pub project_id: String,
    pub status: ForkJobStatus,
    pub created_at: String,
    pub updated_at: String,
    pub base_execution_id: String,
    pub fork_node_id: String,
    pub selected_alternative_outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_nodes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ForkMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings_ms: Option<ForkTimings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForkJob {
    /// New job in `queued`
    #[must_use]
    pub fn queued(
        fork_id: impl Into<String>,
        project_id: impl Into<String>,
        base_execution_id: impl Into<String>,
        fork_node_id: impl Into<String>,
        selected_alternative_outcome: impl Into<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            fork_id: fork_id.into(),
            project_id: project_id.into(),
            status: ForkJobStatus::Queued,
            created_at: now.clone(),
            updated_at: now,
            base_execution_id: base_execution_id.into(),
            fork_node_id: fork_node_id.into(),
            selected_alternative_outcome: selected_alternative_outcome.into(),
            fork_execution_id: None,
            note: Some("Fork queued for scoped downstream re-execution.".to_string()),
            affected_nodes: None,
            mode: None,
            timings_ms: None,
            error: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Partial update to a [`ForkJob`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForkJobPatch {
    pub status: Option<ForkJobStatus>,
    pub fork_execution_id: Option<String>,
    pub note: Option<String>,
    pub affected_nodes: Option<usize>,
    pub mode: Option<ForkMode>,
    pub timings_ms: Option<ForkTimings>,
    pub error: Option<String>,
}

impl ForkJobPatch {
    /// Transition to `running`
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: Some(ForkJobStatus::Running),
            note: Some("Fork is running.".to_string()),
            ..Self::default()
        }
    }

    /// Transition to `completed`
    #[must_use]
    pub fn completed(
        fork_execution_id: impl Into<String>,
        affected_nodes: usize,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            status: Some(ForkJobStatus::Completed),
            fork_execution_id: Some(fork_execution_id.into()),
            affected_nodes: Some(affected_nodes),
            mode: Some(ForkMode::Scoped),
            note: Some(
                "Scoped downstream re-execution simulated: only fork subtree was re-evaluated."
                    .to_string(),
            ),
            timings_ms: Some(ForkTimings::fork_exec(elapsed_ms)),
            ..Self::default()
        }
    }

    /// Transition to `failed`
    #[must_use]
    pub fn failed(error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: Some(ForkJobStatus::Failed),
            error: Some(error.into()),
            timings_ms: Some(ForkTimings::fork_exec(elapsed_ms)),
            ..Self::default()
        }
    }

    /// Overlay the set fields onto `job`
    pub fn apply_to(self, job: &mut ForkJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(id) = self.fork_execution_id {
            job.fork_execution_id = Some(id);
        }
        if let Some(note) = self.note {
            job.note = Some(note);
        }
        if let Some(count) = self.affected_nodes {
            job.affected_nodes = Some(count);
        }
        if let Some(mode) = self.mode {
            job.mode = Some(mode);
        }
        if let Some(timings) = self.timings_ms {
            job.timings_ms = Some(timings);
        }
        if let Some(error) = self.error {
            job.error = Some(error);
        }
    }
}
