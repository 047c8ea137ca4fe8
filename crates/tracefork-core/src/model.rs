//! Trace data model
//!
//! Wire names match the JSON contract consumed by the dashboard:
//! decision nodes nest through `children`, executions carry their
//! aggregate cost/duration and optional fork lineage.

use crate::tree;
use serde::{Deserialize, Serialize};

/// A candidate outcome that was considered but not chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Candidate outcome
    pub outcome: String,
    /// Why the agent passed on it
    #[serde(default)]
    pub rejection_reason: String,
}

impl Alternative {
    /// Create new alternative
    #[inline]
    #[must_use]
    pub fn new(outcome: impl Into<String>, rejection_reason: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
            rejection_reason: rejection_reason.into(),
        }
    }
}

/// One decision made during an execution
///
/// Children are owned, so a node's subtree is itself a `DecisionNode` and
/// `Clone` is a structural deep copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    /// Unique within an execution
    pub node_id: String,
    /// Short name for tree views
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Free-text rationale
    #[serde(default)]
    pub decision_context: String,
    /// Confidence in [0, 100]
    pub confidence_score: f64,
    /// ISO 8601
    #[serde(default)]
    pub timestamp: String,
    /// Outcome actually chosen
    pub decision_outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternatives_considered: Option<Vec<Alternative>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_decision_id: Option<String>,
    #[serde(default)]
    pub agent_id: String,
    /// USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    /// Seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DecisionNode>,
}

impl DecisionNode {
    /// Create a leaf node
    #[must_use]
    pub fn new(
        node_id: impl Into<String>,
        decision_outcome: impl Into<String>,
        confidence_score: f64,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            label: None,
            decision_context: String::new(),
            confidence_score,
            timestamp: String::new(),
            decision_outcome: decision_outcome.into(),
            alternatives_considered: None,
            parent_decision_id: None,
            agent_id: String::new(),
            cost: None,
            duration: None,
            children: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.decision_context = context.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Record an alternative that was considered
    #[must_use]
    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternatives_considered
            .get_or_insert_with(Vec::new)
            .push(alternative);
        self
    }

    /// Append a child, linking its `parent_decision_id`
    #[must_use]
    pub fn with_child(mut self, mut child: DecisionNode) -> Self {
        child.parent_decision_id = Some(self.node_id.clone());
        self.children.push(child);
        self
    }

    /// Whether the node has no children
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Execution status vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Warning,
    Failed,
    #[default]
    Pending,
    Running,
}

/// How much of the trace a fork re-evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkMode {
    /// Only the fork node's downstream subtree
    Scoped,
    /// The whole trace
    Full,
}

/// One recorded or simulated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceExecution {
    pub execution_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub agent_id: String,
    /// ISO 8601
    #[serde(default)]
    pub start_time: String,
    /// Seconds, aggregate over the whole tree
    #[serde(default)]
    pub duration: f64,
    /// USD, aggregate over the whole tree
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub status: ExecutionStatus,
    #[serde(default)]
    pub root_decisions: Vec<DecisionNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_execution_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_mode: Option<ForkMode>,
}

impl TraceExecution {
    /// Create an empty execution
    #[must_use]
    pub fn new(execution_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            project_id: None,
            agent_id: agent_id.into(),
            start_time: String::new(),
            duration: 0.0,
            cost: 0.0,
            status: ExecutionStatus::Pending,
            root_decisions: Vec::new(),
            source_execution_id: None,
            fork_node_id: None,
            fork_mode: None,
        }
    }

    /// Append a root decision and refresh the aggregate totals
    #[must_use]
    pub fn with_root(mut self, root: DecisionNode) -> Self {
        self.root_decisions.push(root);
        self.recompute_totals();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: ExecutionStatus) -> Self {
        self.status = status;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Sum cost and duration over every node of every root tree,
    /// treating missing values as zero
    #[must_use]
    pub fn totals(&self) -> (f64, f64) {
        tree::flatten_all(&self.root_decisions)
            .into_iter()
            .fold((0.0, 0.0), |(cost, duration), node| {
                (
                    cost + node.cost.unwrap_or(0.0),
                    duration + node.duration.unwrap_or(0.0),
                )
            })
    }

    /// Overwrite `cost`/`duration` with the tree totals
    pub fn recompute_totals(&mut self) {
        let (cost, duration) = self.totals();
        self.cost = cost;
        self.duration = duration;
    }

    /// Whether this execution was derived from another by forking
    #[inline]
    #[must_use]
    pub fn is_fork(&self) -> bool {
        self.source_execution_id.is_some()
    }

    /// Total number of decision nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root_decisions.iter().map(tree::count_subtree).sum()
    }
}
