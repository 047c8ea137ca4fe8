//! Trade-off aggregation and structural diffing
//!
//! Both functions flatten the two subtrees and index them by `node_id`.
//! Per-decision deltas are ordered by combined magnitude so the largest
//! simulated impact comes first.

use crate::error::{SubtreeOperation, TraceError};
use crate::model::{DecisionNode, TraceExecution};
use crate::perturb::apply_alternative_outcome;
use crate::tree::{count_subtree, find_node, flatten};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use ulid::Ulid;

const VALUE_EPSILON: f64 = 1e-6;

const COMPARISON_NOTE: &str =
    "Trade-offs are estimated via heuristic perturbation (no scoped re-execution yet).";

/// Whether a delta was measured or simulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Estimated,
    Observed,
}

/// Change in one decision between base and alternative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDelta {
    pub node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub confidence_delta: f64,
    pub cost_delta: f64,
    pub latency_delta_s: f64,
    pub data_quality: DataQuality,
}

impl DecisionDelta {
    /// Sum of absolute confidence, cost and latency deltas
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.confidence_delta.abs() + self.cost_delta.abs() + self.latency_delta_s.abs()
    }
}

/// Aggregate before/after metrics for a subtree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeoffMetrics {
    pub base_confidence_avg: f64,
    pub alt_confidence_avg: f64,
    pub confidence_delta: f64,

    pub base_cost_total: f64,
    pub alt_cost_total: f64,
    pub cost_delta: f64,

    pub base_latency_total_s: f64,
    pub alt_latency_total_s: f64,
    pub latency_delta_s: f64,

    pub per_decision_deltas: Vec<DecisionDelta>,
}

/// Node ids that differ between two trees, each list in traversal order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub changed_node_ids: Vec<String>,
    pub added_node_ids: Vec<String>,
    pub removed_node_ids: Vec<String>,
}

impl DiffSummary {
    /// Whether the trees have identical node sets
    #[inline]
    #[must_use]
    pub fn is_shape_preserving(&self) -> bool {
        self.added_node_ids.is_empty() && self.removed_node_ids.is_empty()
    }
}

/// Comparison status (the synchronous path only ever completes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonTimings {
    pub diff_compute_ms: u64,
}

/// Side-by-side preview of an alternative outcome, never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceComparison {
    pub comparison_id: String,
    pub status: ComparisonStatus,
    pub created_at: String,

    pub execution_id: String,
    pub fork_node_id: String,
    pub selected_alternative_outcome: String,

    pub base_path: DecisionNode,
    pub alternative_path: DecisionNode,

    pub diff_summary: DiffSummary,
    pub tradeoff_metrics: TradeoffMetrics,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub timings_ms: ComparisonTimings,
}

fn index_by_id<'a>(nodes: &[&'a DecisionNode]) -> IndexMap<&'a str, &'a DecisionNode> {
    let mut index = IndexMap::with_capacity(nodes.len());
    for node in nodes {
        index.insert(node.node_id.as_str(), *node);
    }
    index
}

#[allow(clippy::cast_precision_loss)]
fn average(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let len = values.len();
    if len == 0 {
        return 0.0;
    }
    values.sum::<f64>() / len as f64
}

fn total(values: impl Iterator<Item = Option<f64>>) -> f64 {
    values.map(|v| v.unwrap_or(0.0)).sum()
}

/// Aggregate confidence/cost/duration before and after, plus per-node deltas
#[must_use]
pub fn compute_tradeoffs(base_path: &DecisionNode, alt_path: &DecisionNode) -> TradeoffMetrics {
    let base_flat = flatten(base_path);
    let alt_flat = flatten(alt_path);
    let base_by_id = index_by_id(&base_flat);
    let alt_by_id = index_by_id(&alt_flat);

    let base_confidence_avg = average(base_flat.iter().map(|n| n.confidence_score));
    let alt_confidence_avg = average(alt_flat.iter().map(|n| n.confidence_score));
    let base_cost_total = total(base_flat.iter().map(|n| n.cost));
    let alt_cost_total = total(alt_flat.iter().map(|n| n.cost));
    let base_latency_total_s = total(base_flat.iter().map(|n| n.duration));
    let alt_latency_total_s = total(alt_flat.iter().map(|n| n.duration));

    let mut per_decision_deltas: Vec<DecisionDelta> = base_by_id
        .iter()
        .filter_map(|(id, base)| {
            let alt = alt_by_id.get(id)?;
            Some(DecisionDelta {
                node_id: (*id).to_string(),
                label: alt.label.clone().or_else(|| base.label.clone()),
                confidence_delta: alt.confidence_score - base.confidence_score,
                cost_delta: alt.cost.unwrap_or(0.0) - base.cost.unwrap_or(0.0),
                latency_delta_s: alt.duration.unwrap_or(0.0) - base.duration.unwrap_or(0.0),
                data_quality: DataQuality::Estimated,
            })
        })
        .collect();
    per_decision_deltas.sort_by(|a, b| b.magnitude().total_cmp(&a.magnitude()));

    TradeoffMetrics {
        base_confidence_avg,
        alt_confidence_avg,
        confidence_delta: alt_confidence_avg - base_confidence_avg,
        base_cost_total,
        alt_cost_total,
        cost_delta: alt_cost_total - base_cost_total,
        base_latency_total_s,
        alt_latency_total_s,
        latency_delta_s: alt_latency_total_s - base_latency_total_s,
        per_decision_deltas,
    }
}

fn value_changed(base: Option<f64>, alt: Option<f64>) -> bool {
    if base.is_none() && alt.is_none() {
        return false;
    }
    (base.unwrap_or(0.0) - alt.unwrap_or(0.0)).abs() > VALUE_EPSILON
}

fn node_changed(base: &DecisionNode, alt: &DecisionNode) -> bool {
    base.decision_outcome != alt.decision_outcome
        || base.confidence_score.round() != alt.confidence_score.round()
        || value_changed(base.cost, alt.cost)
        || value_changed(base.duration, alt.duration)
}

/// Changed, added and removed node ids between two subtrees
#[must_use]
pub fn compute_diff_summary(base_path: &DecisionNode, alt_path: &DecisionNode) -> DiffSummary {
    let base_flat = flatten(base_path);
    let alt_flat = flatten(alt_path);
    let base_by_id = index_by_id(&base_flat);
    let alt_by_id = index_by_id(&alt_flat);

    let mut summary = DiffSummary::default();
    for (id, alt) in &alt_by_id {
        match base_by_id.get(id) {
            None => summary.added_node_ids.push((*id).to_string()),
            Some(base) if node_changed(base, alt) => {
                summary.changed_node_ids.push((*id).to_string());
            }
            Some(_) => {}
        }
    }
    summary.removed_node_ids = base_by_id
        .keys()
        .filter(|id| !alt_by_id.contains_key(*id))
        .map(|id| (*id).to_string())
        .collect();

    summary
}

/// Build a side-by-side comparison for `alternative` at `fork_node_id`
///
/// # Errors
/// - `TraceError::NodeNotFound` if no root tree contains the node
/// - `TraceError::SubtreeTooLarge` if the subtree exceeds `subtree_limit`
pub fn build_trace_comparison(
    execution: &TraceExecution,
    fork_node_id: &str,
    alternative: &str,
    subtree_limit: usize,
) -> Result<TraceComparison, TraceError> {
    let start = Instant::now();

    let fork_node = find_node(&execution.root_decisions, fork_node_id)
        .ok_or_else(|| TraceError::node_not_found(fork_node_id))?;

    let nodes = count_subtree(fork_node);
    if nodes > subtree_limit {
        return Err(TraceError::SubtreeTooLarge {
            operation: SubtreeOperation::Compare,
            nodes,
            limit: subtree_limit,
        });
    }

    let base_path = fork_node.clone();
    let alternative_path = apply_alternative_outcome(&base_path, alternative);
    let tradeoff_metrics = compute_tradeoffs(&base_path, &alternative_path);
    let diff_summary = compute_diff_summary(&base_path, &alternative_path);

    if !diff_summary.is_shape_preserving() {
        tracing::warn!(
            execution_id = %execution.execution_id,
            fork_node_id,
            added = diff_summary.added_node_ids.len(),
            removed = diff_summary.removed_node_ids.len(),
            "comparison changed tree shape"
        );
    }

    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    tracing::debug!(
        execution_id = %execution.execution_id,
        fork_node_id,
        nodes,
        changed = diff_summary.changed_node_ids.len(),
        elapsed_ms,
        "built trace comparison"
    );

    Ok(TraceComparison {
        comparison_id: format!(
            "cmp_{}_{}_{}",
            execution.execution_id,
            fork_node_id,
            Ulid::new()
        ),
        status: ComparisonStatus::Completed,
        created_at: chrono::Utc::now().to_rfc3339(),
        execution_id: execution.execution_id.clone(),
        fork_node_id: fork_node_id.to_string(),
        selected_alternative_outcome: alternative.to_string(),
        base_path,
        alternative_path,
        diff_summary,
        tradeoff_metrics,
        note: Some(COMPARISON_NOTE.to_string()),
        timings_ms: ComparisonTimings {
            diff_compute_ms: elapsed_ms,
        },
    })
}
