//! Scoped fork construction
//!
//! Produces a new execution that shares nothing with its source: the whole
//! trace is cloned, only the fork node's subtree is perturbed, and the
//! aggregate totals are recomputed over every root tree.

use crate::error::{SubtreeOperation, TraceError};
use crate::model::{ExecutionStatus, ForkMode, TraceExecution};
use crate::perturb::apply_scoped_perturbation;
use crate::tree::{count_subtree, find_node, find_node_mut};

/// Result of forking an execution
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedFork {
    /// The new execution, lineage fields set
    pub execution: TraceExecution,
    /// Nodes in the re-evaluated subtree
    pub affected_nodes: usize,
}

/// Fork `source` at `fork_node_id`, selecting `alternative`
///
/// # Errors
/// - `TraceError::NodeNotFound` if no root tree contains the node
/// - `TraceError::SubtreeTooLarge` if the subtree exceeds `subtree_limit`
pub fn build_scoped_fork_execution(
    source: &TraceExecution,
    fork_execution_id: &str,
    fork_node_id: &str,
    alternative: &str,
    subtree_limit: usize,
) -> Result<ScopedFork, TraceError> {
    // Size check against the source so an oversized fork never pays for a clone
    let affected_nodes = find_node(&source.root_decisions, fork_node_id)
        .map(count_subtree)
        .ok_or_else(|| TraceError::node_not_found(fork_node_id))?;
    if affected_nodes > subtree_limit {
        return Err(TraceError::SubtreeTooLarge {
            operation: SubtreeOperation::Fork,
            nodes: affected_nodes,
            limit: subtree_limit,
        });
    }

    let mut forked = source.clone();
    let fork_node = find_node_mut(&mut forked.root_decisions, fork_node_id)
        .ok_or_else(|| TraceError::node_not_found(fork_node_id))?;
    apply_scoped_perturbation(fork_node, alternative);

    forked.recompute_totals();
    forked.execution_id = fork_execution_id.to_string();
    forked.start_time = chrono::Utc::now().to_rfc3339();
    forked.status = ExecutionStatus::Warning;
    forked.source_execution_id = Some(source.execution_id.clone());
    forked.fork_node_id = Some(fork_node_id.to_string());
    forked.fork_mode = Some(ForkMode::Scoped);

    Ok(ScopedFork {
        execution: forked,
        affected_nodes,
    })
}
