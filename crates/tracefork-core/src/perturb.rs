//! Alternative-outcome application
//!
//! True re-execution of downstream agent work is not available, so the
//! effect of a different decision is estimated: the chosen node takes the
//! new outcome and a confidence penalty, and every downstream node is
//! nudged by seed-derived jitter. Both variants preserve tree shape.

use crate::jitter::jitter;
use crate::model::DecisionNode;
use crate::tree::for_each_preorder_mut;

/// Confidence lost by the fork root in a comparison preview
pub const COMPARE_ROOT_PENALTY: f64 = 8.0;

/// Confidence lost by the fork root in a committed fork
pub const FORK_ROOT_PENALTY: f64 = 6.0;

/// Cap on the traversal-order penalty applied to forked descendants
pub const MAX_DEPTH_PENALTY: usize = 8;

fn clamp_confidence(score: f64) -> f64 {
    score.clamp(0.0, 100.0)
}

fn scale_non_negative(value: Option<f64>, factor: f64) -> Option<f64> {
    value.map(|v| (v * factor).max(0.0))
}

/// Comparison-only variant: returns a perturbed clone of `root`
///
/// The root takes `alternative` and loses [`COMPARE_ROOT_PENALTY`]
/// confidence; its cost and duration are left alone. Descendants drift by
/// jitter seeded on their own node id.
#[must_use]
pub fn apply_alternative_outcome(root: &DecisionNode, alternative: &str) -> DecisionNode {
    let mut alt = root.clone();

    for_each_preorder_mut(&mut alt, |index, node| {
        if index == 0 {
            node.decision_outcome = alternative.to_string();
            node.confidence_score = clamp_confidence(node.confidence_score - COMPARE_ROOT_PENALTY);
            return;
        }

        let id = &node.node_id;
        node.confidence_score = clamp_confidence(
            node.confidence_score + jitter(&format!("{id}:confidence"), -3.0, 3.0),
        );
        node.cost = scale_non_negative(
            node.cost,
            1.0 + jitter(&format!("{id}:cost"), -0.04, 0.04),
        );
        node.duration = scale_non_negative(
            node.duration,
            1.0 + jitter(&format!("{id}:duration"), -0.06, 0.06),
        );
    });

    alt
}

/// Scoped-fork variant: perturbs an already-cloned subtree in place
///
/// Seeds are namespaced by `alternative`, so different alternatives at the
/// same node give different (still reproducible) results. The root records
/// the selection in its context and loses [`FORK_ROOT_PENALTY`]; every other
/// node loses `min(8, traversal index)` on top of its jitter. Cost and
/// duration drift on every node, root included.
pub fn apply_scoped_perturbation(root: &mut DecisionNode, alternative: &str) {
    for_each_preorder_mut(root, |index, node| {
        let id = &node.node_id;

        if index == 0 {
            node.decision_outcome = alternative.to_string();
            node.decision_context = format!(
                "{}\n\n[Forked alternative selected]: {alternative}",
                node.decision_context
            );
            node.confidence_score = clamp_confidence(node.confidence_score - FORK_ROOT_PENALTY);
        } else {
            #[allow(clippy::cast_precision_loss)]
            let depth_penalty = index.min(MAX_DEPTH_PENALTY) as f64;
            node.confidence_score = clamp_confidence(
                node.confidence_score
                    + jitter(&format!("{alternative}:{id}:confidence"), -5.0, 4.0)
                    - depth_penalty,
            );
        }

        node.cost = scale_non_negative(
            node.cost,
            1.0 + jitter(&format!("{alternative}:{id}:cost"), -0.08, 0.12),
        );
        node.duration = scale_non_negative(
            node.duration,
            1.0 + jitter(&format!("{alternative}:{id}:duration"), -0.10, 0.15),
        );
    });
}
