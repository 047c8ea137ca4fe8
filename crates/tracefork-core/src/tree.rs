//! Decision tree utilities
//!
//! All traversals are pre-order and iterative, so deep chains never
//! recurse on the call stack.

use crate::model::DecisionNode;

/// Depth-first search across all root trees, first match wins
#[must_use]
pub fn find_node<'a>(roots: &'a [DecisionNode], node_id: &str) -> Option<&'a DecisionNode> {
    let mut stack: Vec<&DecisionNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.node_id == node_id {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Mutable counterpart of [`find_node`]
pub fn find_node_mut<'a>(
    roots: &'a mut [DecisionNode],
    node_id: &str,
) -> Option<&'a mut DecisionNode> {
    let mut stack: Vec<&mut DecisionNode> = roots.iter_mut().rev().collect();
    while let Some(node) = stack.pop() {
        if node.node_id == node_id {
            return Some(node);
        }
        stack.extend(node.children.iter_mut().rev());
    }
    None
}

/// Pre-order list of `root` and all its descendants
#[must_use]
pub fn flatten(root: &DecisionNode) -> Vec<&DecisionNode> {
    flatten_all(std::slice::from_ref(root))
}

/// Pre-order list over every root tree, in root order
#[must_use]
pub fn flatten_all(roots: &[DecisionNode]) -> Vec<&DecisionNode> {
    let mut out = Vec::new();
    let mut stack: Vec<&DecisionNode> = roots.iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(node.children.iter().rev());
    }
    out
}

/// Number of nodes in the subtree rooted at `root`, equal to `flatten(root).len()`
#[must_use]
pub fn count_subtree(root: &DecisionNode) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

/// Visit every node of the subtree in pre-order with its traversal index
pub(crate) fn for_each_preorder_mut<F>(root: &mut DecisionNode, mut visit: F)
where
    F: FnMut(usize, &mut DecisionNode),
{
    let mut index = 0;
    let mut stack: Vec<&mut DecisionNode> = vec![root];
    while let Some(node) = stack.pop() {
        visit(index, node);
        index += 1;
        stack.extend(node.children.iter_mut().rev());
    }
}

/// Maximum depth over all root trees (a lone root is depth 1)
#[must_use]
pub fn tree_depth(roots: &[DecisionNode]) -> usize {
    let mut max_depth = 0;
    let mut stack: Vec<(&DecisionNode, usize)> = roots.iter().map(|n| (n, 1)).collect();
    while let Some((node, depth)) = stack.pop() {
        max_depth = max_depth.max(depth);
        stack.extend(node.children.iter().map(|c| (c, depth + 1)));
    }
    max_depth
}

/// Short preview of a decision context for tree views
#[must_use]
pub fn context_preview(context: &str, max_chars: usize) -> String {
    let trimmed = context.trim();
    if trimmed.is_empty() {
        return "No context".to_string();
    }
    match trimmed.char_indices().nth(max_chars) {
        None => trimmed.to_string(),
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
    }
}

/// Coarse confidence classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Classify a confidence score
    #[must_use]
    pub fn of(score: f64) -> Self {
        if score >= 80.0 {
            Self::High
        } else if score >= 60.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DecisionNode> {
        vec![
            DecisionNode::new("a", "go", 90.0)
                .with_child(
                    DecisionNode::new("a1", "go", 80.0)
                        .with_child(DecisionNode::new("a1x", "go", 70.0)),
                )
                .with_child(DecisionNode::new("a2", "go", 60.0)),
            DecisionNode::new("b", "go", 50.0).with_child(DecisionNode::new("b1", "go", 40.0)),
        ]
    }

    fn ids(nodes: &[&DecisionNode]) -> Vec<String> {
        nodes.iter().map(|n| n.node_id.clone()).collect()
    }

    #[test]
    fn flatten_is_preorder() {
        let roots = sample();
        assert_eq!(ids(&flatten(&roots[0])), vec!["a", "a1", "a1x", "a2"]);
        assert_eq!(
            ids(&flatten_all(&roots)),
            vec!["a", "a1", "a1x", "a2", "b", "b1"]
        );
    }

    #[test]
    fn find_searches_every_root() {
        let roots = sample();
        assert_eq!(find_node(&roots, "b1").map(|n| n.confidence_score), Some(40.0));
        assert_eq!(find_node(&roots, "a1x").map(|n| n.confidence_score), Some(70.0));
        assert!(find_node(&roots, "zzz").is_none());
        assert!(find_node(&[], "a").is_none());
    }

    #[test]
    fn find_returns_first_preorder_match() {
        let roots = vec![
            DecisionNode::new("r", "go", 1.0).with_child(DecisionNode::new("dup", "first", 1.0)),
            DecisionNode::new("dup", "second", 1.0),
        ];
        assert_eq!(find_node(&roots, "dup").unwrap().decision_outcome, "first");
    }

    #[test]
    fn find_mut_edits_in_place() {
        let mut roots = sample();
        find_node_mut(&mut roots, "a2").unwrap().decision_outcome = "changed".into();
        assert_eq!(roots[0].children[1].decision_outcome, "changed");
        assert!(find_node_mut(&mut roots, "missing").is_none());
    }

    #[test]
    fn count_matches_flatten() {
        let roots = sample();
        for root in &roots {
            assert_eq!(count_subtree(root), flatten(root).len());
        }
        assert_eq!(count_subtree(&roots[0].children[0]), 2);
    }

    #[test]
    fn preorder_mut_indices_follow_flatten() {
        let mut root = sample().remove(0);
        let expected = ids(&flatten(&root));
        let mut seen = Vec::new();
        for_each_preorder_mut(&mut root, |index, node| seen.push((index, node.node_id.clone())));
        assert_eq!(seen.iter().map(|(_, id)| id.clone()).collect::<Vec<_>>(), expected);
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn depth() {
        assert_eq!(tree_depth(&sample()), 3);
        assert_eq!(tree_depth(&[]), 0);
        assert_eq!(tree_depth(&[DecisionNode::new("x", "go", 1.0)]), 1);
    }

    #[test]
    fn preview_truncates() {
        assert_eq!(context_preview("   ", 10), "No context");
        assert_eq!(context_preview("  short ", 10), "short");
        assert_eq!(context_preview("abcdefghijkl", 5), "abcde...");
    }

    #[test]
    fn confidence_bands() {
        assert_eq!(ConfidenceBand::of(80.0), ConfidenceBand::High);
        assert_eq!(ConfidenceBand::of(79.9), ConfidenceBand::Medium);
        assert_eq!(ConfidenceBand::of(10.0), ConfidenceBand::Low);
    }
}
