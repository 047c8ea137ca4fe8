//! Tracefork Core - decision trace forking primitives
//!
//! Pure building blocks for "what if this agent had decided differently":
//! - Decision tree model and traversal utilities
//! - Deterministic, seed-derived perturbation (no wall clock, no RNG)
//! - Alternative-outcome application for previews and committed forks
//! - Trade-off aggregation and structural diffing of two decision trees
//!
//! Nothing here performs I/O. Job lifecycles, stores and request handling
//! live in `tracefork-engine`.
//!
//! # Example
//!
//! ```rust
//! use tracefork_core::{build_trace_comparison, DecisionNode, TraceExecution};
//!
//! let root = DecisionNode::new("plan", "use cache", 92.0)
//!     .with_cost(0.4)
//!     .with_child(DecisionNode::new("fetch", "hit", 88.0).with_duration(1.5));
//! let execution = TraceExecution::new("exec-1", "orchestrator").with_root(root);
//!
//! let comparison = build_trace_comparison(&execution, "plan", "skip cache", 2500).unwrap();
//! assert_eq!(comparison.alternative_path.decision_outcome, "skip cache");
//! assert!(comparison.diff_summary.added_node_ids.is_empty());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod compare;
pub mod error;
pub mod fork;
pub mod jitter;
pub mod model;
pub mod perturb;
pub mod tree;

pub use compare::{
    build_trace_comparison, compute_diff_summary, compute_tradeoffs, ComparisonStatus,
    ComparisonTimings, DataQuality, DecisionDelta, DiffSummary, TraceComparison, TradeoffMetrics,
};
pub use error::{SubtreeOperation, TraceError};
pub use fork::{build_scoped_fork_execution, ScopedFork};
pub use jitter::{jitter, seed_hash};
pub use model::{Alternative, DecisionNode, ExecutionStatus, ForkMode, TraceExecution};
pub use perturb::{apply_alternative_outcome, apply_scoped_perturbation};
pub use tree::{
    context_preview, count_subtree, find_node, find_node_mut, flatten, flatten_all, tree_depth,
    ConfidenceBand,
};

/// Largest subtree a committed fork may re-evaluate.
pub const DEFAULT_FORK_SUBTREE_LIMIT: usize = 3000;

/// Largest subtree the synchronous comparison path will touch.
pub const DEFAULT_COMPARE_SUBTREE_LIMIT: usize = 2500;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
