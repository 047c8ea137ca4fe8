//! Error types for trace operations

use std::fmt;

/// Which bounded operation rejected a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeOperation {
    /// Synchronous side-by-side comparison
    Compare,
    /// Committed scoped fork
    Fork,
}

impl fmt::Display for SubtreeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubtreeOperation::Compare => write!(f, "compare"),
            SubtreeOperation::Fork => write!(f, "re-execute"),
        }
    }
}

/// Errors raised while comparing or forking a trace
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// Fork node is not present in any root tree
    #[error("Decision node not found: {node_id}")]
    NodeNotFound { node_id: String },

    /// Subtree exceeds the hard size bound for the operation
    #[error("Fork subtree too large to {operation} safely ({nodes} nodes, limit {limit}).")]
    SubtreeTooLarge {
        operation: SubtreeOperation,
        nodes: usize,
        limit: usize,
    },
}

impl TraceError {
    /// Construct a not-found error
    #[inline]
    pub fn node_not_found(node_id: impl Into<String>) -> Self {
        Self::NodeNotFound {
            node_id: node_id.into(),
        }
    }

    /// Whether the error is a size-bound rejection
    #[inline]
    #[must_use]
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, Self::SubtreeTooLarge { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = TraceError::node_not_found("decision-9");
        assert_eq!(err.to_string(), "Decision node not found: decision-9");
        assert!(!err.is_resource_limit());
    }

    #[test]
    fn too_large_display_names_operation() {
        let err = TraceError::SubtreeTooLarge {
            operation: SubtreeOperation::Compare,
            nodes: 2501,
            limit: 2500,
        };
        assert!(err.to_string().contains("too large to compare safely (2501 nodes"));
        assert!(err.is_resource_limit());

        let err = TraceError::SubtreeTooLarge {
            operation: SubtreeOperation::Fork,
            nodes: 3001,
            limit: 3000,
        };
        assert!(err.to_string().contains("re-execute"));
    }
}
