//! Error types for the fork engine
//!
//! Every error maps onto one of five caller-facing kinds:
//! - `InvalidInput`: malformed or missing request fields
//! - `NotFound`: execution, node or job absent, or outside the caller's project
//! - `ServiceDisabled`: feature flag off
//! - `ResourceLimitExceeded`: subtree over the hard size bound
//! - `InternalFailure`: anything unexpected

use crate::job::ForkJobStatus;
use serde::Serialize;
use std::collections::BTreeMap;
use tracefork_core::TraceError;

/// Caller-facing error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    ServiceDisabled,
    ResourceLimitExceeded,
    InternalFailure,
}

impl ErrorKind {
    /// HTTP-style status code for a transport layer
    #[inline]
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::InvalidInput => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::ResourceLimitExceeded => 422,
            ErrorKind::InternalFailure => 500,
            ErrorKind::ServiceDisabled => 503,
        }
    }
}

/// Per-field validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Request body or fields rejected
    #[error("{message}")]
    InvalidInput {
        message: String,
        details: FieldErrors,
    },

    /// Resource absent or not visible to the caller
    #[error("{0}")]
    NotFound(String),

    /// Feature switched off
    #[error("{0}")]
    ServiceDisabled(String),

    /// Tree operation failed
    #[error(transparent)]
    Trace(#[from] TraceError),

    /// Job store rejected a write
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Unexpected failure
    #[error("{0}")]
    Internal(String),
}

impl EngineError {
    /// Invalid input without field details
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            details: FieldErrors::new(),
        }
    }

    /// Classify for callers
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::NotFound(_) | Self::Trace(TraceError::NodeNotFound { .. }) => ErrorKind::NotFound,
            Self::ServiceDisabled(_) => ErrorKind::ServiceDisabled,
            Self::Trace(TraceError::SubtreeTooLarge { .. }) => ErrorKind::ResourceLimitExceeded,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    /// HTTP-style status code
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Serializable response body
    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let details = match self {
            Self::InvalidInput { details, .. } if !details.is_empty() => Some(details.clone()),
            _ => None,
        };
        ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
            details,
        }
    }
}

/// Wire shape of an error response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<FieldErrors>,
}

/// Illegal fork job status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal fork job transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: ForkJobStatus,
    pub to: ForkJobStatus,
}

/// Fork job store errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No job with this id
    #[error("fork job not found: {0}")]
    JobNotFound(String),

    /// Id already taken
    #[error("fork job already exists: {0}")]
    DuplicateJob(String),

    /// Job already finished; its record is frozen
    #[error("fork job already finished: {0}")]
    JobTerminal(String),

    /// Status change rejected by the state machine
    #[error(transparent)]
    Transition(#[from] TransitionError),
}
