//! Tracefork Engine - asynchronous fork jobs over recorded decision traces
//!
//! Wires the pure builders from `tracefork-core` to the collaborators a
//! running service needs:
//! - Execution and fork job stores (in-memory, concurrent)
//! - Fork job state machine (`queued -> running -> completed | failed`)
//! - Fork orchestrator running scoped re-execution on background tasks
//! - Project scoping and runtime feature flags
//! - `TraceForkService`, the transport-neutral request surface
//!
//! # Example
//!
//! ```rust,no_run
//! use tracefork_engine::{EngineConfig, HeaderScopeResolver, RequestContext, TraceForkService};
//!
//! # async fn demo() -> Result<(), tracefork_engine::EngineError> {
//! let config = EngineConfig::default();
//! let scopes = HeaderScopeResolver::new().with_project("p1");
//! let service = TraceForkService::in_memory(&config, scopes);
//! let ctx = RequestContext::for_project("p1");
//! let accepted = service.create_fork(
//!     &ctx,
//!     r#"{"execution_id":"exec-1","node_id":"plan","alternative_outcome":"skip cache"}"#,
//! )?;
//! println!("poll {}", accepted.poll_url);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod error;
pub mod flags;
pub mod job;
pub mod orchestrator;
pub mod request;
pub mod scope;
pub mod service;
pub mod state_machine;
pub mod store;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorBody, ErrorKind, FieldErrors, StoreError, TransitionError};
pub use flags::{FeatureFlagSource, FeatureFlags, FlagUpdate, InMemoryFeatureFlags};
pub use job::{ForkJob, ForkJobPatch, ForkJobStatus, ForkTimings};
pub use orchestrator::{ForkHandle, ForkOrchestrator};
pub use request::AlternativeRequest;
pub use scope::{
    HeaderScopeResolver, ProjectScope, RequestContext, ScopeResolver, ADMIN_OVERRIDE_HEADER,
    PROJECT_HEADER, USER_HEADER,
};
pub use service::{ForkAccepted, TraceForkService};
pub use state_machine::{allowed_transitions, validate_transition};
pub use store::{ExecutionStore, ForkJobStore, InMemoryExecutionStore, InMemoryForkJobStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
