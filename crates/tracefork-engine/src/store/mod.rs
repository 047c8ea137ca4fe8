//! Collaborator stores
//!
//! Both stores are process-wide shared state behind a trait, so a durable
//! backend can replace the in-memory one without touching the orchestrator.
//! Reads hand out snapshots: an `Arc` to an immutable execution, or a clone
//! of a job record taken under its entry lock.

pub mod executions;
pub mod jobs;

pub use executions::{ExecutionStore, InMemoryExecutionStore};
pub use jobs::{ForkJobStore, InMemoryForkJobStore};
