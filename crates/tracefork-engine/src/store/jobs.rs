//! Fork job store

use crate::error::StoreError;
use crate::job::{ForkJob, ForkJobPatch};
use crate::state_machine::validate_transition;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Persistence for fork job records
pub trait ForkJobStore: Send + Sync {
    /// Insert a new job
    ///
    /// # Errors
    /// `StoreError::DuplicateJob` if the id is taken
    fn create(&self, job: ForkJob) -> Result<ForkJob, StoreError>;

    /// Apply `patch` atomically and return the updated record
    ///
    /// # Errors
    /// - `StoreError::JobNotFound` for an unknown id
    /// - `StoreError::Transition` if the status change is illegal; the record is left untouched
    fn update(&self, fork_id: &str, patch: ForkJobPatch) -> Result<ForkJob, StoreError>;

    /// Snapshot of the current record
    fn get(&self, fork_id: &str) -> Option<ForkJob>;
}

/// In-memory job store
///
/// Each record is read and written under its `DashMap` shard lock, so a
/// reader never sees a half-applied patch.
#[derive(Debug, Default)]
pub struct InMemoryForkJobStore {
    jobs: DashMap<String, ForkJob>,
}

impl InMemoryForkJobStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs ever created
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl ForkJobStore for InMemoryForkJobStore {
    fn create(&self, job: ForkJob) -> Result<ForkJob, StoreError> {
        match self.jobs.entry(job.fork_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::DuplicateJob(job.fork_id)),
            Entry::Vacant(slot) => Ok(slot.insert(job).value().clone()),
        }
    }

    fn update(&self, fork_id: &str, patch: ForkJobPatch) -> Result<ForkJob, StoreError> {
        let mut entry = self
            .jobs
            .get_mut(fork_id)
            .ok_or_else(|| StoreError::JobNotFound(fork_id.to_string()))?;

        match patch.status {
            Some(to) => validate_transition(entry.status, to)?,
            None if entry.is_terminal() => {
                return Err(StoreError::JobTerminal(fork_id.to_string()));
            }
            None => {}
        }
        patch.apply_to(&mut entry);
        entry.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(entry.value().clone())
    }

    fn get(&self, fork_id: &str) -> Option<ForkJob> {
        self.jobs.get(fork_id).map(|entry| entry.value().clone())
    }
}
