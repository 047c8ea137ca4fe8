use crate::error::TransitionError;
use crate::job::ForkJobStatus;

/// Validates a fork job status change.
///
/// `queued -> running -> {completed | failed}`; terminal states have no exits
/// and no state may transition to itself.
pub fn validate_transition(from: ForkJobStatus, to: ForkJobStatus) -> Result<(), TransitionError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(TransitionError { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: ForkJobStatus) -> &'static [ForkJobStatus] {
    use ForkJobStatus::*;
    match from {
        Queued => &[Running],
        Running => &[Completed, Failed],
        Completed | Failed => &[],
    }
}
