//! Mutation lifecycle state machine

use crate::error::MutationError;

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationState {
    /// No mutation outstanding
    Idle,
    /// Speculative transform written to the cache
    OptimisticallyApplied,
    /// Network request in flight
    Settling,
    /// Server accepted; affected keys invalidated
    Confirmed,
    /// Server rejected; snapshots restored
    RolledBack,
}

impl MutationState {
    /// Every state, in lifecycle order
    pub const ALL: [Self; 5] = [
        Self::Idle,
        Self::OptimisticallyApplied,
        Self::Settling,
        Self::Confirmed,
        Self::RolledBack,
    ];

    /// Settled states end the mutation
    #[inline]
    #[must_use]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Confirmed | Self::RolledBack)
    }
}

/// Validates a lifecycle transition.
///
/// # Errors
/// `MutationError::IllegalTransition` when `to` is not reachable from `from`
pub fn validate_transition(from: MutationState, to: MutationState) -> Result<(), MutationError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(MutationError::IllegalTransition { from, to })
    }
}

/// States reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: MutationState) -> Vec<MutationState> {
    use MutationState::{Confirmed, Idle, OptimisticallyApplied, RolledBack, Settling};
    match from {
        Idle => vec![OptimisticallyApplied],
        // a failed local write is undone before anything is sent
        OptimisticallyApplied => vec![Settling, RolledBack],
        Settling => vec![Confirmed, RolledBack],
        Confirmed | RolledBack => vec![Idle],
    }
}
