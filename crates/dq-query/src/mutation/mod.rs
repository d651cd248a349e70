//! Optimistic mutations
//!
//! A mutation snapshots the entries it touches, writes a speculative value
//! into the cache, then settles on the network request: confirmed mutations
//! invalidate their targets and dependents so the server copy replaces the
//! guess; rejected ones restore the snapshots verbatim.

mod engine;
mod state;

pub use engine::{MutationEngine, MutationId, MutationPlan, PendingMutation};
pub use state::{allowed_transitions, validate_transition, MutationState};
