//! DQ Query - keyed query cache and optimistic mutations
//!
//! Provides:
//! - [`QueryStore`]: explicitly constructed cache of asynchronous fetch
//!   results with single-flight fetching, stale-while-revalidate and
//!   subscriber-aware eviction
//! - [`Subscription`]: live handle keeping an entry alive
//! - [`MutationEngine`]: snapshot, speculative write, settle
//!
//! # Example
//!
//! ```rust
//! use dq_query::{QueryKey, QueryOptions, QueryStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = QueryStore::new();
//! let key = QueryKey::new("tasks").with_param("page", 1);
//!
//! let mut tasks = store.subscribe(key, || async { Ok::<_, String>(vec![1, 2, 3]) }, QueryOptions::new());
//! let state = tasks.settled().await;
//! assert_eq!(state.data.as_deref(), Some(&vec![1, 2, 3]));
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod entry;
pub mod error;
pub mod key;
pub mod mutation;
pub mod options;
pub mod store;
pub mod subscription;

pub use entry::{AnyData, CacheEntry, QueryState, QueryStatus};
pub use error::{MutationError, QueryError, QueryResult};
pub use key::{KeyMatcher, QueryKey};
pub use mutation::{
    allowed_transitions, validate_transition, MutationEngine, MutationId, MutationPlan,
    MutationState, PendingMutation,
};
pub use options::{QueryOptions, RefetchTriggers, DEFAULT_CACHE_TIME};
pub use store::{QueryStore, StoreStats};
pub use subscription::Subscription;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
