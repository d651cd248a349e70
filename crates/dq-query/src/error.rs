//! Error types for the query layer
//!
//! Provides error handling for:
//! - Fetch operations (shared by every single-flight waiter, hence `Clone`)
//! - Optimistic mutations (request failure, illegal lifecycle transitions)

use crate::key::QueryKey;
use crate::mutation::MutationState;

/// Errors raised by cache reads and fetches
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// The fetcher failed or the backend answered with `success: false`
    #[error("fetch failed for {key}: {message}")]
    Fetch {
        /// Key being fetched
        key: QueryKey,
        /// Failure description
        message: String,
    },

    /// A newer invalidation or mutation replaced this fetch; its result was dropped
    #[error("fetch superseded for {0}")]
    Superseded(QueryKey),

    /// Cached data is not of the requested type
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        /// Key being read
        key: QueryKey,
        /// Requested type name
        expected: &'static str,
    },

    /// Entry has no fetcher to refetch with
    #[error("no fetcher registered for {0}")]
    NoFetcher(QueryKey),

    /// Entry was evicted or the store was cleared
    #[error("entry evicted: {0}")]
    Evicted(QueryKey),
}

impl QueryError {
    /// Create fetch error for key
    pub fn fetch(key: &QueryKey, message: impl Into<String>) -> Self {
        Self::Fetch {
            key: key.clone(),
            message: message.into(),
        }
    }

    /// Create type mismatch error for key
    #[must_use]
    pub fn type_mismatch<T>(key: &QueryKey) -> Self {
        Self::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        }
    }
}

/// Errors raised by the optimistic mutation engine
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    /// Network request failed; the optimistic write was rolled back
    #[error("request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Lifecycle transition not in the transition table
    #[error("illegal mutation transition: {from:?} -> {to:?}")]
    IllegalTransition {
        /// Current state
        from: MutationState,
        /// Requested state
        to: MutationState,
    },

    /// Applying the optimistic transform failed; nothing was sent
    #[error("optimistic write failed: {0}")]
    Query(#[from] QueryError),
}

impl MutationError {
    /// Wrap a request error
    pub fn request<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Request(Box::new(error))
    }

    /// Whether the failure came from the network request
    #[inline]
    #[must_use]
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::Request(_))
    }
}

/// Result type alias for query operations
pub type QueryResult<T> = Result<T, QueryError>;
