//! Cache entry snapshots and typed query state

use crate::error::QueryError;
use crate::key::QueryKey;
use std::any::Any;
use std::sync::Arc;
use tokio::time::Instant;

/// Type-erased cached value
pub type AnyData = Arc<dyn Any + Send + Sync>;

/// Lifecycle of an entry's last fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryStatus {
    /// Never fetched
    #[default]
    Idle,
    /// First fetch in flight, no data yet
    Loading,
    /// Last fetch succeeded
    Success,
    /// Last fetch failed; earlier data, if any, is kept
    Error,
}

/// Point-in-time copy of one cache entry
///
/// Also serves as the rollback snapshot for optimistic mutations:
/// [`crate::QueryStore::restore`] writes it back verbatim.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Entry key
    pub key: QueryKey,
    /// Last known-good value
    pub data: Option<AnyData>,
    /// Fetch status
    pub status: QueryStatus,
    /// Error of the last failed fetch
    pub error: Option<QueryError>,
    /// Completion time of the last successful fetch
    pub last_fetched_at: Option<Instant>,
    /// Explicitly invalidated since the last successful fetch
    pub invalidated: bool,
    /// Older than its stale time, or invalidated
    pub is_stale: bool,
    /// A fetch is in flight
    pub is_fetching: bool,
    /// Live subscriptions
    pub subscribers: usize,
}

impl CacheEntry {
    /// Typed view of the cached value
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` if the value is not a `T`
    pub fn data_as<T: Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, QueryError> {
        match &self.data {
            None => Ok(None),
            Some(data) => Arc::clone(data)
                .downcast::<T>()
                .map(Some)
                .map_err(|_| QueryError::type_mismatch::<T>(&self.key)),
        }
    }
}

/// Typed state handed to consumers of a subscription
#[derive(Debug)]
pub struct QueryState<T> {
    /// Last known-good value
    pub data: Option<Arc<T>>,
    /// Fetch status
    pub status: QueryStatus,
    /// Error of the last failed fetch
    pub error: Option<QueryError>,
    /// Older than its stale time, or invalidated
    pub is_stale: bool,
    /// A fetch is in flight
    pub is_fetching: bool,
    /// Completion time of the last successful fetch
    pub last_fetched_at: Option<Instant>,
}

impl<T: Send + Sync + 'static> QueryState<T> {
    pub(crate) fn from_entry(entry: &CacheEntry) -> Self {
        let (data, error) = match entry.data_as::<T>() {
            Ok(data) => (data, entry.error.clone()),
            Err(mismatch) => (None, Some(mismatch)),
        };
        Self {
            data,
            status: entry.status,
            error,
            is_stale: entry.is_stale,
            is_fetching: entry.is_fetching,
            last_fetched_at: entry.last_fetched_at,
        }
    }

    pub(crate) fn evicted(key: &QueryKey) -> Self {
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: Some(QueryError::Evicted(key.clone())),
            is_stale: true,
            is_fetching: false,
            last_fetched_at: None,
        }
    }
}

impl<T> QueryState<T> {
    /// First load in progress
    #[inline]
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    /// Last fetch failed
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }
}

impl<T> Clone for QueryState<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            is_stale: self.is_stale,
            is_fetching: self.is_fetching,
            last_fetched_at: self.last_fetched_at,
        }
    }
}
