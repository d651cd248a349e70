//! Live handle on one cache entry

use crate::entry::QueryState;
use crate::error::QueryError;
use crate::key::QueryKey;
use crate::store::QueryStore;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Subscription to a cache entry
///
/// Keeps the entry alive while held. Dropping the last subscription starts
/// the entry's cache-time countdown.
pub struct Subscription<T> {
    store: QueryStore,
    key: QueryKey,
    changes: watch::Receiver<u64>,
    _data: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(store: QueryStore, key: QueryKey, changes: watch::Receiver<u64>) -> Self {
        Self {
            store,
            key,
            changes,
            _data: PhantomData,
        }
    }

    /// Subscribed key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Owning store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> QueryState<T> {
        self.store
            .get_entry(&self.key)
            .map_or_else(|| QueryState::evicted(&self.key), |entry| QueryState::from_entry(&entry))
    }

    /// Current value, if any
    #[must_use]
    pub fn data(&self) -> Option<Arc<T>> {
        self.state().data
    }

    /// Wait for the next change to the entry
    ///
    /// # Errors
    /// `QueryError::Evicted` if the entry was dropped from the store
    pub async fn changed(&mut self) -> Result<QueryState<T>, QueryError> {
        self.changes
            .changed()
            .await
            .map_err(|_| QueryError::Evicted(self.key.clone()))?;
        self.changes.borrow_and_update();
        Ok(self.state())
    }

    /// Wait until no fetch is in flight and return the resulting state
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            self.changes.borrow_and_update();
            let state = self.state();
            if !state.is_fetching {
                return state;
            }
            if self.changes.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Refetch now and wait for the result
    ///
    /// # Errors
    /// See [`QueryStore::refetch`]
    pub async fn refetch(&self) -> Result<(), QueryError> {
        self.store.refetch(&self.key).await
    }

    /// Start a refetch without waiting; returns whether one is in flight
    pub fn refetch_in_background(&self) -> bool {
        self.store.start_fetch(&self.key).is_ok()
    }

    /// Invalidate this entry only
    pub fn invalidate(&self) {
        self.store.invalidate(&self.key);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.store.release(&self.key);
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}
