//! Keyed query cache with single-flight fetches
//!
//! [`QueryStore`] is an explicitly constructed, cloneable handle. Build one at
//! bootstrap, hand clones to every view, call [`QueryStore::clear`] on
//! teardown. There is no global instance.
//!
//! # Consistency
//!
//! Every read-modify-write of an entry happens inside one short critical
//! section, so no caller can observe an entry half updated. Fetches run
//! outside the lock; their completion is applied only if the entry's
//! generation still matches the one the fetch started under. Invalidation
//! and mutation cancellation bump the generation, which is how a superseded
//! result gets ignored instead of overwriting newer state.

use crate::entry::{AnyData, CacheEntry, QueryStatus};
use crate::error::QueryError;
use crate::key::{KeyMatcher, QueryKey};
use crate::options::QueryOptions;
use crate::subscription::Subscription;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

pub(crate) type FetchOutcome = Result<AnyData, QueryError>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;
type ErasedFetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchOutcome> + Send + Sync>;

/// Store counters for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries currently cached
    pub entries: usize,
    /// Entries with at least one subscriber
    pub subscribed: usize,
    /// Entries with a fetch in flight
    pub in_flight: usize,
    /// Fetches started since construction
    pub fetches_started: u64,
    /// Fetch results dropped because they were superseded
    pub results_discarded: u64,
    /// Entries evicted
    pub evictions: u64,
}

struct Slot {
    data: Option<AnyData>,
    status: QueryStatus,
    error: Option<QueryError>,
    last_fetched_at: Option<Instant>,
    invalidated: bool,
    generation: u64,
    in_flight: Option<SharedFetch>,
    fetcher: Option<ErasedFetcher>,
    options: QueryOptions,
    subscribers: usize,
    idle_since: Option<Instant>,
    polling: bool,
    changes: watch::Sender<u64>,
}

impl Slot {
    fn new(options: QueryOptions, generation: u64) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            data: None,
            status: QueryStatus::Idle,
            error: None,
            last_fetched_at: None,
            invalidated: false,
            generation,
            in_flight: None,
            fetcher: None,
            options,
            subscribers: 0,
            idle_since: None,
            polling: false,
            changes,
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.invalidated
            || self
                .last_fetched_at
                .map_or(true, |at| now.saturating_duration_since(at) > self.options.stale_time)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.subscribers == 0
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= self.options.cache_time)
    }

    fn wants_fetch_on_subscribe(&self, now: Instant) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        if self.data.is_none() || self.invalidated {
            return true;
        }
        self.options.triggers.on_subscribe && self.is_stale(now)
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version = version.wrapping_add(1));
    }

    fn snapshot(&self, key: &QueryKey, now: Instant) -> CacheEntry {
        CacheEntry {
            key: key.clone(),
            data: self.data.clone(),
            status: self.status,
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            invalidated: self.invalidated,
            is_stale: self.is_stale(now),
            is_fetching: self.in_flight.is_some(),
            subscribers: self.subscribers,
        }
    }
}

#[derive(Default)]
struct State {
    slots: HashMap<QueryKey, Slot>,
    next_generation: u64,
}

#[derive(Default)]
struct Counters {
    fetches_started: AtomicU64,
    results_discarded: AtomicU64,
    evictions: AtomicU64,
}

struct StoreInner {
    state: Mutex<State>,
    counters: Counters,
}

/// Process-wide query cache handle
#[derive(Clone)]
pub struct QueryStore {
    inner: Arc<StoreInner>,
}

impl QueryStore {
    /// Create empty store
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(State::default()),
                counters: Counters::default(),
            }),
        }
    }

    /// Register interest in `key`
    ///
    /// Returns immediately with whatever is cached (stale data included).
    /// Starts a background fetch when the entry has no data, was invalidated,
    /// or is stale and `options` allow subscribe-triggered refetches. A fetch
    /// already in flight is shared, never duplicated.
    ///
    /// Background fetches are spawned on the current tokio runtime when there
    /// is one; otherwise they run when first awaited.
    pub fn subscribe<T, F, Fut, E>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: fmt::Display,
    {
        let erased = erase(key.clone(), fetcher);
        let has_runtime = tokio::runtime::Handle::try_current().is_ok();

        let (changes, started, poll_every) = {
            let mut state = self.inner.state.lock();
            let State {
                slots,
                next_generation,
            } = &mut *state;
            let slot = slots.entry(key.clone()).or_insert_with(|| {
                *next_generation += 1;
                Slot::new(options, *next_generation)
            });

            slot.fetcher = Some(erased);
            slot.options = options;
            slot.subscribers += 1;
            slot.idle_since = None;
            let changes = slot.changes.subscribe();

            let started = if slot.wants_fetch_on_subscribe(Instant::now()) {
                self.launch(&key, slot)
            } else {
                tracing::debug!(key = %key, "cache hit");
                None
            };

            let poll_every = options
                .triggers
                .interval
                .filter(|_| has_runtime && !slot.polling);
            if poll_every.is_some() {
                slot.polling = true;
            }

            (changes, started, poll_every)
        };

        if let Some(fetch) = started {
            drive(fetch);
        }
        if let Some(every) = poll_every {
            self.spawn_poller(key.clone(), every);
        }

        Subscription::new(self.clone(), key, changes)
    }

    /// Snapshot of one entry
    #[must_use]
    pub fn get_entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        let state = self.inner.state.lock();
        state
            .slots
            .get(key)
            .map(|slot| slot.snapshot(key, Instant::now()))
    }

    /// Typed cached value
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` if the value is not a `T`
    pub fn get_data<T: Send + Sync + 'static>(
        &self,
        key: &QueryKey,
    ) -> Result<Option<Arc<T>>, QueryError> {
        match self.get_entry(key) {
            Some(entry) => entry.data_as::<T>(),
            None => Ok(None),
        }
    }

    /// Apply a pure transform to the cached value without going to the network
    ///
    /// Returns `Ok(false)` when the entry is missing or holds no data yet.
    /// `updater` runs under the store lock and must not call back into the store.
    ///
    /// # Errors
    /// `QueryError::TypeMismatch` if the value is not a `T`
    pub fn set_entry<T, F>(&self, key: &QueryKey, updater: F) -> Result<bool, QueryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&T) -> T,
    {
        let mut state = self.inner.state.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            return Ok(false);
        };
        let Some(data) = slot.data.clone() else {
            return Ok(false);
        };
        let current = data
            .downcast::<T>()
            .map_err(|_| QueryError::type_mismatch::<T>(key))?;

        slot.data = Some(Arc::new(updater(&current)));
        slot.notify();
        tracing::debug!(key = %key, "entry updated locally");
        Ok(true)
    }

    /// Seed or replace the cached value as if freshly fetched
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, data: T) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let State {
            slots,
            next_generation,
        } = &mut *state;
        let slot = slots.entry(key).or_insert_with(|| {
            *next_generation += 1;
            let mut slot = Slot::new(QueryOptions::default(), *next_generation);
            slot.idle_since = Some(now);
            slot
        });
        slot.data = Some(Arc::new(data));
        slot.status = QueryStatus::Success;
        slot.error = None;
        slot.last_fetched_at = Some(now);
        slot.invalidated = false;
        slot.notify();
    }

    /// Write a snapshot back verbatim
    ///
    /// A restored entry that is still invalidated and subscribed refetches
    /// unless a fetch is already in flight, since the snapshot may predate
    /// a refetch that was superseded in the meantime.
    ///
    /// Returns `false` when the entry no longer exists.
    pub fn restore(&self, snapshot: &CacheEntry) -> bool {
        let relaunched = {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.slots.get_mut(&snapshot.key) else {
                return false;
            };
            slot.data = snapshot.data.clone();
            slot.status = snapshot.status;
            slot.error = snapshot.error.clone();
            slot.last_fetched_at = snapshot.last_fetched_at;
            slot.invalidated = snapshot.invalidated;
            tracing::debug!(key = %snapshot.key, "entry restored from snapshot");
            let fetch = if slot.invalidated && slot.subscribers > 0 && slot.in_flight.is_none() {
                self.launch(&snapshot.key, slot)
            } else {
                None
            };
            if fetch.is_none() {
                slot.notify();
            }
            fetch
        };
        if let Some(fetch) = relaunched {
            tracing::debug!(key = %snapshot.key, "restored entry still invalidated; refetching");
            drive(fetch);
        }
        true
    }

    /// Supersede the in-flight fetch of `key` so its result is ignored
    ///
    /// Only entries holding data are affected; an entry still on its first
    /// load keeps its fetch. Returns whether a fetch was superseded.
    pub fn cancel(&self, key: &QueryKey) -> bool {
        let mut state = self.inner.state.lock();
        let State {
            slots,
            next_generation,
        } = &mut *state;
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        if slot.data.is_none() || slot.in_flight.is_none() {
            return false;
        }
        *next_generation += 1;
        slot.generation = *next_generation;
        slot.in_flight = None;
        slot.notify();
        tracing::debug!(key = %key, "in-flight fetch superseded");
        true
    }

    /// Mark matching entries stale
    ///
    /// Subscribed entries refetch immediately, superseding any fetch already
    /// in flight. Unsubscribed entries refetch on their next subscription.
    /// Returns the number of matched entries.
    pub fn invalidate(&self, matcher: impl Into<KeyMatcher>) -> usize {
        let matcher = matcher.into();
        let mut started = Vec::new();
        let mut matched = 0;
        {
            let mut state = self.inner.state.lock();
            let State {
                slots,
                next_generation,
            } = &mut *state;
            for (key, slot) in slots.iter_mut() {
                if !matcher.matches(key) {
                    continue;
                }
                matched += 1;
                slot.invalidated = true;
                *next_generation += 1;
                slot.generation = *next_generation;
                if slot.in_flight.take().is_some() {
                    tracing::debug!(key = %key, "in-flight fetch superseded by invalidation");
                }
                if slot.subscribers > 0 {
                    if let Some(fetch) = self.launch(key, slot) {
                        started.push(fetch);
                        continue;
                    }
                }
                slot.notify();
            }
        }
        for fetch in started {
            drive(fetch);
        }
        tracing::debug!(?matcher, matched, "invalidated");
        matched
    }

    /// Explicit refresh of one entry
    ///
    /// Joins the in-flight fetch if there is one.
    ///
    /// # Errors
    /// The fetch error, `QueryError::NoFetcher` if the entry was seeded
    /// without a subscription, `QueryError::Evicted` if the entry is gone, or
    /// `QueryError::Superseded` if a newer fetch replaced this one before it
    /// completed.
    pub async fn refetch(&self, key: &QueryKey) -> Result<(), QueryError> {
        self.start_fetch(key)?.await.map(|_| ())
    }

    /// Start (or join) a fetch of `key` without waiting for it
    pub(crate) fn start_fetch(&self, key: &QueryKey) -> Result<SharedFetch, QueryError> {
        let fetch = {
            let mut state = self.inner.state.lock();
            let slot = state
                .slots
                .get_mut(key)
                .ok_or_else(|| QueryError::Evicted(key.clone()))?;
            self.launch(key, slot)
                .ok_or_else(|| QueryError::NoFetcher(key.clone()))?
        };
        drive(fetch.clone());
        Ok(fetch)
    }

    /// Focus trigger: refetch stale subscribed entries that opted in
    ///
    /// Returns the number of fetches started or joined.
    pub fn focus(&self) -> usize {
        let now = Instant::now();
        let mut started = Vec::new();
        {
            let mut state = self.inner.state.lock();
            for (key, slot) in &mut state.slots {
                let eligible = slot.subscribers > 0
                    && slot.options.triggers.on_focus
                    && slot.in_flight.is_none()
                    && slot.is_stale(now);
                if eligible {
                    if let Some(fetch) = self.launch(key, slot) {
                        started.push(fetch);
                    }
                }
            }
        }
        let count = started.len();
        for fetch in started {
            drive(fetch);
        }
        count
    }

    /// Evict every entry idle for longer than its cache time
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        let before = state.slots.len();
        state.slots.retain(|key, slot| {
            let keep = !slot.is_expired(now);
            if !keep {
                tracing::debug!(key = %key, "entry evicted");
            }
            keep
        });
        let evicted = before - state.slots.len();
        self.inner
            .counters
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Drop every entry; in-flight results are discarded on arrival
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        let dropped = state.slots.len();
        state.slots.clear();
        tracing::debug!(dropped, "store cleared");
    }

    /// Whether `key` is cached
    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.state.lock().slots.contains_key(key)
    }

    /// Number of cached entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().slots.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let state = self.inner.state.lock();
        let counters = &self.inner.counters;
        StoreStats {
            entries: state.slots.len(),
            subscribed: state.slots.values().filter(|s| s.subscribers > 0).count(),
            in_flight: state.slots.values().filter(|s| s.in_flight.is_some()).count(),
            fetches_started: counters.fetches_started.load(Ordering::Relaxed),
            results_discarded: counters.results_discarded.load(Ordering::Relaxed),
            evictions: counters.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop one subscriber; schedule eviction when none remain
    pub(crate) fn release(&self, key: &QueryKey) {
        let cache_time = {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.slots.get_mut(key) else {
                return;
            };
            slot.subscribers = slot.subscribers.saturating_sub(1);
            if slot.subscribers > 0 {
                return;
            }
            slot.idle_since = Some(Instant::now());
            slot.options.cache_time
        };

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::downgrade(&self.inner);
        let key = key.clone();
        handle.spawn(async move {
            tokio::time::sleep(cache_time).await;
            if let Some(inner) = store.upgrade() {
                QueryStore { inner }.evict_if_expired(&key);
            }
        });
    }

    fn evict_if_expired(&self, key: &QueryKey) {
        let now = Instant::now();
        let mut state = self.inner.state.lock();
        if state.slots.get(key).is_some_and(|slot| slot.is_expired(now)) {
            state.slots.remove(key);
            self.inner.counters.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "entry evicted");
        }
    }

    /// Start a fetch for `slot`, or return the one already in flight
    fn launch(&self, key: &QueryKey, slot: &mut Slot) -> Option<SharedFetch> {
        if let Some(existing) = &slot.in_flight {
            return Some(existing.clone());
        }
        let fetcher = slot.fetcher.clone()?;
        let generation = slot.generation;
        let store = Arc::downgrade(&self.inner);
        let owned_key = key.clone();

        let fetch = async move {
            let outcome = fetcher().await;
            match store.upgrade() {
                Some(inner) => QueryStore { inner }.settle(&owned_key, generation, outcome),
                None => Err(QueryError::Evicted(owned_key)),
            }
        }
        .boxed()
        .shared();

        slot.in_flight = Some(fetch.clone());
        if slot.data.is_none() {
            slot.status = QueryStatus::Loading;
        }
        slot.notify();
        self.inner
            .counters
            .fetches_started
            .fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, generation, "fetch started");
        Some(fetch)
    }

    /// Apply a finished fetch if its generation is still current
    fn settle(&self, key: &QueryKey, generation: u64, outcome: FetchOutcome) -> FetchOutcome {
        let mut state = self.inner.state.lock();
        let Some(slot) = state.slots.get_mut(key) else {
            tracing::debug!(key = %key, "fetch finished after eviction; result dropped");
            return Err(QueryError::Evicted(key.clone()));
        };
        if slot.generation != generation {
            self.inner
                .counters
                .results_discarded
                .fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, generation, current = slot.generation, "superseded fetch result dropped");
            return Err(QueryError::Superseded(key.clone()));
        }

        slot.in_flight = None;
        match &outcome {
            Ok(data) => {
                slot.data = Some(Arc::clone(data));
                slot.status = QueryStatus::Success;
                slot.error = None;
                slot.last_fetched_at = Some(Instant::now());
                slot.invalidated = false;
                tracing::debug!(key = %key, "fetch succeeded");
            }
            Err(error) => {
                slot.status = QueryStatus::Error;
                slot.error = Some(error.clone());
                tracing::warn!(key = %key, %error, "fetch failed; cached data kept");
            }
        }
        slot.notify();
        outcome
    }

    fn spawn_poller(&self, key: QueryKey, every: Duration) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store: Weak<StoreInner> = Arc::downgrade(&self.inner);
        handle.spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = store.upgrade() else {
                    break;
                };
                let polled = QueryStore { inner };
                if !polled.poll_once(&key) {
                    break;
                }
            }
        });
    }

    /// One polling tick; returns `false` once the entry lost its subscribers
    fn poll_once(&self, key: &QueryKey) -> bool {
        let fetch = {
            let mut state = self.inner.state.lock();
            let Some(slot) = state.slots.get_mut(key) else {
                return false;
            };
            if slot.subscribers == 0 {
                slot.polling = false;
                return false;
            }
            if slot.in_flight.is_some() {
                None
            } else {
                self.launch(key, slot)
            }
        };
        if let Some(fetch) = fetch {
            drive(fetch);
        }
        true
    }
}

impl Default for QueryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryStore")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Wrap a typed fetcher into the erased form stored per entry
fn erase<T, F, Fut, E>(key: QueryKey, fetcher: F) -> ErasedFetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: fmt::Display,
{
    Arc::new(move || {
        let request = fetcher();
        let key = key.clone();
        async move {
            match request.await {
                Ok(data) => Ok(Arc::new(data) as AnyData),
                Err(error) => Err(QueryError::fetch(&key, error.to_string())),
            }
        }
        .boxed()
    })
}

/// Run a fetch to completion in the background when a runtime is available
fn drive(fetch: SharedFetch) {
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            let _ = fetch.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::RefetchTriggers;
    use std::sync::atomic::AtomicUsize;

    fn counting_fetcher(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32, String>> + Send + Sync + 'static {
        move || {
            let calls = Arc::clone(&calls);
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(u32::try_from(n).unwrap())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_subscribers_share_one_fetch() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");

        let mut first = store.subscribe::<u32, _, _, _>(
            key.clone(),
            counting_fetcher(Arc::clone(&calls)),
            QueryOptions::new(),
        );
        let mut second = store.subscribe::<u32, _, _, _>(
            key.clone(),
            counting_fetcher(Arc::clone(&calls)),
            QueryOptions::new(),
        );

        assert!(first.state().is_loading());
        let a = first.settled().await;
        let b = second.settled().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.data.as_deref(), Some(&1));
        assert_eq!(b.data.as_deref(), Some(&1));
        assert_eq!(store.stats().fetches_started, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_is_served_without_fetch() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(30));

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        drop(sub);

        let again = store.subscribe::<u32, _, _, _>(key, counting_fetcher(Arc::clone(&calls)), options);
        let state = again.state();
        assert!(!state.is_fetching);
        assert!(!state.is_stale);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_entry_returns_old_data_while_revalidating() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(30));

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        tokio::time::advance(Duration::from_secs(31)).await;

        let mut again = store.subscribe::<u32, _, _, _>(key, counting_fetcher(Arc::clone(&calls)), options);
        let state = again.state();
        assert_eq!(state.data.as_deref(), Some(&1));
        assert!(state.is_fetching);
        assert_eq!(state.status, QueryStatus::Success);

        let settled = again.settled().await;
        assert_eq!(settled.data.as_deref(), Some(&2));
        drop(sub);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_only_entry_does_not_refetch_on_subscribe() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("sprint-board");
        let options = QueryOptions::new()
            .with_stale_time(Duration::from_secs(60))
            .with_triggers(RefetchTriggers::explicit_only());

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        tokio::time::advance(Duration::from_secs(120)).await;

        let again = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        assert!(again.state().is_stale);
        assert!(!again.state().is_fetching);
        assert_eq!(store.focus(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.invalidate(&key);
        let state = sub.settled().await;
        assert_eq!(state.data.as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_keeps_previous_data() {
        let store = QueryStore::new();
        let key = QueryKey::new("tasks");
        let fail = Arc::new(AtomicUsize::new(0));
        let fetcher = {
            let fail = Arc::clone(&fail);
            move || {
                let fail = Arc::clone(&fail);
                async move {
                    if fail.load(Ordering::SeqCst) > 0 {
                        Err("backend down".to_string())
                    } else {
                        Ok(5u32)
                    }
                }
            }
        };

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), fetcher, QueryOptions::new());
        sub.settled().await;
        fail.store(1, Ordering::SeqCst);

        let result = sub.refetch().await;
        assert!(matches!(result, Err(QueryError::Fetch { .. })));

        let state = sub.state();
        assert_eq!(state.status, QueryStatus::Error);
        assert_eq!(state.data.as_deref(), Some(&5));
        assert!(state.error.unwrap().to_string().contains("backend down"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_supersedes_in_flight_fetch() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), QueryOptions::new());
        sub.settled().await;

        sub.refetch_in_background();
        assert!(sub.state().is_fetching);
        store.invalidate(KeyMatcher::resource("tasks"));

        let state = sub.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(state.data.as_deref(), Some(&3));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(store.stats().results_discarded, 1);
        assert_eq!(store.get_data::<u32>(&key).unwrap().as_deref(), Some(&3));
    }

    #[tokio::test]
    async fn set_entry_and_restore() {
        let store = QueryStore::new();
        let key = QueryKey::new("tasks");
        assert!(!store.set_entry::<u32, _>(&key, |n| n + 1).unwrap());

        store.set_data(key.clone(), 10u32);
        let snapshot = store.get_entry(&key).unwrap();

        assert!(store.set_entry::<u32, _>(&key, |n| n + 1).unwrap());
        assert_eq!(store.get_data::<u32>(&key).unwrap().as_deref(), Some(&11));

        assert!(store.restore(&snapshot));
        assert_eq!(store.get_data::<u32>(&key).unwrap().as_deref(), Some(&10));

        let mismatch = store.set_entry::<String, _>(&key, Clone::clone);
        assert!(matches!(mismatch, Err(QueryError::TypeMismatch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn restoring_an_invalidated_snapshot_refetches() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("sprint-board");
        let options = QueryOptions::new().with_triggers(RefetchTriggers::explicit_only());

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;

        store.invalidate(&key);
        let snapshot = store.get_entry(&key).unwrap();
        assert!(snapshot.invalidated && snapshot.is_fetching);
        assert!(store.cancel(&key));
        assert!(!sub.state().is_fetching);

        assert!(store.restore(&snapshot));
        assert!(sub.state().is_fetching);

        let state = sub.settled().await;
        assert_eq!(state.data.as_deref(), Some(&3));
        assert!(!store.get_entry(&key).unwrap().invalidated);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribed_entry_is_evicted_after_cache_time() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");
        let options = QueryOptions::new().with_cache_time(Duration::from_secs(60));

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        drop(sub);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(store.contains(&key));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(!store.contains(&key));
        assert_eq!(store.stats().evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resubscribing_before_cache_time_keeps_entry() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = QueryKey::new("tasks");
        let options = QueryOptions::new()
            .with_cache_time(Duration::from_secs(60))
            .with_stale_time(Duration::from_secs(600));

        let mut sub = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        drop(sub);
        tokio::time::sleep(Duration::from_secs(30)).await;
        let _keep = store.subscribe::<u32, _, _, _>(key.clone(), counting_fetcher(Arc::clone(&calls)), options);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.contains(&key));
        assert_eq!(store.sweep(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_refetches_stale_subscribed_entries() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_stale_time(Duration::from_secs(30));

        let mut sub = store.subscribe::<u32, _, _, _>(QueryKey::new("tasks"), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;

        assert_eq!(store.focus(), 0);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.focus(), 1);
        sub.settled().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_polls_while_subscribed() {
        let store = QueryStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let options = QueryOptions::new().with_refetch_interval(Duration::from_secs(10));

        let mut sub = store.subscribe::<u32, _, _, _>(QueryKey::new("dashboard"), counting_fetcher(Arc::clone(&calls)), options);
        sub.settled().await;
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        drop(sub);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn clear_tears_down_everything() {
        let store = QueryStore::new();
        store.set_data(QueryKey::new("a"), 1u8);
        store.set_data(QueryKey::new("b"), 2u8);
        assert_eq!(store.len(), 2);
        store.clear();
        assert!(store.is_empty());
    }
}
