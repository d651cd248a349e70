//! Optimistic mutation engine

use super::state::{validate_transition, MutationState};
use crate::entry::CacheEntry;
use crate::error::MutationError;
use crate::key::{KeyMatcher, QueryKey};
use crate::store::QueryStore;
use dashmap::DashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use ulid::Ulid;

/// Unique mutation identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(Ulid);

impl MutationId {
    /// Fresh id
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MutationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

type Transform<T> = Arc<dyn Fn(&T) -> T + Send + Sync>;

/// What a mutation touches and how
///
/// Every target holds a `T`; the transform must be pure.
pub struct MutationPlan<T> {
    label: String,
    targets: Vec<QueryKey>,
    transform: Transform<T>,
    invalidates: Vec<KeyMatcher>,
}

impl<T: Send + Sync + 'static> MutationPlan<T> {
    /// Plan applying `transform` to every target
    pub fn new<F>(label: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&T) -> T + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            targets: Vec::new(),
            transform: Arc::new(transform),
            invalidates: Vec::new(),
        }
    }

    /// With an optimistically patched key
    #[must_use]
    pub fn with_target(mut self, key: QueryKey) -> Self {
        self.targets.push(key);
        self
    }

    /// With a dependent selection invalidated on success
    #[must_use]
    pub fn with_invalidation(mut self, matcher: impl Into<KeyMatcher>) -> Self {
        self.invalidates.push(matcher.into());
        self
    }

    /// Label used in logs
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Optimistically patched keys
    #[inline]
    #[must_use]
    pub fn targets(&self) -> &[QueryKey] {
        &self.targets
    }
}

impl<T> fmt::Debug for MutationPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationPlan")
            .field("label", &self.label)
            .field("targets", &self.targets)
            .field("invalidates", &self.invalidates)
            .finish_non_exhaustive()
    }
}

/// An outstanding mutation
#[derive(Debug, Clone)]
pub struct PendingMutation {
    /// Mutation id
    pub id: MutationId,
    /// Label from the plan
    pub label: String,
    /// Optimistically patched keys
    pub targets: Vec<QueryKey>,
    /// Current lifecycle state
    pub state: MutationState,
    /// When the mutation began
    pub started_at: Instant,
}

/// Runs optimistic mutations against a [`QueryStore`]
#[derive(Debug, Clone)]
pub struct MutationEngine {
    store: QueryStore,
    pending: Arc<DashMap<MutationId, PendingMutation>>,
}

impl MutationEngine {
    /// Engine writing into `store`
    #[must_use]
    pub fn new(store: QueryStore) -> Self {
        Self {
            store,
            pending: Arc::new(DashMap::new()),
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    /// Outstanding mutations, oldest first
    #[must_use]
    pub fn pending(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<_> = self.pending.iter().map(|m| m.value().clone()).collect();
        pending.sort_by_key(|m| m.id);
        pending
    }

    /// Lifecycle state of the newest mutation touching `key`
    #[must_use]
    pub fn key_state(&self, key: &QueryKey) -> MutationState {
        self.pending
            .iter()
            .filter(|m| m.targets.contains(key))
            .max_by_key(|m| m.id)
            .map_or(MutationState::Idle, |m| m.state)
    }

    /// Apply `plan` optimistically, then settle on `request`
    ///
    /// 1. supersede in-flight fetches of the targets
    /// 2. snapshot the targets
    /// 3. write the transform into the cache
    /// 4. await the request
    /// 5. on success invalidate targets and dependents, which refetch
    /// 6. on failure restore every snapshot and return the error
    ///
    /// Racing mutations on one key roll back to whichever snapshot is
    /// restored last. Dropping the returned future before it settles
    /// restores the snapshots.
    ///
    /// # Errors
    /// `MutationError::Request` when the request fails, `MutationError::Query`
    /// when a target holds data of another type
    pub async fn mutate<T, R, E, Fut>(
        &self,
        plan: MutationPlan<T>,
        request: Fut,
    ) -> Result<R, MutationError>
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let MutationPlan {
            label,
            targets,
            transform,
            invalidates,
        } = plan;
        let id = MutationId::new();
        self.pending.insert(
            id,
            PendingMutation {
                id,
                label: label.clone(),
                targets: targets.clone(),
                state: MutationState::Idle,
                started_at: Instant::now(),
            },
        );
        let mut guard = Rollback::new(self, id);

        for key in &targets {
            self.store.cancel(key);
        }
        guard.snapshots = targets
            .iter()
            .filter_map(|key| self.store.get_entry(key))
            .collect();
        for key in &targets {
            self.store.set_entry::<T, _>(key, |data| transform(data))?;
        }
        self.advance(id, MutationState::OptimisticallyApplied)?;
        tracing::debug!(%id, %label, targets = targets.len(), "optimistic write applied");

        self.advance(id, MutationState::Settling)?;
        match request.await {
            Ok(response) => {
                guard.disarm();
                self.advance(id, MutationState::Confirmed)?;
                // one pass, so a key selected twice refetches once
                self.store.invalidate(KeyMatcher::predicate(move |key| {
                    targets.contains(key) || invalidates.iter().any(|m| m.matches(key))
                }));
                tracing::info!(%id, %label, "mutation confirmed");
                Ok(response)
            }
            Err(error) => {
                guard.restore();
                self.advance(id, MutationState::RolledBack)?;
                tracing::warn!(%id, %label, %error, "mutation rolled back");
                Err(MutationError::request(error))
            }
        }
    }

    fn advance(&self, id: MutationId, to: MutationState) -> Result<(), MutationError> {
        let Some(mut pending) = self.pending.get_mut(&id) else {
            return Ok(());
        };
        validate_transition(pending.state, to)?;
        pending.state = to;
        Ok(())
    }
}

/// Restores snapshots unless disarmed; always deregisters the mutation
struct Rollback<'a> {
    engine: &'a MutationEngine,
    id: MutationId,
    snapshots: Vec<CacheEntry>,
    armed: bool,
}

impl<'a> Rollback<'a> {
    fn new(engine: &'a MutationEngine, id: MutationId) -> Self {
        Self {
            engine,
            id,
            snapshots: Vec::new(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
        self.snapshots.clear();
    }

    fn restore(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        for snapshot in self.snapshots.drain(..) {
            self.engine.store.restore(&snapshot);
        }
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(id = %self.id, "mutation abandoned before settling; restoring snapshots");
        }
        self.restore();
        self.engine.pending.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn seeded(value: u32) -> (MutationEngine, QueryKey) {
        let store = QueryStore::new();
        let key = QueryKey::new("counter");
        store.set_data(key.clone(), value);
        (MutationEngine::new(store), key)
    }

    #[tokio::test]
    async fn success_keeps_the_optimistic_value() {
        let (engine, key) = seeded(1);
        let plan = MutationPlan::new("increment", |n: &u32| n + 1).with_target(key.clone());

        let out = engine.mutate(plan, async { Ok::<_, io::Error>("ok") }).await.unwrap();

        assert_eq!(out, "ok");
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&2));
        assert!(engine.store().get_entry(&key).unwrap().invalidated);
        assert!(engine.pending().is_empty());
    }

    #[tokio::test]
    async fn failure_restores_the_snapshot() {
        let (engine, key) = seeded(1);
        let plan = MutationPlan::new("increment", |n: &u32| n + 1).with_target(key.clone());

        let err = engine
            .mutate(plan, async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "rejected")) })
            .await
            .unwrap_err();

        assert!(err.is_request_failure());
        let entry = engine.store().get_entry(&key).unwrap();
        assert_eq!(entry.data_as::<u32>().unwrap().as_deref(), Some(&1));
        assert!(!entry.invalidated);
        assert_eq!(engine.key_state(&key), MutationState::Idle);
    }

    #[tokio::test]
    async fn optimistic_value_is_visible_while_settling() {
        let (engine, key) = seeded(1);
        let (tx, rx) = tokio::sync::oneshot::channel::<Result<(), io::Error>>();
        let plan = MutationPlan::new("increment", |n: &u32| n + 1).with_target(key.clone());

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .mutate(plan, async move { rx.await.unwrap_or(Ok(())) })
                    .await
            })
        };
        tokio::task::yield_now().await;
        while engine.pending().is_empty() {
            tokio::task::yield_now().await;
        }

        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&2));
        assert_eq!(engine.key_state(&key), MutationState::Settling);
        assert_eq!(engine.pending()[0].label, "increment");

        tx.send(Ok(())).unwrap();
        task.await.unwrap().unwrap();
        assert_eq!(engine.key_state(&key), MutationState::Idle);
    }

    #[tokio::test]
    async fn type_mismatch_aborts_before_the_request() {
        let (engine, key) = seeded(1);
        let plan = MutationPlan::new("rename", |s: &String| s.clone()).with_target(key.clone());

        let err = engine
            .mutate(plan, async { Ok::<_, io::Error>(()) })
            .await
            .unwrap_err();

        assert!(matches!(err, MutationError::Query(_)));
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&1));
        assert!(engine.pending().is_empty());
    }

    async fn wait_for_pending(engine: &MutationEngine, count: usize) {
        while engine.pending().len() != count {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn racing_rollbacks_restore_the_last_snapshot() {
        let (engine, key) = seeded(1);
        let (tx_first, rx_first) = tokio::sync::oneshot::channel::<Result<(), io::Error>>();
        let (tx_second, rx_second) = tokio::sync::oneshot::channel::<Result<(), io::Error>>();

        let first = {
            let engine = engine.clone();
            let plan = MutationPlan::new("add one", |n: &u32| n + 1).with_target(key.clone());
            tokio::spawn(async move {
                engine.mutate(plan, async move { rx_first.await.unwrap_or(Ok(())) }).await
            })
        };
        wait_for_pending(&engine, 1).await;
        let second = {
            let engine = engine.clone();
            let plan = MutationPlan::new("add ten", |n: &u32| n + 10).with_target(key.clone());
            tokio::spawn(async move {
                engine.mutate(plan, async move { rx_second.await.unwrap_or(Ok(())) }).await
            })
        };
        wait_for_pending(&engine, 2).await;
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&12));

        tx_first.send(Err(io::Error::new(io::ErrorKind::Other, "first refused"))).unwrap();
        assert!(first.await.unwrap().is_err());
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&1));

        // the second snapshot was taken over the first optimistic write
        tx_second.send(Err(io::Error::new(io::ErrorKind::Other, "second refused"))).unwrap();
        assert!(second.await.unwrap().is_err());
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&2));
        assert!(engine.pending().is_empty());
    }

    #[tokio::test]
    async fn abandoned_mutation_restores_its_snapshot() {
        let (engine, key) = seeded(1);
        let plan = MutationPlan::new("increment", |n: &u32| n + 1).with_target(key.clone());

        let task = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .mutate(plan, std::future::pending::<Result<(), io::Error>>())
                    .await
            })
        };
        wait_for_pending(&engine, 1).await;
        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&2));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(engine.store().get_data::<u32>(&key).unwrap().as_deref(), Some(&1));
        assert!(engine.pending().is_empty());
        assert_eq!(engine.key_state(&key), MutationState::Idle);
    }

    #[test]
    fn ids_are_ordered_by_creation() {
        let a = MutationId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = MutationId::new();
        assert!(a < b);
    }
}
