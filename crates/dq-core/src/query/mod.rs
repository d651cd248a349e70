//! Developer read models bound to the shared cache
//!
//! [`DeveloperClient`] bundles the store, the mutation engine and the backend
//! service. Each hook it hands out binds a filter-parameterised key to the
//! store and exposes the cached state plus its operations. The three read
//! models are mutually dependent: a confirmed status change in any of them
//! invalidates all three.

pub mod board;
pub mod dashboard;
pub mod tasks;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::service::{HttpTaskService, TaskService};
use dq_domain::{normalize, BoardFilter, CanonicalStatus, SprintId, Status, TaskFilters};
use dq_query::{KeyMatcher, MutationEngine, MutationPlan, QueryStore, StoreStats};
use std::sync::Arc;

pub use board::SprintBoardQuery;
pub use dashboard::DashboardQuery;
pub use tasks::TaskListQuery;

/// Resource name of the task list
pub const TASKS: &str = "tasks";
/// Resource name of sprint boards
pub const SPRINT_BOARD: &str = "sprint-board";
/// Resource name of the dashboard
pub const DASHBOARD: &str = "dashboard";

/// Every resource a task status change can affect
#[must_use]
pub fn dependents() -> [KeyMatcher; 3] {
    [
        KeyMatcher::resource(TASKS),
        KeyMatcher::resource(SPRINT_BOARD),
        KeyMatcher::resource(DASHBOARD),
    ]
}

/// Add the cross-invalidation set to a plan
pub(crate) fn with_dependents<T: Send + Sync + 'static>(plan: MutationPlan<T>) -> MutationPlan<T> {
    dependents()
        .into_iter()
        .fold(plan, |plan, matcher| plan.with_invalidation(matcher))
}

/// Resolve an outgoing status to its canonical wire value
///
/// # Errors
/// `ClientError::UnrecognizedStatus` when no vocabulary knows `raw`
pub fn target_status(raw: &str) -> Result<CanonicalStatus, ClientError> {
    match normalize(raw) {
        Status::Known(status) => Ok(status),
        Status::Unrecognized(raw) => Err(ClientError::UnrecognizedStatus(raw)),
    }
}

/// Entry point of the developer views
///
/// Cheap to clone; clones share the cache and the backend.
#[derive(Clone)]
pub struct DeveloperClient {
    store: QueryStore,
    engine: MutationEngine,
    service: Arc<dyn TaskService>,
    config: Arc<ClientConfig>,
}

impl DeveloperClient {
    /// Client over an explicit backend
    pub fn new(config: ClientConfig, service: Arc<dyn TaskService>) -> Self {
        let store = QueryStore::new();
        Self {
            engine: MutationEngine::new(store.clone()),
            store,
            service,
            config: Arc::new(config),
        }
    }

    /// Client talking to the HTTP API described by `config`
    ///
    /// # Errors
    /// `ClientError::Config` when `config` is invalid
    pub fn from_config(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let service = Arc::new(HttpTaskService::from_config(&config));
        Ok(Self::new(config, service))
    }

    /// Task list with `filters`
    #[must_use]
    pub fn tasks(&self, filters: TaskFilters) -> TaskListQuery {
        TaskListQuery::new(self.clone(), filters)
    }

    /// Board of `sprint`
    #[must_use]
    pub fn sprint_board(&self, sprint: impl Into<SprintId>, filter: BoardFilter) -> SprintBoardQuery {
        SprintBoardQuery::new(self.clone(), sprint.into(), filter)
    }

    /// Dashboard
    #[must_use]
    pub fn dashboard(&self) -> DashboardQuery {
        DashboardQuery::new(self.clone())
    }

    /// Application regained focus
    pub fn focus(&self) -> usize {
        self.store.focus()
    }

    /// Shared cache
    #[inline]
    #[must_use]
    pub fn store(&self) -> &QueryStore {
        &self.store
    }

    /// Mutation engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &MutationEngine {
        &self.engine
    }

    /// Backend
    #[inline]
    #[must_use]
    pub fn service(&self) -> &Arc<dyn TaskService> {
        &self.service
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Cache counters
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    /// Tear down the cache
    pub fn shutdown(&self) {
        self.store.clear();
        tracing::info!("developer client shut down");
    }
}

impl std::fmt::Debug for DeveloperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeveloperClient")
            .field("base_url", &self.config.base_url)
            .field("stats", &self.store.stats())
            .finish_non_exhaustive()
    }
}
