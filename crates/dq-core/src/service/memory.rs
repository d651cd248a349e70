//! In-memory developer backend
//!
//! Serves the same envelopes as the HTTP API from a mutable task set. Used by
//! the simulator and the test suites; supports latency, call counting and
//! deterministic failure injection on status updates.

use super::{ApiResponse, BoardPayload, DashboardPayload, TaskService};
use crate::error::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;
use dq_domain::{
    BacklogItem, BacklogStatus, BoardFilter, CanonicalStatus, Pagination, Sprint, SprintId, Task,
    TaskFilters, TaskId, TaskPage,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// Backend endpoints, for call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET developer/tasks`
    ListTasks,
    /// `PUT developer/tasks/{id}/status`
    UpdateStatus,
    /// `GET developer/sprints/{id}/board`
    SprintBoard,
    /// `GET developer/dashboard`
    Dashboard,
}

#[derive(Debug, Default)]
struct Backend {
    tasks: Vec<Task>,
    sprints: Vec<Sprint>,
    backlog: HashMap<SprintId, Vec<BacklogItem>>,
    active_sprint: Option<SprintId>,
    updates_seen: u64,
    fail_next: u32,
    fail_every: Option<u64>,
    unavailable: bool,
}

/// In-memory [`TaskService`]
#[derive(Debug)]
pub struct InMemoryTaskService {
    developer: String,
    latency: Duration,
    state: Mutex<Backend>,
    calls: DashMap<Endpoint, usize>,
}

impl InMemoryTaskService {
    /// Empty backend serving `developer`
    #[must_use]
    pub fn new(developer: impl Into<String>) -> Self {
        Self {
            developer: developer.into(),
            latency: Duration::ZERO,
            state: Mutex::new(Backend::default()),
            calls: DashMap::new(),
        }
    }

    /// With response latency
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// With tasks
    #[must_use]
    pub fn with_tasks(self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.state.lock().tasks.extend(tasks);
        self
    }

    /// With a sprint; the first sprint added becomes the active one
    #[must_use]
    pub fn with_sprint(self, sprint: Sprint) -> Self {
        {
            let mut state = self.state.lock();
            if state.active_sprint.is_none() {
                state.active_sprint = Some(sprint.id.clone());
            }
            state.sprints.push(sprint);
        }
        self
    }

    /// With a backlog item in `sprint`'s backlog
    #[must_use]
    pub fn with_backlog_item(self, sprint: impl Into<SprintId>, item: BacklogItem) -> Self {
        self.state
            .lock()
            .backlog
            .entry(sprint.into())
            .or_default()
            .push(item);
        self
    }

    /// Reject the next `count` status updates
    pub fn fail_next_updates(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Reject every `n`th status update; `0` disables
    pub fn fail_every_update(&self, n: u64) {
        self.state.lock().fail_every = (n > 0).then_some(n);
    }

    /// Fail every call at the transport level
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Change a task behind the client's back, as another user would
    pub fn set_task_status(&self, id: &TaskId, status: CanonicalStatus) -> bool {
        let mut state = self.state.lock();
        apply_status(&mut state, id, status)
    }

    /// Server copy of a task
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state.lock().tasks.iter().find(|t| &t.id == id).cloned()
    }

    /// Calls served by `endpoint`
    #[must_use]
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls.get(&endpoint).map_or(0, |count| *count)
    }

    /// Calls served across all endpoints
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.iter().map(|entry| *entry.value()).sum()
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), ServiceError> {
        *self.calls.entry(endpoint).or_insert(0) += 1;
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.state.lock().unavailable {
            return Err(ServiceError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

/// Update a task and any backlog copy of it; `false` when the id is unknown
fn apply_status(state: &mut Backend, id: &TaskId, status: CanonicalStatus) -> bool {
    let mut found = false;
    for task in state.tasks.iter_mut().filter(|t| &t.id == id) {
        task.status = status.into();
        found = true;
    }
    for item in state
        .backlog
        .values_mut()
        .flatten()
        .filter(|item| item.id == id.as_str())
    {
        item.status = BacklogStatus::from(status).as_str().to_string();
        found = true;
    }
    found
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn list_tasks(
        &self,
        filters: &TaskFilters,
        page_size: u32,
    ) -> Result<ApiResponse<TaskPage>, ServiceError> {
        self.enter(Endpoint::ListTasks).await?;
        let state = self.state.lock();
        let matching: Vec<&Task> = state
            .tasks
            .iter()
            .filter(|t| t.assignee.as_deref() == Some(self.developer.as_str()))
            .filter(|t| filters.matches(t))
            .collect();

        let size = page_size.max(1) as usize;
        let start = (filters.page.max(1) as usize - 1).saturating_mul(size);
        let tasks = matching.iter().skip(start).take(size).map(|t| (*t).clone()).collect();
        let pagination = Pagination::new(filters.page, page_size, matching.len() as u64);
        Ok(ApiResponse::ok(TaskPage { tasks, pagination }))
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: CanonicalStatus,
    ) -> Result<ApiResponse<Task>, ServiceError> {
        self.enter(Endpoint::UpdateStatus).await?;
        let mut state = self.state.lock();
        state.updates_seen += 1;

        let injected = if state.fail_next > 0 {
            state.fail_next -= 1;
            true
        } else {
            state
                .fail_every
                .is_some_and(|n| state.updates_seen % n == 0)
        };
        if injected {
            tracing::debug!(task = %id, %status, "status update rejected by fault injection");
            return Ok(ApiResponse::failure("status update rejected"));
        }

        if !apply_status(&mut state, id, status) {
            return Ok(ApiResponse::failure(format!("task {id} not found")));
        }
        let updated = state.tasks.iter().find(|t| &t.id == id).cloned();
        Ok(match updated {
            Some(task) => ApiResponse::ok(task),
            // backlog-only item: answer with its transplanted form
            None => state
                .backlog
                .iter()
                .find_map(|(sprint, items)| {
                    items
                        .iter()
                        .find(|item| item.id == id.as_str())
                        .map(|item| item.clone().into_task(Some(sprint.clone())))
                })
                .map_or_else(|| ApiResponse::failure("task vanished"), ApiResponse::ok),
        })
    }

    async fn sprint_board(
        &self,
        sprint: &SprintId,
        filter: BoardFilter,
    ) -> Result<ApiResponse<BoardPayload>, ServiceError> {
        self.enter(Endpoint::SprintBoard).await?;
        let state = self.state.lock();
        let Some(found) = state.sprints.iter().find(|s| &s.id == sprint).cloned() else {
            return Ok(ApiResponse::failure(format!("sprint {sprint} not found")));
        };

        let tasks = state
            .tasks
            .iter()
            .filter(|t| t.sprint.as_ref() == Some(sprint))
            .filter(|t| match filter {
                BoardFilter::All => true,
                BoardFilter::Mine => t.assignee.as_deref() == Some(self.developer.as_str()),
            })
            .cloned()
            .collect();
        let backlog_items = match filter {
            BoardFilter::All => state.backlog.get(sprint).cloned().unwrap_or_default(),
            BoardFilter::Mine => Vec::new(),
        };

        Ok(ApiResponse::ok(BoardPayload {
            sprint: found,
            tasks,
            backlog_items,
        }))
    }

    async fn dashboard(&self) -> Result<ApiResponse<DashboardPayload>, ServiceError> {
        self.enter(Endpoint::Dashboard).await?;
        let state = self.state.lock();
        let active_sprint = state
            .active_sprint
            .as_ref()
            .and_then(|id| state.sprints.iter().find(|s| &s.id == id).cloned());
        let assigned_tasks = state
            .tasks
            .iter()
            .filter(|t| t.assignee.as_deref() == Some(self.developer.as_str()))
            .cloned()
            .collect();
        Ok(ApiResponse::ok(DashboardPayload {
            active_sprint,
            assigned_tasks,
        }))
    }
}
