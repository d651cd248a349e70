//! Outbound data-fetching boundary
//!
//! Every backend call answers with an [`ApiResponse`] envelope. A
//! `success: false` answer and a transport failure are the same failure to
//! the query layer: [`ApiResponse::into_data`] folds both into a
//! [`ServiceError`].

pub mod http;
pub mod memory;

use crate::error::ServiceError;
use async_trait::async_trait;
use dq_domain::{
    BacklogItem, BoardFilter, CanonicalStatus, DashboardSummary, Sprint, SprintBoard, SprintId,
    Task, TaskFilters, TaskId, TaskPage,
};
use serde::{Deserialize, Serialize};

pub use http::HttpTaskService;
pub use memory::{Endpoint, InMemoryTaskService};

/// Response envelope of every backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the backend accepted the request
    pub success: bool,
    /// Payload; a missing field reads as `None`
    pub data: Option<T>,
    /// Human-readable message, usually set on failure
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Failed response
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Payload of a successful response
    ///
    /// # Errors
    /// `ServiceError::Rejected` when `success` is false,
    /// `ServiceError::MissingData` when the payload is absent
    pub fn into_data(self) -> Result<T, ServiceError> {
        if !self.success {
            return Err(ServiceError::Rejected(
                self.message.unwrap_or_else(|| "request failed".into()),
            ));
        }
        self.data.ok_or(ServiceError::MissingData)
    }
}

/// Sprint board payload as served
///
/// `backlog_items` are sprint backlog entries in the backlog vocabulary; they
/// may repeat tasks already present in `tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPayload {
    /// Sprint metadata
    pub sprint: Sprint,
    /// Sprint tasks
    #[serde(default)]
    pub tasks: Vec<Task>,
    /// Sprint backlog items
    #[serde(default)]
    pub backlog_items: Vec<BacklogItem>,
}

impl BoardPayload {
    /// Normalise, dedupe and aggregate into a board snapshot
    ///
    /// Backlog items come after tasks, so a task's own record loses to the
    /// backlog entry with the same id.
    #[must_use]
    pub fn into_board(self) -> SprintBoard {
        let sprint_id = self.sprint.id.clone();
        let mut tasks = self.tasks;
        tasks.extend(
            self.backlog_items
                .into_iter()
                .map(|item| item.into_task(Some(sprint_id.clone()))),
        );
        SprintBoard::from_parts(self.sprint, tasks)
    }
}

/// Dashboard payload as served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardPayload {
    /// Sprint currently running
    #[serde(default)]
    pub active_sprint: Option<Sprint>,
    /// Tasks assigned to the developer
    #[serde(default)]
    pub assigned_tasks: Vec<Task>,
}

impl DashboardPayload {
    /// Dedupe and aggregate into a summary
    #[must_use]
    pub fn into_summary(self) -> DashboardSummary {
        DashboardSummary::from_parts(self.active_sprint, self.assigned_tasks)
    }
}

/// Developer API consumed by the query hooks
#[async_trait]
pub trait TaskService: Send + Sync {
    /// One page of the developer's tasks
    async fn list_tasks(
        &self,
        filters: &TaskFilters,
        page_size: u32,
    ) -> Result<ApiResponse<TaskPage>, ServiceError>;

    /// Move a task; `status` is always canonical on the wire
    async fn update_task_status(
        &self,
        id: &TaskId,
        status: CanonicalStatus,
    ) -> Result<ApiResponse<Task>, ServiceError>;

    /// Board of one sprint
    async fn sprint_board(
        &self,
        sprint: &SprintId,
        filter: BoardFilter,
    ) -> Result<ApiResponse<BoardPayload>, ServiceError>;

    /// Dashboard summary
    async fn dashboard(&self) -> Result<ApiResponse<DashboardPayload>, ServiceError>;
}
