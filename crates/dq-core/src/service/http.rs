//! HTTP adapter for the developer API

use super::{ApiResponse, BoardPayload, DashboardPayload, TaskService};
use crate::config::ClientConfig;
use crate::error::ServiceError;
use async_trait::async_trait;
use dq_domain::{BoardFilter, CanonicalStatus, SprintId, Task, TaskFilters, TaskId, TaskPage};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Body of the status update request
#[derive(Serialize)]
struct StatusBody {
    status: CanonicalStatus,
}

/// [`TaskService`] over the REST developer endpoints
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTaskService {
    /// Service rooted at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
        }
    }

    /// Service built from client configuration
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        let service = Self::new(config.base_url.clone());
        match &config.auth_token {
            Some(token) => service.with_auth_token(token.clone()),
            None => service,
        }
    }

    /// With bearer token
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// With a preconfigured client (proxies, TLS, pools)
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Absolute URL of an API path; each segment is percent-encoded
    ///
    /// # Errors
    /// `ServiceError::Transport` when the base URL cannot carry a path
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let invalid = |reason: String| {
            ServiceError::Transport(format!("invalid base url {}: {reason}", self.base_url))
        };
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<ApiResponse<T>, ServiceError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.message)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
            tracing::debug!(status = status.as_u16(), %message, "backend returned error status");
            return Err(ServiceError::Http {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

/// Query string of the task list endpoint
#[must_use]
pub fn task_query(filters: &TaskFilters, page_size: u32) -> Vec<(&'static str, String)> {
    let mut query = Vec::with_capacity(5);
    if let Some(status) = filters.status {
        query.push(("status", status.as_str().to_string()));
    }
    if let Some(priority) = filters.priority {
        query.push(("priority", priority.as_str().to_string()));
    }
    if let Some(search) = &filters.search {
        query.push(("search", search.clone()));
    }
    query.push(("page", filters.page.to_string()));
    query.push(("limit", page_size.to_string()));
    query
}

#[async_trait]
impl TaskService for HttpTaskService {
    async fn list_tasks(
        &self,
        filters: &TaskFilters,
        page_size: u32,
    ) -> Result<ApiResponse<TaskPage>, ServiceError> {
        let request = self
            .client
            .get(self.endpoint(&["developer", "tasks"])?)
            .query(&task_query(filters, page_size));
        self.send(request).await
    }

    async fn update_task_status(
        &self,
        id: &TaskId,
        status: CanonicalStatus,
    ) -> Result<ApiResponse<Task>, ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&["developer", "tasks", id.as_str(), "status"])?)
            .json(&StatusBody { status });
        self.send(request).await
    }

    async fn sprint_board(
        &self,
        sprint: &SprintId,
        filter: BoardFilter,
    ) -> Result<ApiResponse<BoardPayload>, ServiceError> {
        let request = self
            .client
            .get(self.endpoint(&["developer", "sprints", sprint.as_str(), "board"])?)
            .query(&[("filter", filter.as_str())]);
        self.send(request).await
    }

    async fn dashboard(&self) -> Result<ApiResponse<DashboardPayload>, ServiceError> {
        let request = self.client.get(self.endpoint(&["developer", "dashboard"])?);
        self.send(request).await
    }
}
