//! Developer dashboard

use super::{DeveloperClient, DASHBOARD};
use crate::error::ClientResult;
use crate::service::DashboardPayload;
use dq_domain::{DashboardSummary, Sprint, SprintMetrics, Task};
use dq_query::{QueryKey, QueryState, Subscription};
use std::sync::Arc;

/// Summary of the developer's assigned work
///
/// Read-only; refreshed whenever a task status change is confirmed anywhere.
#[derive(Debug)]
pub struct DashboardQuery {
    subscription: Subscription<DashboardSummary>,
}

impl DashboardQuery {
    pub(crate) fn new(client: DeveloperClient) -> Self {
        let service = Arc::clone(client.service());
        let options = client.config().dashboard.to_options();
        let subscription = client.store().subscribe(
            Self::key(),
            move || {
                let service = Arc::clone(&service);
                async move {
                    service
                        .dashboard()
                        .await?
                        .into_data()
                        .map(DashboardPayload::into_summary)
                }
            },
            options,
        );
        Self { subscription }
    }

    /// Cache key of the dashboard
    #[must_use]
    pub fn key() -> QueryKey {
        QueryKey::new(DASHBOARD)
    }

    /// Cache state
    #[must_use]
    pub fn state(&self) -> QueryState<DashboardSummary> {
        self.subscription.state()
    }

    /// Summary, if loaded
    #[must_use]
    pub fn summary(&self) -> Option<Arc<DashboardSummary>> {
        self.subscription.data()
    }

    /// Metrics over the assigned tasks
    #[must_use]
    pub fn metrics(&self) -> Option<SprintMetrics> {
        self.summary().map(|s| s.metrics)
    }

    /// Active sprint
    #[must_use]
    pub fn active_sprint(&self) -> Option<Sprint> {
        self.summary().and_then(|s| s.active_sprint.clone())
    }

    /// Open tasks due soonest
    #[must_use]
    pub fn upcoming(&self) -> Vec<Task> {
        self.summary()
            .map(|s| s.upcoming().into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Refetch
    ///
    /// # Errors
    /// The fetch error
    pub async fn refresh(&self) -> ClientResult<()> {
        Ok(self.subscription.refetch().await?)
    }

    /// Wait for any in-flight fetch and return the state
    pub async fn settled(&mut self) -> QueryState<DashboardSummary> {
        self.subscription.settled().await
    }
}
