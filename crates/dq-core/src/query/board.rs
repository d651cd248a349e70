//! Sprint board

use super::{target_status, with_dependents, DeveloperClient, SPRINT_BOARD};
use crate::error::ClientResult;
use crate::service::BoardPayload;
use dq_domain::{BoardFilter, CanonicalStatus, SprintBoard, SprintId, SprintMetrics, Task, TaskId};
use dq_query::{MutationPlan, QueryKey, QueryState, Subscription};
use std::sync::Arc;

/// Kanban view of one sprint
///
/// Every fetched board is deduplicated and carries metrics computed from its
/// tasks. Status moves recompute the metrics inside the optimistic write, so
/// progress never disagrees with the columns.
#[derive(Debug)]
pub struct SprintBoardQuery {
    client: DeveloperClient,
    sprint: SprintId,
    filter: BoardFilter,
    subscription: Subscription<SprintBoard>,
}

impl SprintBoardQuery {
    pub(crate) fn new(client: DeveloperClient, sprint: SprintId, filter: BoardFilter) -> Self {
        let subscription = subscribe(&client, &sprint, filter);
        Self {
            client,
            sprint,
            filter,
            subscription,
        }
    }

    /// Cache key of a board
    #[must_use]
    pub fn key_for(sprint: &SprintId, filter: BoardFilter) -> QueryKey {
        QueryKey::new(SPRINT_BOARD)
            .with_param("sprint", sprint)
            .with_param("filter", filter)
    }

    /// Current key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    /// Sprint shown
    #[inline]
    #[must_use]
    pub fn sprint_id(&self) -> &SprintId {
        &self.sprint
    }

    /// Active filter
    #[inline]
    #[must_use]
    pub fn filter(&self) -> BoardFilter {
        self.filter
    }

    /// Cache state
    #[must_use]
    pub fn state(&self) -> QueryState<SprintBoard> {
        self.subscription.state()
    }

    /// Board, if loaded
    #[must_use]
    pub fn board(&self) -> Option<Arc<SprintBoard>> {
        self.subscription.data()
    }

    /// Board tasks
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.board().map(|b| b.tasks.clone()).unwrap_or_default()
    }

    /// Board metrics
    #[must_use]
    pub fn metrics(&self) -> Option<SprintMetrics> {
        self.board().map(|b| b.metrics)
    }

    /// Tasks in one column
    #[must_use]
    pub fn column(&self, status: CanonicalStatus) -> Vec<Task> {
        self.board()
            .map(|b| b.column(status).cloned().collect())
            .unwrap_or_default()
    }

    /// Switch between all tasks and the developer's own
    pub fn set_filter(&mut self, filter: BoardFilter) {
        if filter == self.filter {
            return;
        }
        self.subscription = subscribe(&self.client, &self.sprint, filter);
        self.filter = filter;
    }

    /// Refetch the board
    ///
    /// # Errors
    /// The fetch error
    pub async fn refresh(&self) -> ClientResult<()> {
        Ok(self.subscription.refetch().await?)
    }

    /// Wait for any in-flight fetch and return the state
    pub async fn settled(&mut self) -> QueryState<SprintBoard> {
        self.subscription.settled().await
    }

    /// Move a task, given the status in any known vocabulary
    ///
    /// The status is normalised first; an unrecognised value is rejected
    /// before any optimistic write, so the wire value is always canonical.
    ///
    /// # Errors
    /// `ClientError::UnrecognizedStatus`, or as [`SprintBoardQuery::move_task`]
    pub async fn update_task_status(&self, id: &TaskId, status: &str) -> ClientResult<Task> {
        let status = target_status(status)?;
        self.move_task(id, status).await
    }

    /// Move a task optimistically and recompute the metrics
    ///
    /// # Errors
    /// `ClientError::Service` with the backend failure after rollback
    pub async fn move_task(&self, id: &TaskId, status: CanonicalStatus) -> ClientResult<Task> {
        let target = id.clone();
        let plan = with_dependents(
            MutationPlan::new("sprint-board status", move |board: &SprintBoard| {
                board.with_task_status(&target, status)
            })
            .with_target(self.key().clone()),
        );

        let service = Arc::clone(self.client.service());
        let id = id.clone();
        let request = async move { service.update_task_status(&id, status).await?.into_data() };
        Ok(self.client.engine().mutate(plan, request).await?)
    }
}

fn subscribe(client: &DeveloperClient, sprint: &SprintId, filter: BoardFilter) -> Subscription<SprintBoard> {
    let service = Arc::clone(client.service());
    let options = client.config().sprint_board.to_options();
    let fetch_sprint = sprint.clone();

    client.store().subscribe(
        SprintBoardQuery::key_for(sprint, filter),
        move || {
            let service = Arc::clone(&service);
            let sprint = fetch_sprint.clone();
            async move {
                service
                    .sprint_board(&sprint, filter)
                    .await?
                    .into_data()
                    .map(BoardPayload::into_board)
            }
        },
        options,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_includes_sprint_and_filter() {
        let key = SprintBoardQuery::key_for(&SprintId::new("s1"), BoardFilter::Mine);
        assert_eq!(key.to_string(), "sprint-board{filter=mine,sprint=s1}");
        assert_ne!(key, SprintBoardQuery::key_for(&SprintId::new("s1"), BoardFilter::All));
    }
}
