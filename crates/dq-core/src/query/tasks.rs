//! Developer task list

use super::{target_status, with_dependents, DeveloperClient, TASKS};
use crate::error::ClientResult;
use dq_domain::{CanonicalStatus, Pagination, Task, TaskFilters, TaskId, TaskPage};
use dq_query::{MutationPlan, QueryKey, QueryState, Subscription};
use std::sync::Arc;

/// Filterable, paginated view of the developer's tasks
///
/// Changing filters or page moves the view to another cache entry; the
/// previous entry stays cached until its cache time runs out.
#[derive(Debug)]
pub struct TaskListQuery {
    client: DeveloperClient,
    filters: TaskFilters,
    subscription: Subscription<TaskPage>,
}

impl TaskListQuery {
    pub(crate) fn new(client: DeveloperClient, filters: TaskFilters) -> Self {
        let subscription = subscribe(&client, &filters);
        Self {
            client,
            filters,
            subscription,
        }
    }

    /// Cache key for a filter set
    #[must_use]
    pub fn key_for(filters: &TaskFilters) -> QueryKey {
        QueryKey::new(TASKS)
            .with_optional_param("status", filters.status)
            .with_optional_param("priority", filters.priority)
            .with_optional_param("search", filters.search.as_deref())
            .with_param("page", filters.page)
    }

    /// Current key
    #[inline]
    #[must_use]
    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    /// Active filters
    #[inline]
    #[must_use]
    pub fn filters(&self) -> &TaskFilters {
        &self.filters
    }

    /// Cache state of the current page
    #[must_use]
    pub fn state(&self) -> QueryState<TaskPage> {
        self.subscription.state()
    }

    /// Current page, if loaded
    #[must_use]
    pub fn page(&self) -> Option<Arc<TaskPage>> {
        self.subscription.data()
    }

    /// Tasks on the current page
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.page().map(|page| page.tasks.clone()).unwrap_or_default()
    }

    /// Pagination of the current page
    #[must_use]
    pub fn pagination(&self) -> Option<Pagination> {
        self.page().map(|page| page.pagination)
    }

    /// Replace the filters; always returns to the first page
    pub fn apply_filters(&mut self, filters: TaskFilters) {
        self.switch(filters.with_page(1));
    }

    /// Go to `page` under the current filters
    pub fn change_page(&mut self, page: u32) {
        let filters = self.filters.clone().with_page(page);
        self.switch(filters);
    }

    /// Refetch the current page
    ///
    /// # Errors
    /// The fetch error
    pub async fn refresh(&self) -> ClientResult<()> {
        Ok(self.subscription.refetch().await?)
    }

    /// Wait for any in-flight fetch and return the state
    pub async fn settled(&mut self) -> QueryState<TaskPage> {
        self.subscription.settled().await
    }

    /// Move a task, given the status in any known vocabulary
    ///
    /// # Errors
    /// `ClientError::UnrecognizedStatus` before anything is written, otherwise
    /// as [`TaskListQuery::move_task`]
    pub async fn update_task_status(&self, id: &TaskId, status: &str) -> ClientResult<Task> {
        let status = target_status(status)?;
        self.move_task(id, status).await
    }

    /// Move a task optimistically; the page shows the new status at once and
    /// reverts if the backend refuses
    ///
    /// # Errors
    /// `ClientError::Service` with the backend failure after rollback
    pub async fn move_task(&self, id: &TaskId, status: CanonicalStatus) -> ClientResult<Task> {
        let target = id.clone();
        let plan = with_dependents(
            MutationPlan::new("task-list status", move |page: &TaskPage| {
                page.with_task_status(&target, status)
            })
            .with_target(self.key().clone()),
        );

        let service = Arc::clone(self.client.service());
        let id = id.clone();
        let request = async move { service.update_task_status(&id, status).await?.into_data() };
        Ok(self.client.engine().mutate(plan, request).await?)
    }

    fn switch(&mut self, filters: TaskFilters) {
        if filters == self.filters {
            return;
        }
        tracing::debug!(?filters, "task list filters changed");
        self.subscription = subscribe(&self.client, &filters);
        self.filters = filters;
    }
}

fn subscribe(client: &DeveloperClient, filters: &TaskFilters) -> Subscription<TaskPage> {
    let service = Arc::clone(client.service());
    let page_size = client.config().page_size;
    let options = client.config().tasks.to_options();
    let fetch_filters = filters.clone();

    client.store().subscribe(
        TaskListQuery::key_for(filters),
        move || {
            let service = Arc::clone(&service);
            let filters = fetch_filters.clone();
            async move {
                service
                    .list_tasks(&filters, page_size)
                    .await?
                    .into_data()
                    .map(TaskPage::deduped)
            }
        },
        options,
    )
}
