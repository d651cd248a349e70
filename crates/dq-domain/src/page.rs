//! Task list read model: filters, pagination and pages

use crate::dedupe::dedupe;
use crate::status::CanonicalStatus;
use crate::task::{patch_status, Priority, Task, TaskId};
use serde::{Deserialize, Serialize};

/// Filters for the developer task list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFilters {
    /// Only tasks in this status
    pub status: Option<CanonicalStatus>,
    /// Only tasks with this priority
    pub priority: Option<Priority>,
    /// Free-text search over title and description
    pub search: Option<String>,
    /// 1-based page number
    pub page: u32,
}

impl Default for TaskFilters {
    fn default() -> Self {
        Self {
            status: None,
            priority: None,
            search: None,
            page: 1,
        }
    }
}

impl TaskFilters {
    /// Filters matching everything, first page
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: CanonicalStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// With search text; blank text clears the search
    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = if search.trim().is_empty() {
            None
        } else {
            Some(search)
        };
        self
    }

    /// With page
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Whether `task` passes the status, priority and search filters
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status.is(s))
            && self.priority.map_or(true, |p| task.priority == p)
            && self.search.as_deref().map_or(true, |q| task.matches_search(q))
    }
}

/// Pagination block returned with a page of tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page, 1-based
    pub page: u32,
    /// Page size
    pub page_size: u32,
    /// Total matching tasks
    pub total: u64,
    /// Total pages
    pub total_pages: u32,
}

impl Pagination {
    /// Build pagination for `total` items
    #[must_use]
    pub fn new(page: u32, page_size: u32, total: u64) -> Self {
        let size = u64::from(page_size.max(1));
        let total_pages = u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX);
        Self {
            page,
            page_size,
            total,
            total_pages,
        }
    }

    /// Whether a next page exists
    #[inline]
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// One page of the task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    /// Tasks on this page
    pub tasks: Vec<Task>,
    /// Pagination block
    pub pagination: Pagination,
}

impl TaskPage {
    /// Page with duplicate tasks removed
    #[must_use]
    pub fn deduped(self) -> Self {
        Self {
            tasks: dedupe(self.tasks),
            pagination: self.pagination,
        }
    }

    /// Copy with one task moved to `status`
    #[must_use]
    pub fn with_task_status(&self, id: &TaskId, status: CanonicalStatus) -> Self {
        match patch_status(&self.tasks, id, status) {
            Some(tasks) => Self {
                tasks,
                pagination: self.pagination,
            },
            None => self.clone(),
        }
    }

    /// Find task by id
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}
