//! Developer dashboard summary

use crate::dedupe::dedupe;
use crate::metrics::{compute_metrics, SprintMetrics};
use crate::sprint::Sprint;
use crate::status::CanonicalStatus;
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Number of upcoming tasks kept on the dashboard
pub const UPCOMING_LIMIT: usize = 5;

/// Summary of the developer's assigned work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Sprint currently running, if any
    pub active_sprint: Option<Sprint>,
    /// Assigned tasks
    pub assigned: Vec<Task>,
    /// Metrics over `assigned`
    pub metrics: SprintMetrics,
}

impl DashboardSummary {
    /// Build summary: dedupe assigned tasks, then aggregate
    #[must_use]
    pub fn from_parts(active_sprint: Option<Sprint>, assigned: Vec<Task>) -> Self {
        let assigned = dedupe(assigned);
        let metrics = compute_metrics(&assigned);
        Self {
            active_sprint,
            assigned,
            metrics,
        }
    }

    /// Open tasks with a due date, soonest first
    #[must_use]
    pub fn upcoming(&self) -> Vec<&Task> {
        let mut open: Vec<&Task> = self
            .assigned
            .iter()
            .filter(|t| t.due_date.is_some() && !t.status.is(CanonicalStatus::Done))
            .collect();
        open.sort_by_key(|t| t.due_date);
        open.truncate(UPCOMING_LIMIT);
        open
    }
}
