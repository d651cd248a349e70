//! Sprint metadata and the sprint board read model

use crate::dedupe::dedupe;
use crate::error::DomainError;
use crate::metrics::{compute_metrics, SprintMetrics};
use crate::status::CanonicalStatus;
use crate::task::{patch_status, Task, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque sprint identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SprintId(pub String);

impl SprintId {
    /// Create sprint ID
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SprintId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Sprint metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    /// Sprint identifier
    #[serde(alias = "_id")]
    pub id: SprintId,
    /// Name
    pub name: String,
    /// Sprint goal
    #[serde(default)]
    pub goal: String,
    /// Start date
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// End date
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl Sprint {
    /// Create sprint without dates
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SprintId::new(id),
            name: name.into(),
            goal: String::new(),
            start_date: None,
            end_date: None,
        }
    }

    /// With goal
    #[inline]
    #[must_use]
    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    /// With start and end date
    #[inline]
    #[must_use]
    pub fn with_dates(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

/// Which tasks of a sprint the board shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardFilter {
    /// Every task in the sprint
    #[default]
    All,
    /// Only tasks assigned to the current developer
    Mine,
}

impl BoardFilter {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Mine => "mine",
        }
    }
}

impl FromStr for BoardFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "mine" => Ok(Self::Mine),
            other => Err(DomainError::UnknownBoardFilter(other.to_string())),
        }
    }
}

impl fmt::Display for BoardFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sprint board snapshot
///
/// `tasks` holds one entry per id and `metrics` is always derived from
/// `tasks`. Construct through [`SprintBoard::from_parts`] to keep both true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintBoard {
    /// Sprint metadata
    pub sprint: Sprint,
    /// Deduplicated tasks
    pub tasks: Vec<Task>,
    /// Aggregated metrics
    pub metrics: SprintMetrics,
}

impl SprintBoard {
    /// Build board from a raw task list: dedupe, then aggregate
    #[must_use]
    pub fn from_parts(sprint: Sprint, tasks: Vec<Task>) -> Self {
        let tasks = dedupe(tasks);
        let metrics = compute_metrics(&tasks);
        Self {
            sprint,
            tasks,
            metrics,
        }
    }

    /// Copy with one task moved to `status` and metrics recomputed
    ///
    /// Unknown ids leave the board unchanged.
    #[must_use]
    pub fn with_task_status(&self, id: &TaskId, status: CanonicalStatus) -> Self {
        match patch_status(&self.tasks, id, status) {
            Some(tasks) => {
                let metrics = compute_metrics(&tasks);
                Self {
                    sprint: self.sprint.clone(),
                    tasks,
                    metrics,
                }
            }
            None => self.clone(),
        }
    }

    /// Tasks in one column
    pub fn column(&self, status: CanonicalStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status.is(status))
    }

    /// Find task by id
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}
