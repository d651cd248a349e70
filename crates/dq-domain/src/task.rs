//! Task model
//!
//! Tasks are created elsewhere (backlog assignment) and only change status
//! inside this layer. Backlog items can be transplanted into tasks; their
//! status is normalised on the way.

use crate::dedupe::Identified;
use crate::error::DomainError;
use crate::sprint::SprintId;
use crate::status::{CanonicalStatus, SourceStatus, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque task identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create task ID
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

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low
    Low,
    /// Medium
    #[default]
    Medium,
    /// High
    High,
    /// Critical
    Critical,
}

impl Priority {
    /// Wire name
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DomainError::UnknownPriority(other.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit of developer work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task identifier
    #[serde(alias = "_id")]
    pub id: TaskId,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Normalised status
    pub status: Status,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Story points, absent when unestimated
    #[serde(default)]
    pub story_points: Option<u32>,
    /// Sprint the task belongs to
    #[serde(default)]
    pub sprint: Option<SprintId>,
    /// Assigned developer
    #[serde(default)]
    pub assignee: Option<String>,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Due date
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

impl Task {
    /// Create task in `todo` with no estimate
    #[must_use]
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: Status::Known(CanonicalStatus::Todo),
            priority: Priority::default(),
            story_points: None,
            sprint: None,
            assignee: None,
            created_at: None,
            due_date: None,
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: impl Into<Status>) -> Self {
        self.status = status.into();
        self
    }

    /// With story points
    #[inline]
    #[must_use]
    pub fn with_story_points(mut self, points: u32) -> Self {
        self.story_points = Some(points);
        self
    }

    /// With priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// With sprint
    #[inline]
    #[must_use]
    pub fn with_sprint(mut self, sprint: impl Into<SprintId>) -> Self {
        self.sprint = Some(sprint.into());
        self
    }

    /// With assignee
    #[inline]
    #[must_use]
    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// With due date
    #[inline]
    #[must_use]
    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    /// Story points, absent counted as zero
    #[inline]
    #[must_use]
    pub fn points(&self) -> u32 {
        self.story_points.unwrap_or(0)
    }

    /// Case-insensitive match on title or description
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Identified for Task {
    type Id = TaskId;

    fn id(&self) -> &TaskId {
        &self.id
    }
}

/// Backlog item as served by the backlog resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacklogItem {
    /// Item identifier
    #[serde(alias = "_id")]
    pub id: String,
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Raw backlog status
    pub status: String,
    /// Priority
    #[serde(default)]
    pub priority: Priority,
    /// Story points
    #[serde(default)]
    pub story_points: Option<u32>,
}

impl BacklogItem {
    /// Transplant into a task assigned to `sprint`
    #[must_use]
    pub fn into_task(self, sprint: Option<SprintId>) -> Task {
        Task {
            status: SourceStatus::BacklogItem(&self.status).normalize(),
            id: TaskId(self.id),
            title: self.title,
            description: self.description,
            priority: self.priority,
            story_points: self.story_points,
            sprint,
            assignee: None,
            created_at: None,
            due_date: None,
        }
    }
}

/// Copy of `tasks` with the status of `id` replaced
///
/// Returns `None` when no task has that id.
#[must_use]
pub fn patch_status(tasks: &[Task], id: &TaskId, status: CanonicalStatus) -> Option<Vec<Task>> {
    if !tasks.iter().any(|t| &t.id == id) {
        return None;
    }
    Some(
        tasks
            .iter()
            .map(|t| {
                if &t.id == id {
                    t.clone().with_status(status)
                } else {
                    t.clone()
                }
            })
            .collect(),
    )
}
