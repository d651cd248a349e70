//! DQ Domain - tasks, sprints and their derived read models
//!
//! Pure building blocks shared by the query layer:
//! - Status normalisation across the task and backlog vocabularies
//! - Entity deduplication by identity
//! - Sprint metrics aggregation
//! - Read models: task pages, sprint boards, dashboard summaries
//!
//! # Example
//!
//! ```rust
//! use dq_domain::{compute_metrics, normalize, CanonicalStatus, Task};
//!
//! let status = normalize("en_progreso");
//! assert!(status.is(CanonicalStatus::InProgress));
//!
//! let tasks = vec![
//!     Task::new("a", "A").with_story_points(3).with_status(CanonicalStatus::Done),
//!     Task::new("b", "B").with_story_points(1),
//! ];
//! assert_eq!(compute_metrics(&tasks).sprint_progress, 75);
//! ```

#![warn(unreachable_pub)]

pub mod dashboard;
pub mod dedupe;
pub mod error;
pub mod metrics;
pub mod page;
pub mod sprint;
pub mod status;
pub mod task;

pub use dashboard::DashboardSummary;
pub use dedupe::{dedupe, Identified};
pub use error::{DomainError, DomainResult};
pub use metrics::{compute_metrics, SprintMetrics, StatusCounts};
pub use page::{Pagination, TaskFilters, TaskPage};
pub use sprint::{BoardFilter, Sprint, SprintBoard, SprintId};
pub use status::{normalize, BacklogStatus, CanonicalStatus, SourceStatus, Status};
pub use task::{patch_status, BacklogItem, Priority, Task, TaskId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
