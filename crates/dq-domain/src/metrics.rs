//! Sprint metrics aggregation
//!
//! [`compute_metrics`] is the single source of sprint progress. Nothing else
//! stores or adjusts a progress counter; views recompute from their tasks.

use crate::status::CanonicalStatus;
use crate::task::Task;
use serde::{Deserialize, Serialize};

/// Task count per canonical status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    /// `todo`
    pub todo: usize,
    /// `in_progress`
    pub in_progress: usize,
    /// `code_review`
    pub code_review: usize,
    /// `testing`
    pub testing: usize,
    /// `done`
    pub done: usize,
}

impl StatusCounts {
    /// Count for one status
    #[inline]
    #[must_use]
    pub fn get(&self, status: CanonicalStatus) -> usize {
        match status {
            CanonicalStatus::Todo => self.todo,
            CanonicalStatus::InProgress => self.in_progress,
            CanonicalStatus::CodeReview => self.code_review,
            CanonicalStatus::Testing => self.testing,
            CanonicalStatus::Done => self.done,
        }
    }

    fn slot(&mut self, status: CanonicalStatus) -> &mut usize {
        match status {
            CanonicalStatus::Todo => &mut self.todo,
            CanonicalStatus::InProgress => &mut self.in_progress,
            CanonicalStatus::CodeReview => &mut self.code_review,
            CanonicalStatus::Testing => &mut self.testing,
            CanonicalStatus::Done => &mut self.done,
        }
    }
}

/// Derived sprint statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintMetrics {
    /// Number of tasks
    pub total_tasks: usize,
    /// Sum of story points
    pub total_points: u64,
    /// Sum of story points over `done` tasks
    pub completed_points: u64,
    /// Completion percentage, 0..=100
    pub sprint_progress: u8,
    /// Per-status task counts
    pub counts: StatusCounts,
    /// Tasks whose status fell outside every known vocabulary
    pub unrecognized: usize,
}

/// Compute metrics for a task collection
#[must_use]
pub fn compute_metrics(tasks: &[Task]) -> SprintMetrics {
    let mut metrics = SprintMetrics {
        total_tasks: tasks.len(),
        ..SprintMetrics::default()
    };

    for task in tasks {
        let points = u64::from(task.points());
        metrics.total_points += points;
        match task.status.canonical() {
            Some(status) => {
                *metrics.counts.slot(status) += 1;
                if status == CanonicalStatus::Done {
                    metrics.completed_points += points;
                }
            }
            None => metrics.unrecognized += 1,
        }
    }

    metrics.sprint_progress = progress(metrics.completed_points, metrics.total_points);
    metrics
}

/// `round(100 * completed / total)`, half rounding up, 0 for an empty total
fn progress(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let rounded = (200 * completed + total) / (2 * total);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Status;
    use proptest::prelude::*;

    fn task(id: &str, points: Option<u32>, status: CanonicalStatus) -> Task {
        let mut task = Task::new(id, id).with_status(status);
        task.story_points = points;
        task
    }

    #[test]
    fn example_half_done() {
        let tasks = vec![
            task("a", Some(3), CanonicalStatus::Done),
            task("b", Some(5), CanonicalStatus::Todo),
            task("c", Some(2), CanonicalStatus::Done),
        ];
        let metrics = compute_metrics(&tasks);

        assert_eq!(metrics.total_points, 10);
        assert_eq!(metrics.completed_points, 5);
        assert_eq!(metrics.sprint_progress, 50);
        assert_eq!(metrics.counts.done, 2);
        assert_eq!(metrics.counts.todo, 1);
        assert_eq!(metrics.total_tasks, 3);
    }

    #[test]
    fn zero_points_means_zero_progress() {
        let tasks = vec![task("a", None, CanonicalStatus::Done)];
        let metrics = compute_metrics(&tasks);
        assert_eq!(metrics.total_points, 0);
        assert_eq!(metrics.sprint_progress, 0);

        assert_eq!(compute_metrics(&[]).sprint_progress, 0);
    }

    #[test]
    fn progress_rounds_instead_of_truncating() {
        // 2 / 3 = 66.67 -> 67
        let tasks = vec![
            task("a", Some(2), CanonicalStatus::Done),
            task("b", Some(1), CanonicalStatus::Testing),
        ];
        assert_eq!(compute_metrics(&tasks).sprint_progress, 67);

        // 1 / 8 = 12.5 -> 13
        assert_eq!(progress(1, 8), 13);
        // 1 / 3 = 33.3 -> 33
        assert_eq!(progress(1, 3), 33);
    }

    #[test]
    fn unrecognized_status_is_counted_separately() {
        let mut odd = Task::new("x", "x").with_story_points(4);
        odd.status = Status::Unrecognized("blocked".to_string());
        let metrics = compute_metrics(&[odd]);

        assert_eq!(metrics.unrecognized, 1);
        assert_eq!(metrics.total_points, 4);
        assert_eq!(metrics.counts, StatusCounts::default());
    }

    fn status_strategy() -> impl Strategy<Value = CanonicalStatus> {
        prop_oneof![
            Just(CanonicalStatus::Todo),
            Just(CanonicalStatus::InProgress),
            Just(CanonicalStatus::CodeReview),
            Just(CanonicalStatus::Testing),
            Just(CanonicalStatus::Done),
        ]
    }

    proptest! {
        #[test]
        fn prop_metrics_pure_and_consistent(
            raw in proptest::collection::vec((proptest::option::of(0u32..21), status_strategy()), 0..30)
        ) {
            let tasks: Vec<Task> = raw
                .iter()
                .enumerate()
                .map(|(i, (points, status))| task(&i.to_string(), *points, *status))
                .collect();

            let first = compute_metrics(&tasks);
            let second = compute_metrics(&tasks);
            prop_assert_eq!(first, second);

            let counted: usize = CanonicalStatus::ALL.iter().map(|s| first.counts.get(*s)).sum();
            prop_assert_eq!(counted, tasks.len());
            prop_assert!(first.completed_points <= first.total_points);
            prop_assert!(first.sprint_progress <= 100);
        }
    }
}
