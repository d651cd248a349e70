//! Testing utilities for DQ workspace
//!
//! Shared fixtures: a seeded in-memory backend and clients wired to it.

#![allow(missing_docs)]

use chrono::{Duration, TimeZone, Utc};
use dq_core::{ClientConfig, DeveloperClient, InMemoryTaskService, TaskService};
use dq_domain::{BacklogItem, CanonicalStatus, Priority, Sprint, Task};
use std::sync::Arc;

pub const DEVELOPER: &str = "ana";
pub const SPRINT: &str = "s1";

pub fn sprint() -> Sprint {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    Sprint::new(SPRINT, "Sprint 1")
        .with_goal("Ship login")
        .with_dates(start, start + Duration::days(14))
}

pub fn task(id: &str, status: CanonicalStatus, points: u32) -> Task {
    Task::new(id, format!("Task {id}"))
        .with_status(status)
        .with_story_points(points)
        .with_sprint(SPRINT)
        .with_assignee(DEVELOPER)
}

/// Three done (5 + 2 points) and one todo (5 points)
pub fn sample_tasks() -> Vec<Task> {
    let due = Utc.with_ymd_and_hms(2024, 3, 10, 17, 0, 0).unwrap();
    vec![
        task("t1", CanonicalStatus::Todo, 5).with_priority(Priority::High).with_due_date(due),
        task("t2", CanonicalStatus::Done, 3),
        task("t3", CanonicalStatus::Done, 2),
        task("t4", CanonicalStatus::InProgress, 0).with_assignee("luis"),
    ]
}

/// Backlog copy of `t2`, served by the board next to the task itself
pub fn duplicate_backlog_item() -> BacklogItem {
    BacklogItem {
        id: "t2".into(),
        title: "Task t2".into(),
        description: String::new(),
        status: "completado".into(),
        priority: Priority::Medium,
        story_points: Some(3),
    }
}

pub fn seeded_service() -> InMemoryTaskService {
    InMemoryTaskService::new(DEVELOPER)
        .with_sprint(sprint())
        .with_tasks(sample_tasks())
        .with_backlog_item(SPRINT, duplicate_backlog_item())
}

pub fn client_with(service: Arc<InMemoryTaskService>) -> DeveloperClient {
    let service: Arc<dyn TaskService> = service;
    DeveloperClient::new(ClientConfig::new(), service)
}

pub fn setup_test_client() -> (DeveloperClient, Arc<InMemoryTaskService>) {
    let service = Arc::new(seeded_service());
    (client_with(Arc::clone(&service)), service)
}
