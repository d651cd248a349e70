//! Read-model behaviour through the public API.
//!
//! Covers the pure pipeline every fetched payload passes through:
//! normalise statuses, dedupe by id, aggregate metrics.

use dq_domain::{
    dedupe, normalize, BacklogItem, CanonicalStatus, Priority, Sprint, SprintBoard, Status, Task,
    TaskId,
};

fn backend_tasks() -> Vec<Task> {
    let json = r#"[
        {"_id": "t1", "title": "Login form", "status": "done", "storyPoints": 3},
        {"_id": "t2", "title": "Session refresh", "status": "todo", "storyPoints": 5},
        {"_id": "t3", "title": "Logout", "status": "completado", "storyPoints": 2},
        {"_id": "t2", "title": "Session refresh", "status": "en_progreso", "storyPoints": 5}
    ]"#;
    serde_json::from_str(json).expect("fixture parses")
}

#[test]
fn pipeline_normalises_dedupes_and_aggregates() {
    let board = SprintBoard::from_parts(Sprint::new("s1", "Sprint 1"), backend_tasks());

    assert_eq!(board.tasks.len(), 3);
    let t2 = board.task(&TaskId::new("t2")).unwrap();
    assert!(t2.status.is(CanonicalStatus::InProgress));

    assert_eq!(board.metrics.total_points, 10);
    assert_eq!(board.metrics.completed_points, 5);
    assert_eq!(board.metrics.sprint_progress, 50);
    assert_eq!(board.metrics.counts.in_progress, 1);
}

#[test]
fn dedupe_twice_is_dedupe_once() {
    let once = dedupe(backend_tasks());
    let twice = dedupe(once.clone());
    assert_eq!(once, twice);
}

#[test]
fn normalisation_examples() {
    assert_eq!(normalize("en_progreso"), Status::Known(CanonicalStatus::InProgress));
    assert_eq!(normalize("done"), Status::Known(CanonicalStatus::Done));
    assert_eq!(normalize("unknown_value").as_str(), "unknown_value");
}

#[test]
fn backlog_items_join_the_board_with_canonical_status() {
    let item: BacklogItem = serde_json::from_str(
        r#"{"_id": "b9", "title": "Audit log", "status": "en_pruebas", "priority": "critical", "storyPoints": 8}"#,
    )
    .unwrap();
    let sprint = Sprint::new("s1", "Sprint 1");
    let task = item.into_task(Some(sprint.id.clone()));
    assert_eq!(task.priority, Priority::Critical);

    let mut tasks = backend_tasks();
    tasks.push(task);
    let board = SprintBoard::from_parts(sprint, tasks);
    assert_eq!(board.metrics.counts.testing, 1);
    assert_eq!(board.metrics.total_points, 18);
}
