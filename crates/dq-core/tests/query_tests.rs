use dq_core::{ClientError, Endpoint, ServiceError};
use dq_domain::{BoardFilter, CanonicalStatus, Status, TaskFilters, TaskId};
use dq_query::MutationState;
use dq_test_utils::{client_with, seeded_service, setup_test_client, SPRINT};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn status_of(tasks: &[dq_domain::Task], id: &str) -> Option<Status> {
    tasks
        .iter()
        .find(|t| t.id == TaskId::new(id))
        .map(|t| t.status.clone())
}

#[tokio::test(start_paused = true)]
async fn test_identical_task_lists_share_one_request() {
    let service = Arc::new(seeded_service().with_latency(Duration::from_millis(50)));
    let client = client_with(Arc::clone(&service));

    let mut first = client.tasks(TaskFilters::new());
    let mut second = client.tasks(TaskFilters::new());
    assert!(first.state().is_loading());

    first.settled().await;
    second.settled().await;

    assert_eq!(service.calls(Endpoint::ListTasks), 1);
    assert_eq!(first.tasks().len(), 3);
    assert_eq!(second.pagination().unwrap().total, 3);
}

#[tokio::test]
async fn test_board_is_deduplicated_with_metrics() {
    let (client, _service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;

    let tasks = board.tasks();
    assert_eq!(tasks.len(), 4);
    assert_eq!(tasks.iter().filter(|t| t.id == TaskId::new("t2")).count(), 1);

    let metrics = board.metrics().unwrap();
    assert_eq!(metrics.total_points, 10);
    assert_eq!(metrics.completed_points, 5);
    assert_eq!(metrics.sprint_progress, 50);
    assert_eq!(board.column(CanonicalStatus::Done).len(), 2);
}

#[tokio::test]
async fn test_rejected_move_rolls_back_board() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;
    service.fail_next_updates(1);

    let err = board
        .update_task_status(&TaskId::new("t1"), "completado")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Service(ServiceError::Rejected(_))));
    assert!(err.is_rollback());
    assert_eq!(
        status_of(&board.tasks(), "t1"),
        Some(Status::Known(CanonicalStatus::Todo))
    );
    assert_eq!(board.metrics().unwrap().sprint_progress, 50);
    // no invalidation after a rollback
    assert_eq!(service.calls(Endpoint::SprintBoard), 1);
    assert!(client.engine().pending().is_empty());
}

#[tokio::test]
async fn test_unrecognized_target_status_is_never_sent() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;
    let before = board.board().unwrap();

    let err = board
        .update_task_status(&TaskId::new("t1"), "blocked")
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::UnrecognizedStatus(ref raw) if raw == "blocked"));
    assert_eq!(service.calls(Endpoint::UpdateStatus), 0);
    assert_eq!(board.board().unwrap(), before);
}

#[tokio::test]
async fn test_confirmed_move_refreshes_every_read_model() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    let mut dashboard = client.dashboard();
    let mut list = client.tasks(TaskFilters::new());
    board.settled().await;
    dashboard.settled().await;
    list.settled().await;
    assert_eq!(dashboard.upcoming().len(), 1);

    let moved = board
        .move_task(&TaskId::new("t1"), CanonicalStatus::Done)
        .await
        .unwrap();
    assert_eq!(moved.status, Status::Known(CanonicalStatus::Done));

    board.settled().await;
    dashboard.settled().await;
    list.settled().await;

    assert_eq!(service.calls(Endpoint::SprintBoard), 2);
    assert_eq!(service.calls(Endpoint::Dashboard), 2);
    assert_eq!(service.calls(Endpoint::ListTasks), 2);
    assert_eq!(board.metrics().unwrap().sprint_progress, 100);
    assert_eq!(dashboard.metrics().unwrap().sprint_progress, 100);
    assert!(dashboard.upcoming().is_empty());
    assert_eq!(
        status_of(&list.tasks(), "t1"),
        Some(Status::Known(CanonicalStatus::Done))
    );
}

#[tokio::test]
async fn test_rejected_task_list_move_rolls_back_to_todo() {
    let (client, service) = setup_test_client();
    let mut list = client.tasks(TaskFilters::new());
    list.settled().await;
    service.fail_next_updates(1);

    let err = list
        .update_task_status(&TaskId::new("t1"), "completado")
        .await
        .unwrap_err();

    assert!(err.is_rollback());
    assert_eq!(
        status_of(&list.tasks(), "t1"),
        Some(Status::Known(CanonicalStatus::Todo))
    );
    assert_eq!(
        service.task(&TaskId::new("t1")).unwrap().status,
        Status::Known(CanonicalStatus::Todo)
    );
    assert_eq!(service.calls(Endpoint::ListTasks), 1);
    assert_eq!(client.engine().key_state(list.key()), MutationState::Idle);
}

#[tokio::test]
async fn test_task_list_move_refreshes_board_and_dashboard() {
    let (client, service) = setup_test_client();
    let mut list = client.tasks(TaskFilters::new());
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    let mut dashboard = client.dashboard();
    list.settled().await;
    board.settled().await;
    dashboard.settled().await;

    let moved = list
        .move_task(&TaskId::new("t1"), CanonicalStatus::CodeReview)
        .await
        .unwrap();
    assert_eq!(moved.status, Status::Known(CanonicalStatus::CodeReview));

    list.settled().await;
    board.settled().await;
    dashboard.settled().await;

    assert_eq!(service.calls(Endpoint::ListTasks), 2);
    assert_eq!(service.calls(Endpoint::SprintBoard), 2);
    assert_eq!(service.calls(Endpoint::Dashboard), 2);
    assert_eq!(board.column(CanonicalStatus::CodeReview).len(), 1);
    assert_eq!(
        status_of(&dashboard.summary().unwrap().assigned, "t1"),
        Some(Status::Known(CanonicalStatus::CodeReview))
    );
}

#[tokio::test]
async fn test_rollback_after_confirmed_move_still_refetches_board() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;

    board
        .move_task(&TaskId::new("t1"), CanonicalStatus::Done)
        .await
        .unwrap();
    // changed by someone else while the confirming refetch is still pending
    service.set_task_status(&TaskId::new("t3"), CanonicalStatus::Todo);
    service.fail_next_updates(1);
    let err = board
        .move_task(&TaskId::new("t2"), CanonicalStatus::Todo)
        .await
        .unwrap_err();
    assert!(err.is_rollback());

    let state = board.settled().await;
    assert!(!state.is_fetching);
    assert!(!client.store().get_entry(board.key()).unwrap().invalidated);
    assert_eq!(
        status_of(&board.tasks(), "t3"),
        Some(Status::Known(CanonicalStatus::Todo))
    );
    assert_eq!(
        status_of(&board.tasks(), "t1"),
        Some(Status::Known(CanonicalStatus::Done))
    );
    assert_eq!(
        status_of(&board.tasks(), "t2"),
        Some(Status::Known(CanonicalStatus::Done))
    );
    assert_eq!(service.calls(Endpoint::SprintBoard), 3);
}

#[tokio::test(start_paused = true)]
async fn test_optimistic_metrics_visible_while_request_pending() {
    let service = Arc::new(seeded_service().with_latency(Duration::from_millis(50)));
    let client = client_with(Arc::clone(&service));
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;

    let id = TaskId::new("t1");
    let (result, seen) = tokio::join!(board.move_task(&id, CanonicalStatus::Done), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        (
            board.metrics().unwrap().sprint_progress,
            client.engine().key_state(board.key()),
        )
    });

    result.unwrap();
    assert_eq!(seen, (100, MutationState::Settling));
    assert_eq!(client.engine().key_state(board.key()), MutationState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stale_task_list_serves_old_page_while_refetching() {
    let (client, service) = setup_test_client();
    let mut first = client.tasks(TaskFilters::new());
    first.settled().await;
    drop(first);

    tokio::time::advance(Duration::from_secs(31)).await;
    service.set_task_status(&TaskId::new("t1"), CanonicalStatus::Testing);

    let mut second = client.tasks(TaskFilters::new());
    let state = second.state();
    assert!(state.is_fetching);
    assert_eq!(
        status_of(&state.data.unwrap().tasks, "t1"),
        Some(Status::Known(CanonicalStatus::Todo))
    );

    let state = second.settled().await;
    assert_eq!(
        status_of(&state.data.unwrap().tasks, "t1"),
        Some(Status::Known(CanonicalStatus::Testing))
    );
}

#[tokio::test(start_paused = true)]
async fn test_sprint_board_ignores_subscribe_and_focus_once_loaded() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::Mine);
    board.settled().await;

    tokio::time::advance(Duration::from_secs(120)).await;
    let again = client.sprint_board(SPRINT, BoardFilter::Mine);

    assert!(again.state().is_stale);
    assert!(!again.state().is_fetching);
    assert_eq!(client.focus(), 0);
    assert_eq!(again.tasks().len(), 3);
    assert_eq!(service.calls(Endpoint::SprintBoard), 1);

    board.refresh().await.unwrap();
    assert_eq!(service.calls(Endpoint::SprintBoard), 2);
}

#[tokio::test]
async fn test_filter_changes_reset_page() {
    let (client, _service) = setup_test_client();
    let mut list = client.tasks(TaskFilters::new());

    list.change_page(2);
    assert_eq!(list.filters().page, 2);
    assert_eq!(list.key().param("page"), Some("2"));

    list.apply_filters(TaskFilters::new().with_status(CanonicalStatus::Todo).with_page(4));
    assert_eq!(list.filters().page, 1);

    let state = list.settled().await;
    let page = state.data.unwrap();
    assert_eq!(page.tasks.len(), 1);
    assert_eq!(page.tasks[0].id, TaskId::new("t1"));
}

#[tokio::test]
async fn test_fetch_failure_keeps_cached_board() {
    let (client, service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;

    service.set_unavailable(true);
    let err = board.refresh().await.unwrap_err();
    assert!(err.is_retryable());

    let state = board.state();
    assert!(state.is_error());
    assert_eq!(state.data.unwrap().tasks.len(), 4);
}

#[tokio::test]
async fn test_shutdown_clears_cache() {
    let (client, _service) = setup_test_client();
    let mut board = client.sprint_board(SPRINT, BoardFilter::All);
    board.settled().await;
    assert_eq!(client.stats().entries, 1);

    client.shutdown();
    assert_eq!(client.stats().entries, 0);
    assert!(board.board().is_none());
}
