use dq_cli::{run_simulator, MoveOutcome, SimulatorConfig};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_default_simulation_holds_invariants() {
    let report = run_simulator(SimulatorConfig::default()).await.unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.moves.len(), 20);
    assert_eq!(report.count(MoveOutcome::Rejected), 2);
    assert_eq!(report.count(MoveOutcome::RolledBack), 0);
    assert_eq!(report.count(MoveOutcome::Confirmed), 18);
    assert_eq!(report.status_updates, 18);
}

#[tokio::test]
async fn test_rejected_updates_never_refetch_the_board() {
    let config = SimulatorConfig {
        fail_every: 1,
        moves: 12,
        ..SimulatorConfig::default()
    };
    let report = run_simulator(config).await.unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.count(MoveOutcome::Confirmed), 0);
    assert_eq!(report.count(MoveOutcome::RolledBack), 11);
    assert_eq!(report.count(MoveOutcome::Rejected), 1);
    assert_eq!(report.board_fetches, 1);
}

#[tokio::test]
async fn test_confirmed_moves_refetch_once_each() {
    let config = SimulatorConfig {
        moves: 8,
        unrecognized_every: 0,
        ..SimulatorConfig::default()
    };
    let report = run_simulator(config).await.unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.count(MoveOutcome::Confirmed), 8);
    assert_eq!(report.board_fetches, 9);
}

#[tokio::test]
async fn test_mixed_failures_keep_board_consistent() {
    let config = SimulatorConfig {
        seed: 7,
        moves: 30,
        fail_every: 3,
        tasks: 20,
        unrecognized_every: 5,
    };
    let report = run_simulator(config).await.unwrap();

    assert!(report.passed(), "{}", report.generate_text());
    assert_eq!(report.count(MoveOutcome::Rejected), 6);
    assert_eq!(report.status_updates, 24);
    assert_eq!(report.count(MoveOutcome::RolledBack), 8);
    assert_eq!(report.board.tasks.len(), 20);
}

#[tokio::test]
async fn test_same_seed_replays_same_moves() {
    let a = run_simulator(SimulatorConfig::default()).await.unwrap();
    let b = run_simulator(SimulatorConfig::default()).await.unwrap();

    let moves = |r: &dq_cli::SimulatorReport| {
        r.moves
            .iter()
            .map(|m| (m.task.clone(), m.requested.clone(), m.outcome))
            .collect::<Vec<_>>()
    };
    assert_eq!(moves(&a), moves(&b));
    assert_eq!(a.board, b.board);
}

#[tokio::test]
async fn test_report_serializes_outcomes_in_snake_case() {
    let config = SimulatorConfig {
        moves: 3,
        fail_every: 1,
        unrecognized_every: 0,
        ..SimulatorConfig::default()
    };
    let report = run_simulator(config).await.unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["moves"][0]["outcome"], "rolled_back");
    assert_eq!(json["seed"], 42);
    assert!(report.generate_text().contains("Status: PASSED"));
}
