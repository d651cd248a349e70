//! Scripted sprint-board simulation
//!
//! Seeds an in-memory backend, opens a board and a dashboard on one shared
//! cache, then replays random status moves written in every vocabulary the
//! normaliser knows. After each move the board is checked against the
//! invariants of the cache layer:
//!
//! - one task per id
//! - metrics equal a fresh aggregation of the tasks
//! - a rolled back or rejected move leaves the board exactly as before
//! - a confirmed move shows the server's status after refetch
//!
//! Once all moves are replayed, the dashboard must agree with the board.

use dq_core::{ClientConfig, ClientError, DeveloperClient, Endpoint, InMemoryTaskService, TaskService};
use dq_domain::{
    compute_metrics, normalize, BacklogItem, BacklogStatus, BoardFilter, CanonicalStatus, Sprint,
    SprintBoard, Task,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;

/// Sprint the simulation runs on
pub const SIM_SPRINT: &str = "sim";
/// Developer every simulated task is assigned to
pub const SIM_DEVELOPER: &str = "dev";

/// Status spellings sent by simulated moves
const SPELLINGS: &[&str] = &[
    "todo",
    "pendiente",
    "in_progress",
    "en_progreso",
    "in-progress",
    "code-review",
    "en_revision",
    "qa",
    "testing",
    "done",
    "completado",
];

/// Spelling no vocabulary knows
const UNRECOGNIZED: &str = "blocked";

/// Simulation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatorConfig {
    /// RNG seed
    pub seed: u64,
    /// Status moves to replay
    pub moves: usize,
    /// Backend rejects every nth update; 0 never
    pub fail_every: u64,
    /// Tasks in the sprint
    pub tasks: usize,
    /// Every nth move uses an unrecognised status; 0 never
    pub unrecognized_every: usize,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            moves: 20,
            fail_every: 0,
            tasks: 12,
            unrecognized_every: 10,
        }
    }
}

/// How one move ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveOutcome {
    /// Backend accepted; board refetched
    Confirmed,
    /// Backend refused; optimistic write undone
    RolledBack,
    /// Status unrecognised; nothing written or sent
    Rejected,
}

/// One replayed move
#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    /// Task moved
    pub task: String,
    /// Status as requested
    pub requested: String,
    /// Result
    pub outcome: MoveOutcome,
    /// Board progress once settled
    pub progress_after: u8,
}

/// Simulation result
#[derive(Debug, Clone, Serialize)]
pub struct SimulatorReport {
    /// RNG seed used
    pub seed: u64,
    /// Every move, in order
    pub moves: Vec<MoveRecord>,
    /// Invariant violations found
    pub violations: Vec<String>,
    /// Final board
    pub board: SprintBoard,
    /// Board fetches served by the backend
    pub board_fetches: usize,
    /// Status updates received by the backend
    pub status_updates: usize,
}

impl SimulatorReport {
    /// Moves that ended with `outcome`
    #[must_use]
    pub fn count(&self, outcome: MoveOutcome) -> usize {
        self.moves.iter().filter(|m| m.outcome == outcome).count()
    }

    /// No invariant was violated
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable summary
    #[must_use]
    pub fn generate_text(&self) -> String {
        let metrics = &self.board.metrics;
        let mut out = String::new();
        let _ = writeln!(out, "Board Simulation (seed {})", self.seed);
        let _ = writeln!(
            out,
            "  Moves: {} (confirmed {}, rolled back {}, rejected {})",
            self.moves.len(),
            self.count(MoveOutcome::Confirmed),
            self.count(MoveOutcome::RolledBack),
            self.count(MoveOutcome::Rejected),
        );
        let _ = writeln!(
            out,
            "  Backend: {} board fetches, {} status updates",
            self.board_fetches, self.status_updates
        );
        let _ = writeln!(
            out,
            "  Progress: {}% ({}/{} points)",
            metrics.sprint_progress, metrics.completed_points, metrics.total_points
        );
        let columns: Vec<String> = CanonicalStatus::ALL
            .iter()
            .map(|s| format!("{s} {}", metrics.counts.get(*s)))
            .collect();
        let _ = writeln!(out, "  Columns: {}", columns.join(" | "));
        for (i, m) in self.moves.iter().enumerate() {
            let _ = writeln!(
                out,
                "    #{:<3} {} -> {}: {:?} ({}%)",
                i + 1,
                m.task,
                m.requested,
                m.outcome,
                m.progress_after
            );
        }
        let _ = writeln!(out, "  Violations: {}", self.violations.len());
        for v in &self.violations {
            let _ = writeln!(out, "    - {v}");
        }
        let _ = write!(out, "  Status: {}", if self.passed() { "PASSED" } else { "FAILED" });
        out
    }
}

/// Seed the in-memory backend
///
/// Every fourth task is also listed as a sprint backlog item, so the board
/// payload carries duplicates for the dedupe step.
pub fn seed_backend(rng: &mut StdRng, tasks: usize) -> InMemoryTaskService {
    let mut service = InMemoryTaskService::new(SIM_DEVELOPER)
        .with_sprint(Sprint::new(SIM_SPRINT, "Simulated sprint").with_goal("Keep the board honest"));

    for i in 1..=tasks.max(1) {
        let status = CanonicalStatus::ALL[rng.random_range(0..CanonicalStatus::ALL.len())];
        let points = rng.random_range(1..=8);
        let task = Task::new(format!("task-{i:02}"), format!("Simulated task {i}"))
            .with_status(status)
            .with_story_points(points)
            .with_sprint(SIM_SPRINT)
            .with_assignee(SIM_DEVELOPER);

        if i % 4 == 0 {
            service = service.with_backlog_item(
                SIM_SPRINT,
                BacklogItem {
                    id: task.id.as_str().to_string(),
                    title: task.title.clone(),
                    description: String::new(),
                    status: BacklogStatus::from(status).as_str().to_string(),
                    priority: task.priority,
                    story_points: Some(points),
                },
            );
        }
        service = service.with_tasks([task]);
    }
    service
}

/// Run the simulation
///
/// # Errors
/// The initial board fetch failed, or a move failed for a reason other than
/// rollback or rejection
pub async fn run_simulator(config: SimulatorConfig) -> Result<SimulatorReport, ClientError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let service = Arc::new(seed_backend(&mut rng, config.tasks));
    service.fail_every_update(config.fail_every);

    let backend: Arc<dyn TaskService> = Arc::clone(&service) as Arc<dyn TaskService>;
    let client = DeveloperClient::new(ClientConfig::new(), backend);
    let mut board = client.sprint_board(SIM_SPRINT, BoardFilter::All);
    let mut dashboard = client.dashboard();

    if let Some(error) = board.settled().await.error {
        return Err(error.into());
    }
    dashboard.settled().await;

    let mut moves = Vec::with_capacity(config.moves);
    let mut violations = Vec::new();

    for step in 1..=config.moves {
        let Some(before) = board.board() else {
            violations.push(format!("move {step}: board missing from cache"));
            break;
        };
        let task = before.tasks[rng.random_range(0..before.tasks.len())].id.clone();
        let requested = if config.unrecognized_every > 0 && step % config.unrecognized_every == 0 {
            UNRECOGNIZED
        } else {
            SPELLINGS[rng.random_range(0..SPELLINGS.len())]
        };

        let outcome = match board.update_task_status(&task, requested).await {
            Ok(_) => MoveOutcome::Confirmed,
            Err(ClientError::UnrecognizedStatus(_)) => MoveOutcome::Rejected,
            Err(error) if error.is_rollback() => MoveOutcome::RolledBack,
            Err(error) => return Err(error),
        };
        tracing::debug!(step, task = %task, requested, ?outcome, "move settled");

        let state = board.settled().await;
        let Some(after) = state.data else {
            violations.push(format!("move {step}: board missing after settling"));
            break;
        };
        check_board(step, &after, &mut violations);

        match outcome {
            MoveOutcome::Confirmed => {
                let expected = normalize(requested);
                let shown = after.task(&task).map(|t| &t.status);
                if shown != Some(&expected) {
                    violations.push(format!(
                        "move {step}: {task} shows {shown:?} after confirming {expected}"
                    ));
                }
            }
            MoveOutcome::RolledBack | MoveOutcome::Rejected => {
                if *after != *before {
                    violations.push(format!("move {step}: board changed after {outcome:?}"));
                }
            }
        }

        moves.push(MoveRecord {
            task: task.to_string(),
            requested: requested.to_string(),
            outcome,
            progress_after: after.metrics.sprint_progress,
        });
    }

    let summary = dashboard.settled().await.data;
    let final_board = board.settled().await.data;
    let Some(final_board) = final_board else {
        return Err(ClientError::Query(dq_query::QueryError::Evicted(board.key().clone())));
    };
    if let Some(summary) = summary {
        if summary.metrics != final_board.metrics {
            violations.push(format!(
                "dashboard progress {}% disagrees with board {}%",
                summary.metrics.sprint_progress, final_board.metrics.sprint_progress
            ));
        }
    }

    let report = SimulatorReport {
        seed: config.seed,
        moves,
        violations,
        board: (*final_board).clone(),
        board_fetches: service.calls(Endpoint::SprintBoard),
        status_updates: service.calls(Endpoint::UpdateStatus),
    };
    client.shutdown();
    tracing::info!(
        moves = report.moves.len(),
        violations = report.violations.len(),
        "simulation finished"
    );
    Ok(report)
}

fn check_board(step: usize, board: &SprintBoard, violations: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for task in &board.tasks {
        if !seen.insert(&task.id) {
            violations.push(format!("move {step}: duplicate task {}", task.id));
        }
    }
    if board.metrics != compute_metrics(&board.tasks) {
        violations.push(format!("move {step}: metrics out of sync with tasks"));
    }
}
