//! Offline helpers behind the `normalize` and `metrics` subcommands

use dq_domain::{compute_metrics, dedupe, normalize, CanonicalStatus, SprintMetrics, Status, Task};
use std::fmt::Write as _;

/// One `raw -> canonical` line per input
#[must_use]
pub fn normalize_lines<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|s| {
            let s = s.as_ref();
            match normalize(s) {
                Status::Known(status) => format!("{s} -> {status}"),
                Status::Unrecognized(_) => format!("{s} -> (unrecognized)"),
            }
        })
        .collect()
}

/// Dedupe a JSON task array and aggregate it
///
/// # Errors
/// The input is not a JSON array of tasks
pub fn metrics_from_json(json: &str) -> Result<(Vec<Task>, SprintMetrics), serde_json::Error> {
    let tasks: Vec<Task> = serde_json::from_str(json)?;
    let tasks = dedupe(tasks);
    let metrics = compute_metrics(&tasks);
    Ok((tasks, metrics))
}

/// Plain-text metrics table
#[must_use]
pub fn render_metrics(metrics: &SprintMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Tasks:     {}", metrics.total_tasks);
    let _ = writeln!(
        out,
        "Points:    {}/{} done",
        metrics.completed_points, metrics.total_points
    );
    let _ = writeln!(out, "Progress:  {}%", metrics.sprint_progress);
    for status in CanonicalStatus::ALL {
        let _ = writeln!(out, "  {:<12} {}", status.as_str(), metrics.counts.get(status));
    }
    if metrics.unrecognized > 0 {
        let _ = writeln!(out, "  {:<12} {}", "unrecognized", metrics.unrecognized);
    }
    out
}
