//! DQ CLI - command-line front end for the developer query layer
//!
//! - `normalize`: map raw status spellings to canonical values
//! - `metrics`: dedupe a task export and aggregate sprint metrics
//! - `simulate`: replay random board moves against an in-memory backend
//!   and check the cache invariants after each one

pub mod commands;
pub mod simulator;

pub use commands::{metrics_from_json, normalize_lines, render_metrics};
pub use simulator::{
    run_simulator, seed_backend, MoveOutcome, MoveRecord, SimulatorConfig, SimulatorReport,
    SIM_DEVELOPER, SIM_SPRINT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
