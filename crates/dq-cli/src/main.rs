//! `dq` binary

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use dq_cli::{metrics_from_json, normalize_lines, render_metrics, run_simulator, SimulatorConfig};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    Command::new("dq")
        .version(dq_cli::VERSION)
        .about("Developer query layer: statuses, sprint metrics and board simulation")
        .subcommand(
            Command::new("normalize")
                .about("Map raw status spellings to canonical statuses")
                .arg(
                    Arg::new("status")
                        .required(true)
                        .num_args(1..)
                        .help("Raw statuses, in any vocabulary"),
                ),
        )
        .subcommand(
            Command::new("metrics")
                .about("Dedupe a JSON task array and print sprint metrics")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("JSON file holding an array of tasks"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("simulate")
                .about("Replay random board moves against an in-memory backend")
                .arg(
                    Arg::new("moves")
                        .long("moves")
                        .default_value("20")
                        .value_parser(value_parser!(usize))
                        .help("Number of status moves"),
                )
                .arg(
                    Arg::new("tasks")
                        .long("tasks")
                        .default_value("12")
                        .value_parser(value_parser!(usize))
                        .help("Tasks in the simulated sprint"),
                )
                .arg(
                    Arg::new("fail-every")
                        .long("fail-every")
                        .default_value("0")
                        .value_parser(value_parser!(u64))
                        .help("Backend rejects every nth status update (0 never)"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = cli().get_matches();

    match matches.subcommand() {
        Some(("normalize", args)) => {
            let raw: Vec<&String> = args.get_many::<String>("status").into_iter().flatten().collect();
            for line in normalize_lines(&raw) {
                println!("{line}");
            }
        }
        Some(("metrics", args)) => {
            let path = args
                .get_one::<PathBuf>("file")
                .context("missing task file")?;
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let (tasks, metrics) = metrics_from_json(&body)
                .with_context(|| format!("parsing tasks from {}", path.display()))?;
            tracing::info!(tasks = tasks.len(), "tasks aggregated");

            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&metrics)?);
            } else {
                print!("{}", render_metrics(&metrics));
            }
        }
        Some(("simulate", args)) => {
            let defaults = SimulatorConfig::default();
            let config = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(defaults.seed),
                moves: args.get_one::<usize>("moves").copied().unwrap_or(defaults.moves),
                fail_every: args
                    .get_one::<u64>("fail-every")
                    .copied()
                    .unwrap_or(defaults.fail_every),
                tasks: args.get_one::<usize>("tasks").copied().unwrap_or(defaults.tasks),
                ..defaults
            };

            let report = run_simulator(config).await.context("simulation aborted")?;
            if args.get_flag("json") {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.generate_text());
            }
            std::process::exit(if report.passed() { 0 } else { 1 });
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
