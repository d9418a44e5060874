//! Minimal runner binary: loads an [`orc_engine::OrchestratorConfig`],
//! wires up a [`orc_engine::StageRegistry`], and drives one task or a
//! benchmark batch through it. Stage workers themselves (the part that
//! would call an LLM) are out of scope for this core — the registry here
//! is filled with the same fixed-output fixtures `orc-test-utils` supplies
//! to the test suites, standing in for a host's real agents.

use clap::{value_parser, Arg, ArgAction, Command};
use orc_bench::BenchmarkFan;
use orc_engine::{Engine, OrchestratorConfig, StageRegistry};
use orc_test_utils::{sample_task, FixedWorker};
use orc_types::Stage;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Build the demo registry standing in for a host's real stage workers:
/// every stage succeeds on the first attempt with a plausible token count.
fn demo_registry() -> StageRegistry {
    StageRegistry::new()
        .with_worker(Stage::Analyze, Arc::new(FixedWorker::new(500, json!({"summary": "demo analysis"}))))
        .with_worker(Stage::Assess, Arc::new(FixedWorker::new(400, json!({"severity": "medium"}))))
        .with_worker(Stage::Plan, Arc::new(FixedWorker::new(600, json!({"plan_summary": "demo plan"}))))
        .with_worker(
            Stage::Generate,
            Arc::new(FixedWorker::new(3000, json!({"patch_files": ["demo.patch"]}))),
        )
        .with_worker(Stage::Review, Arc::new(FixedWorker::new(400, json!({"requires_changes": false}))))
        .with_worker(Stage::Validate, Arc::new(FixedWorker::new(300, json!({"tests_passed": true}))))
}

fn load_config(path: Option<&PathBuf>) -> Result<OrchestratorConfig, String> {
    let Some(path) = path else {
        return Ok(OrchestratorConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    toml::from_str(&text).map_err(|e| format!("parsing {}: {e}", path.display()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    tracing::debug!("orc CLI starting");

    let cli = Command::new("orc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("SWE agent orchestrator core — minimal runner")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Drive one task through the engine to a terminal state")
                .arg(Arg::new("config").long("config").value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("source-url").long("source-url"))
                .arg(Arg::new("pretty").long("pretty").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("bench")
                .about("Drive a batch of tasks through the benchmark fan")
                .arg(Arg::new("config").long("config").value_parser(value_parser!(PathBuf)))
                .arg(Arg::new("target").long("target").required(true))
                .arg(
                    Arg::new("tasks")
                        .long("tasks")
                        .default_value("3")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("concurrency")
                        .long("concurrency")
                        .default_value("2")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("output-dir")
                        .long("output-dir")
                        .default_value("experiments")
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("validate-config")
                .about("Parse a TOML config and print it back as JSON")
                .arg(Arg::new("config").long("config").required(true).value_parser(value_parser!(PathBuf))),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = match load_config(args.get_one::<PathBuf>("config")) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(2);
                }
            };
            let mut task = sample_task();
            if let Some(url) = args.get_one::<String>("source-url") {
                task.source_url = url.clone();
            }

            let engine = Engine::new(config, demo_registry());
            let outcome = engine.process(task).await;

            let summary = json!({
                "state": format!("{:?}", outcome.state),
                "tokens_used": outcome.context.tokens_used,
                "cost_usd": outcome.context.cost_usd,
                "retry_count": outcome.context.retry_count,
                "errors": outcome.context.errors,
                "trace_path": outcome.trace_path,
            });
            let rendered = if args.get_flag("pretty") {
                serde_json::to_string_pretty(&summary).expect("JSON values always serialize")
            } else {
                summary.to_string()
            };
            println!("{rendered}");

            std::process::exit(if outcome.is_complete() { 0 } else { 1 });
        }
        Some(("bench", args)) => {
            let config = match load_config(args.get_one::<PathBuf>("config")) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(2);
                }
            };
            let target = args.get_one::<String>("target").expect("required").clone();
            let tasks = *args.get_one::<usize>("tasks").unwrap();
            let concurrency = *args.get_one::<usize>("concurrency").unwrap();
            let output_dir = args.get_one::<PathBuf>("output-dir").expect("has default").clone();

            let engine = Arc::new(Engine::new(config, demo_registry()));
            let mut fan = BenchmarkFan::new(output_dir);
            let run_id = fan.start_run(&target);

            let batch = std::iter::repeat_with(sample_task).take(tasks).collect();
            fan.run_batch(engine, batch, concurrency).await;

            match fan.complete_run() {
                Ok(path) => {
                    println!("run {run_id} written to {}", path.display());
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(2);
                }
            }
        }
        Some(("validate-config", args)) => {
            let path = args.get_one::<PathBuf>("config").expect("required");
            match load_config(Some(path)) {
                Ok(config) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config).expect("OrchestratorConfig always serializes")
                    );
                    std::process::exit(0);
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    std::process::exit(1);
                }
            }
        }
        _ => {}
    }
}
