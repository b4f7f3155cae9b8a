//! CLI command definitions for lessonforge.
//!
//! This module provides the command-line interface for generating gated
//! lesson packages and inspecting the configured quality gates.

use crate::context::LessonIdentity;
use crate::pipeline::{PipelineConfig, PipelineEvent, PipelineResult, PipelineRunner};
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;

/// Default output directory for assembled lesson packages.
const DEFAULT_OUTPUT_DIR: &str = "./lesson-packages";

/// Default lesson duration in minutes.
const DEFAULT_DURATION_MINUTES: &str = "50";

/// Lesson package generator with quality-gated validation.
#[derive(Parser)]
#[command(name = "lessonforge")]
#[command(about = "Generate complete lesson packages through a quality-gated agent pipeline")]
#[command(version)]
#[command(
    long_about = "lessonforge runs a multi-phase agent pipeline that plans a lesson, generates its \
artifacts (warmup, content, examples, handout, slides), scores them against weighted quality \
gates, retries failed work with targeted strategies, and assembles passing lessons into a \
single package.\n\nExample usage:\n  lessonforge generate --unit 3 --day 2 --topic \"Photosynthesis and energy flow\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Generate one lesson package through the full pipeline.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Show the configured quality gates and their weights.
    Gates(GatesArgs),
}

/// Arguments for the generate command.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Unit number within the curriculum.
    #[arg(short = 'u', long)]
    pub unit: u32,

    /// Day within the unit.
    #[arg(short = 'd', long)]
    pub day: u32,

    /// Topic the lesson covers.
    #[arg(short = 't', long)]
    pub topic: String,

    /// Lesson duration in minutes.
    #[arg(long, default_value = DEFAULT_DURATION_MINUTES)]
    pub duration: u32,

    /// Grade level label.
    #[arg(short = 'g', long, default_value = "8")]
    pub grade: String,

    /// Subject area; drives standards framework selection.
    #[arg(short = 's', long, default_value = "Science")]
    pub subject: String,

    /// Pipeline configuration file (YAML). Without it, configuration comes
    /// from environment variables and defaults.
    #[arg(short = 'c', long, env = "LESSONFORGE_CONFIG")]
    pub config: Option<String>,

    /// Output directory for assembled lesson packages.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: String,

    /// Validate without assembling or writing a package.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the full run result as JSON instead of interactive progress.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for the gates command.
#[derive(Parser, Debug)]
pub struct GatesArgs {
    /// Pipeline configuration file (YAML). Without it, configuration comes
    /// from environment variables and defaults.
    #[arg(short = 'c', long, env = "LESSONFORGE_CONFIG")]
    pub config: Option<String>,

    /// Output the gate list as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// This is a convenience function that parses CLI args and runs the command.
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
///
/// This is the main entry point for the lessonforge CLI.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    let exit_code = match cli.command {
        Commands::Generate(args) => run_generate_command(args).await?,
        Commands::Gates(args) => run_gates_command(args).await?,
    };
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

// ============================================================================
// Generate Command Implementation
// ============================================================================

/// JSON output structure for a generation run.
#[derive(Debug, Clone, Serialize)]
struct GenerateOutput {
    /// Overall status: "SUCCESS", "PARTIAL", or "FAILED".
    status: String,
    /// Process exit code the status maps to.
    exit_code: i32,
    /// Where the assembled package was written, when one was.
    package_path: Option<String>,
    /// The full pipeline run record.
    result: PipelineResult,
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<i32> {
    if args.topic.trim().is_empty() {
        return Err(anyhow::anyhow!("Topic must not be empty"));
    }

    let mut config = load_config(args.config.as_deref())?;
    if args.dry_run {
        config = config.with_dry_run(true);
    }

    let identity = LessonIdentity::new(args.unit, args.day, args.topic.clone())
        .with_duration_minutes(args.duration)
        .with_grade_level(args.grade.clone())
        .with_subject(args.subject.clone());

    let mut runner = PipelineRunner::new(config)?;
    let observer = if args.json {
        None
    } else {
        let (tx, rx) = mpsc::channel(64);
        runner = runner.with_event_sender(tx);
        Some(tokio::spawn(print_progress(rx)))
    };

    let result = runner.run(identity).await;
    // Dropping the runner closes the event channel so the observer drains
    // and exits.
    drop(runner);
    if let Some(handle) = observer {
        let _ = handle.await;
    }

    let package_path = match result.lesson_package() {
        Some(package) => Some(write_package(&args.output, package)?),
        None => None,
    };

    let exit_code = result.exit_code();
    if args.json {
        let output = GenerateOutput {
            status: result.status.to_string(),
            exit_code,
            package_path,
            result,
        };
        let json_output = serde_json::to_string_pretty(&output)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        print_summary(&result, package_path.as_deref());
    }

    Ok(exit_code)
}

/// Print the human-readable end-of-run summary.
fn print_summary(result: &PipelineResult, package_path: Option<&str>) {
    println!("\n{}", "=".repeat(50));
    println!("📦 Lesson Generation Summary");
    println!("{}", "=".repeat(50));
    println!("Status:       {}", result.status);
    println!(
        "Lesson:       unit {} day {} - {}",
        result.identity.unit_number, result.identity.day, result.identity.topic
    );
    println!("Duration:     {}ms", result.duration_ms());
    println!("Retries:      {}", result.retry_history.len());

    if let Some(report) = &result.final_report {
        println!(
            "Final score:  {:.1} ({}) after {:.1} points deducted",
            report.final_score, report.status, report.deductions_applied
        );
        for item in &report.breakdown {
            println!(
                "  {:<16} {:>6.1} x {:.2} = {:>6.1}",
                item.category, item.raw_score, item.weight, item.weighted_contribution
            );
        }
        if !report.violations.is_empty() {
            println!("Violations:");
            for violation in &report.violations {
                match &violation.detail {
                    Some(detail) => {
                        println!("  {} x{} ({})", violation.kind, violation.count, detail)
                    }
                    None => println!("  {} x{}", violation.kind, violation.count),
                }
            }
        }
        if report.auto_fail.any() {
            for reason in &report.auto_fail.reasons {
                println!("  ⚠ auto-fail: {}", reason);
            }
        }
    }

    if !result.retry_history.is_empty() {
        println!("Retry history:");
        for record in &result.retry_history {
            println!(
                "  attempt {}: gate {} [{}] re-ran {}",
                record.attempt_number,
                record.failed_gate,
                record.strategy,
                record.agents_rerun.join(", ")
            );
        }
    }

    match result.status {
        crate::pipeline::RunStatus::Success => {
            if let Some(path) = package_path {
                println!("\n📁 Package saved to: {}", path);
            } else {
                println!("\nDry run: no package written.");
            }
        }
        crate::pipeline::RunStatus::Partial => {
            println!("\n⚠ Escalated for human review; artifacts retained, no package assembled.");
        }
        crate::pipeline::RunStatus::Failed => {
            let failed: Vec<&str> = result
                .outcomes
                .iter()
                .filter(|outcome| !outcome.succeeded)
                .map(|outcome| outcome.agent_name.as_str())
                .collect();
            println!("\n✗ Run aborted; failed agents: {}", failed.join(", "));
        }
    }
}

/// Stream progress lines while the pipeline runs.
async fn print_progress(mut rx: mpsc::Receiver<PipelineEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            PipelineEvent::PhaseStarted { phase, .. } => {
                println!("\n▶ {}", phase.display_name());
            }
            PipelineEvent::AgentCompleted {
                agent,
                succeeded,
                duration_ms,
                ..
            } => {
                let icon = if succeeded { "✓" } else { "✗" };
                println!("   {} {} ({}ms)", icon, agent, duration_ms);
            }
            PipelineEvent::GateEvaluated { result, .. } => {
                let icon = if result.passed { "✓" } else { "✗" };
                match result.raw_score {
                    Some(score) => println!(
                        "   {} gate {} scored {:.1} (threshold {:.0})",
                        icon, result.gate_name, score, result.threshold
                    ),
                    None => println!("   {} gate {} produced no score", icon, result.gate_name),
                }
            }
            PipelineEvent::RetryScheduled {
                attempt,
                failed_gate,
                strategy,
                agents,
                ..
            } => {
                println!(
                    "   ↻ retry {} for gate {} [{}]: re-running {}",
                    attempt,
                    failed_gate,
                    strategy,
                    agents.join(", ")
                );
            }
            PipelineEvent::Escalated {
                attempts,
                failed_gate,
                ..
            } => {
                println!(
                    "   ⚠ escalated after {} attempts (gate {})",
                    attempts, failed_gate
                );
            }
            _ => {}
        }
    }
}

/// Write the assembled package under the output directory, named by its
/// file stem.
fn write_package(output_dir: &str, package: &Value) -> anyhow::Result<String> {
    fs::create_dir_all(output_dir)
        .map_err(|e| anyhow::anyhow!("Failed to create output directory {}: {}", output_dir, e))?;

    let stem = package
        .get("file_stem")
        .and_then(Value::as_str)
        .unwrap_or("lesson_package");
    let path = Path::new(output_dir).join(format!("{stem}.json"));

    let json = serde_json::to_string_pretty(package)
        .map_err(|e| anyhow::anyhow!("Failed to serialize lesson package: {}", e))?;
    fs::write(&path, json)
        .map_err(|e| anyhow::anyhow!("Failed to write lesson package: {}", e))?;

    info!(path = %path.display(), "lesson package written");
    Ok(path.display().to_string())
}

// ============================================================================
// Gates Command Implementation
// ============================================================================

/// One row of the gate listing.
#[derive(Debug, Clone, Serialize)]
struct GateListEntry {
    name: String,
    agent: String,
    mode: String,
    threshold: f64,
    weight: f64,
    retry_strategy: String,
}

async fn run_gates_command(args: GatesArgs) -> anyhow::Result<i32> {
    let config = load_config(args.config.as_deref())?;

    let entries: Vec<GateListEntry> = config
        .gates
        .iter()
        .map(|spec| GateListEntry {
            name: spec.name.clone(),
            agent: spec.agent.name().to_string(),
            mode: if spec.is_binary() { "binary" } else { "weighted" }.to_string(),
            threshold: spec.threshold,
            weight: spec.weight,
            retry_strategy: spec.retry_strategy.to_string(),
        })
        .collect();

    if args.json {
        let json_output = serde_json::to_string_pretty(&entries)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(0);
    }

    println!(
        "{:<16} {:<24} {:<9} {:>9} {:>7}  {}",
        "GATE", "VALIDATOR", "MODE", "THRESHOLD", "WEIGHT", "RETRY STRATEGY"
    );
    for entry in &entries {
        println!(
            "{:<16} {:<24} {:<9} {:>9.1} {:>7.2}  {}",
            entry.name, entry.agent, entry.mode, entry.threshold, entry.weight, entry.retry_strategy
        );
    }
    println!(
        "\nPass at {:.0}+, revision band at {:.0}+, retry budget {}.",
        config.pass_threshold, config.revision_threshold, config.max_retry_iterations
    );

    Ok(0)
}

/// Load pipeline configuration from a YAML file when given, otherwise from
/// the environment.
fn load_config(path: Option<&str>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            info!(path, "loading pipeline configuration from file");
            let config = PipelineConfig::from_yaml_file(path)
                .map_err(|e| anyhow::anyhow!("Failed to load configuration {}: {}", path, e))?;
            Ok(config)
        }
        None => Ok(PipelineConfig::from_env()?),
    }
}
