//! Pipeline orchestration for lesson package generation.
//!
//! This module provides the infrastructure for running the agent phases,
//! evaluating quality gates, retrying failed work, and assembling packages.
//!
//! # Architecture
//!
//! The pipeline consists of several components:
//!
//! - **Orchestrator**: The `PipelineRunner` that coordinates the entire run
//! - **Config**: Phase rosters, gate definitions, and retry strategy mapping
//! - **Retry**: The controller that picks recovery strategies and escalates
//! - **Events**: Progress notifications emitted over an optional channel
//!
//! # Pipeline Flow
//!
//! 1. **Unit Planning**: The unit planner and standards mapper establish
//!    objectives, vocabulary, and standards alignment
//! 2. **Daily Generation**: Warmup, content, example, handout, and slide
//!    agents produce the lesson artifacts
//! 3. **Validation**: Validator agents inspect the artifacts and each
//!    quality gate scores its validator's findings
//! 4. **Aggregation**: Gate scores combine into a weighted final score,
//!    with deductions and auto-fail overrides applied
//! 5. **Retry or Escalate**: A failing score re-runs only the agents named
//!    by the failed gate's strategy; an exhausted budget escalates the
//!    lesson for human review instead
//! 6. **Assembly**: The package assembler collects everything into one
//!    lesson package
//!
//! # Example
//!
//! ```rust,ignore
//! use lessonforge::context::LessonIdentity;
//! use lessonforge::pipeline::{PipelineConfig, PipelineRunner};
//!
//! // Create configuration
//! let config = PipelineConfig::default()
//!     .with_max_retry_iterations(3)
//!     .with_pass_threshold(90.0);
//!
//! // Create the runner
//! let runner = PipelineRunner::new(config)?;
//!
//! // Describe the lesson
//! let identity = LessonIdentity::new(3, 2, "Photosynthesis and energy flow")
//!     .with_duration_minutes(50)
//!     .with_grade_level("8");
//!
//! // Run the pipeline
//! let result = runner.run(identity).await;
//!
//! println!("Run {} finished: {}", result.run_id, result.status);
//! if let Some(report) = &result.final_report {
//!     println!("Final score: {:.1} ({})", report.final_score, report.status);
//! }
//! ```
//!
//! # Observing Progress
//!
//! The runner can stream events while it works:
//!
//! ```rust,ignore
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel(64);
//! let runner = PipelineRunner::new(PipelineConfig::default())?.with_event_sender(tx);
//!
//! tokio::spawn(async move {
//!     while let Some(event) = rx.recv().await {
//!         println!("{event:?}");
//!     }
//! });
//! ```
//!
//! # Configuration
//!
//! The pipeline can be configured via the `PipelineConfig` struct, a YAML
//! file, or environment variables:
//!
//! ```rust,ignore
//! // Via builder pattern
//! let config = PipelineConfig::default()
//!     .with_max_retry_iterations(5)
//!     .with_dry_run(true);
//!
//! // Via YAML file
//! let config = PipelineConfig::from_yaml_file("pipeline.yaml")?;
//!
//! // Via environment variables
//! let config = PipelineConfig::from_env()?;
//! ```

pub mod config;
pub mod events;
pub mod orchestrator;
pub mod phase;
pub mod retry;

// Re-export main types for convenience
pub use config::{AgentSpec, ConfigError, PhaseRoster, PipelineConfig};
pub use events::PipelineEvent;
pub use orchestrator::{PipelineResult, PipelineRunner, RunStatus};
pub use phase::{Phase, PhaseResult, PhaseState};
pub use retry::{RetryAction, RetryController, RetryRecord};
