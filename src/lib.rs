//! lessonforge: Quality-gated lesson package generator.
//!
//! This library runs a multi-phase agent pipeline that plans a lesson,
//! generates its artifacts, validates them against weighted quality gates,
//! retries failed work with targeted strategies, and assembles passing
//! lessons into complete packages.

// Core modules
pub mod agents;
pub mod cli;
pub mod context;
pub mod pipeline;
pub mod quality;

// Re-export commonly used types
pub use agents::AgentError;
pub use context::{LessonContext, LessonIdentity};
pub use pipeline::{ConfigError, PipelineConfig, PipelineResult, PipelineRunner, RunStatus};
pub use quality::{AggregateReport, PipelineStatus};
