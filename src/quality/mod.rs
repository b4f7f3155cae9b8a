//! Quality gate scoring for lesson packages.
//!
//! This module provides the two-level scoring model: per-gate evaluation of
//! validator output (weighted or binary), and pipeline-level aggregation with
//! deductions, automatic-fail overrides, and a final status.

mod aggregator;
mod evaluator;
mod gate;

pub use aggregator::{
    apply_deductions, determine_status, AggregateReport, AutoFailConditions, CategoryStatus,
    PipelineStatus, ScoreAggregator, ScoreBreakdownItem, Violation, ViolationKind,
    DEFAULT_PASS_THRESHOLD, DEFAULT_REVISION_THRESHOLD, MAX_VIOLATION_COUNT,
};
pub use evaluator::GateEvaluator;
pub use gate::{GateKind, GateResult, GateSpec, RetryStrategy};
