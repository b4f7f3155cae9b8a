//! Pipeline runner for lesson package generation.
//!
//! This module provides the `PipelineRunner` that coordinates:
//! - The four phases: unit planning, daily generation, validation, assembly
//! - Agent execution with critical-failure aborts
//! - Quality gate evaluation and score aggregation
//! - Targeted retries with escalation when the budget runs out
//! - Progress events over an optional channel

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::{AgentFactory, AgentOutcome, DefaultAgentFactory};
use crate::context::{LessonContext, LessonIdentity};
use crate::quality::{
    AggregateReport, AutoFailConditions, GateEvaluator, GateResult, RetryStrategy, ScoreAggregator,
    Violation,
};

use super::config::{AgentSpec, ConfigError, PhaseRoster, PipelineConfig};
use super::events::PipelineEvent;
use super::phase::{Phase, PhaseResult};
use super::retry::{RetryAction, RetryController, RetryRecord};

/// Overall outcome of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Validation passed and the package was assembled (or dry-run skipped it).
    Success,
    /// Retries were exhausted; artifacts exist but no package was assembled.
    Partial,
    /// A critical agent failed and the run aborted.
    Failed,
}

impl RunStatus {
    /// Process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 1,
            RunStatus::Failed => 2,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunStatus::Success => "SUCCESS",
            RunStatus::Partial => "PARTIAL",
            RunStatus::Failed => "FAILED",
        };
        write!(f, "{label}")
    }
}

/// Full record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Unique id of this run.
    pub run_id: Uuid,
    /// Overall outcome.
    pub status: RunStatus,
    /// The lesson the run was producing.
    pub identity: LessonIdentity,
    /// Per-phase execution records, in phase order. Phases that never ran
    /// are absent.
    pub phase_results: Vec<PhaseResult>,
    /// Whether validation ended in a passing aggregate.
    pub validation_passed: bool,
    /// The last aggregate report, absent when validation never scored.
    pub final_report: Option<AggregateReport>,
    /// Retry decisions made during validation.
    pub retry_history: Vec<RetryRecord>,
    /// Every agent invocation of the run, including re-runs.
    pub outcomes: Vec<AgentOutcome>,
    /// The assembled lesson package, when assembly ran and succeeded.
    pub package: Option<Value>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineResult {
    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// The assembled lesson package, if any.
    pub fn lesson_package(&self) -> Option<&Value> {
        self.package.as_ref()
    }

    /// Wall-clock duration of the run.
    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Accumulator for the pieces of a [`PipelineResult`] while a run is in
/// flight.
struct RunState {
    run_id: Uuid,
    identity: LessonIdentity,
    started_at: DateTime<Utc>,
    phase_results: Vec<PhaseResult>,
    outcomes: Vec<AgentOutcome>,
    validation_passed: bool,
    final_report: Option<AggregateReport>,
    retry_history: Vec<RetryRecord>,
    package: Option<Value>,
}

impl RunState {
    fn new(identity: LessonIdentity) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            identity,
            started_at: Utc::now(),
            phase_results: Vec::new(),
            outcomes: Vec::new(),
            validation_passed: false,
            final_report: None,
            retry_history: Vec::new(),
            package: None,
        }
    }

    fn finish(self, status: RunStatus) -> PipelineResult {
        PipelineResult {
            run_id: self.run_id,
            status,
            identity: self.identity,
            phase_results: self.phase_results,
            validation_passed: self.validation_passed,
            final_report: self.final_report,
            retry_history: self.retry_history,
            outcomes: self.outcomes,
            package: self.package,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Coordinates one lesson generation run end to end.
pub struct PipelineRunner {
    config: PipelineConfig,
    factory: Arc<dyn AgentFactory>,
    event_tx: Option<mpsc::Sender<PipelineEvent>>,
}

impl PipelineRunner {
    /// Creates a new runner with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration fails validation.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            factory: Arc::new(DefaultAgentFactory),
            event_tx: None,
        })
    }

    /// Builder method to replace the agent factory.
    pub fn with_factory(mut self, factory: Arc<dyn AgentFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Builder method to attach an event channel.
    pub fn with_event_sender(mut self, event_tx: mpsc::Sender<PipelineEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// Gets the current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the full pipeline for one lesson.
    ///
    /// Never returns an error: every failure mode is folded into the
    /// returned result's status and phase records.
    pub async fn run(&self, identity: LessonIdentity) -> PipelineResult {
        info!(
            unit = identity.unit_number,
            day = identity.day,
            topic = %identity.topic,
            dry_run = self.config.dry_run,
            "starting lesson pipeline"
        );

        let mut state = RunState::new(identity.clone());
        let mut ctx = LessonContext::new(identity);

        // Planning and generation run straight through, aborting on a
        // critical agent failure.
        for phase in [Phase::UnitPlanning, Phase::DailyGeneration] {
            let Some(roster) = self.config.roster(phase) else {
                continue;
            };
            emit(&self.event_tx, PipelineEvent::phase_started(phase)).await;
            let mut result = PhaseResult::started(phase);
            let ok = self
                .run_agents(phase, &roster.agents, &mut ctx, &mut result, &mut state.outcomes)
                .await;
            if ok {
                result.complete();
            } else {
                result.fail();
            }
            emit(&self.event_tx, PipelineEvent::phase_completed(phase, ok)).await;
            state.phase_results.push(result);
            if !ok {
                error!(phase = %phase, "critical agent failed, aborting run");
                return self.finalize(state, RunStatus::Failed).await;
            }
        }

        let critical_validation_failure = self.run_validation(&mut state, &mut ctx).await;
        if critical_validation_failure {
            return self.finalize(state, RunStatus::Failed).await;
        }

        if !state.validation_passed {
            // Escalated: everything generated so far is kept, but nothing
            // is packaged.
            return self.finalize(state, RunStatus::Partial).await;
        }

        if self.config.dry_run {
            info!("dry run: skipping assembly");
            emit(&self.event_tx, PipelineEvent::phase_started(Phase::Assembly)).await;
            let mut result = PhaseResult::started(Phase::Assembly);
            result.complete();
            emit(
                &self.event_tx,
                PipelineEvent::phase_completed(Phase::Assembly, true),
            )
            .await;
            state.phase_results.push(result);
            return self.finalize(state, RunStatus::Success).await;
        }

        let assembly_ok = if let Some(roster) = self.config.roster(Phase::Assembly) {
            emit(&self.event_tx, PipelineEvent::phase_started(Phase::Assembly)).await;
            let mut result = PhaseResult::started(Phase::Assembly);
            let ok = self
                .run_agents(
                    Phase::Assembly,
                    &roster.agents,
                    &mut ctx,
                    &mut result,
                    &mut state.outcomes,
                )
                .await;
            if ok {
                result.complete();
            } else {
                result.fail();
            }
            emit(
                &self.event_tx,
                PipelineEvent::phase_completed(Phase::Assembly, ok),
            )
            .await;
            state.phase_results.push(result);
            ok
        } else {
            true
        };

        if !assembly_ok {
            return self.finalize(state, RunStatus::Failed).await;
        }

        state.package = ctx
            .agent_output_value("package_assembler", "lesson_package")
            .cloned();
        self.finalize(state, RunStatus::Success).await
    }

    /// Runs the validation loop: validators, gates, aggregation, and
    /// targeted retries. Returns true when a critical validator failed.
    async fn run_validation(&self, state: &mut RunState, ctx: &mut LessonContext) -> bool {
        let Some(validation_roster) = self.config.roster(Phase::Validation) else {
            state.validation_passed = true;
            return false;
        };
        let generation_roster = self.config.roster(Phase::DailyGeneration);

        emit(
            &self.event_tx,
            PipelineEvent::phase_started(Phase::Validation),
        )
        .await;
        let mut result = PhaseResult::started(Phase::Validation);
        let evaluator = GateEvaluator::new();
        let aggregator = ScoreAggregator::new(self.config.gate_weights())
            .with_status_thresholds(self.config.pass_threshold, self.config.revision_threshold);
        let mut retry = RetryController::new(
            self.config.max_retry_iterations,
            self.config.retry_map.clone(),
        );
        let mut critical_failed = false;

        loop {
            let ok = self
                .run_agents(
                    Phase::Validation,
                    &validation_roster.agents,
                    ctx,
                    &mut result,
                    &mut state.outcomes,
                )
                .await;
            if !ok {
                critical_failed = true;
                break;
            }

            let mut gate_results = Vec::with_capacity(self.config.gates.len());
            for spec in &self.config.gates {
                let gate_result = match ctx.agent_output(spec.agent.name()) {
                    Some(output) => evaluator.evaluate(spec, output),
                    None => {
                        // The gate's validator failed non-critically; the
                        // gate cannot score but still names its recovery.
                        let mut skipped = GateResult::skipped(spec.name.clone(), spec.threshold);
                        skipped.retry_strategy = Some(spec.retry_strategy);
                        skipped
                    }
                };
                emit(
                    &self.event_tx,
                    PipelineEvent::gate_evaluated(gate_result.clone()),
                )
                .await;
                ctx.record_gate_result(gate_result.clone());
                gate_results.push(gate_result);
            }

            let violations = collect_violations(ctx, validation_roster);
            let auto_fail = detect_auto_fail(ctx);
            let report = aggregator.aggregate(&gate_results, &violations, auto_fail);
            info!(
                final_score = report.final_score,
                status = %report.status,
                "validation round scored"
            );

            if report.is_pass() {
                state.final_report = Some(report);
                state.validation_passed = true;
                result.complete();
                break;
            }

            match retry.next_action(&gate_results) {
                RetryAction::Retry { record, agents } => {
                    warn!(
                        attempt = record.attempt_number,
                        failed_gate = %record.failed_gate,
                        strategy = %record.strategy,
                        "validation failed, re-running targeted agents"
                    );
                    emit(
                        &self.event_tx,
                        PipelineEvent::retry_scheduled(
                            record.attempt_number,
                            record.failed_gate.clone(),
                            record.strategy,
                            record.agents_rerun.clone(),
                        ),
                    )
                    .await;
                    result.mark_retrying();
                    state.final_report = Some(report);
                    apply_retry_flags(ctx, &record);

                    // Re-run in roster order with roster criticality.
                    let targets: Vec<AgentSpec> = generation_roster
                        .map(|roster| {
                            roster
                                .agents
                                .iter()
                                .filter(|spec| agents.contains(&spec.kind))
                                .cloned()
                                .collect()
                        })
                        .unwrap_or_default();
                    let rerun_ok = self
                        .run_agents(
                            Phase::DailyGeneration,
                            &targets,
                            ctx,
                            &mut result,
                            &mut state.outcomes,
                        )
                        .await;
                    if !rerun_ok {
                        critical_failed = true;
                        break;
                    }
                }
                RetryAction::Escalate {
                    failed_gate,
                    attempts,
                } => {
                    warn!(
                        attempts,
                        failed_gate = %failed_gate,
                        "retry budget exhausted, escalating"
                    );
                    emit(
                        &self.event_tx,
                        PipelineEvent::escalated(attempts, failed_gate),
                    )
                    .await;
                    state.final_report = Some(report);
                    result.escalate();
                    break;
                }
            }
        }

        if critical_failed {
            result.fail();
        }
        let succeeded = state.validation_passed;
        emit(
            &self.event_tx,
            PipelineEvent::phase_completed(Phase::Validation, succeeded),
        )
        .await;
        state.retry_history = retry.into_history();
        state.phase_results.push(result);
        critical_failed
    }

    /// Runs a list of agents in order, merging each success into the
    /// context. Returns false as soon as a critical agent fails; the
    /// failure of a non-critical agent is recorded and skipped over.
    async fn run_agents(
        &self,
        phase: Phase,
        specs: &[AgentSpec],
        ctx: &mut LessonContext,
        result: &mut PhaseResult,
        outcomes: &mut Vec<AgentOutcome>,
    ) -> bool {
        for spec in specs {
            emit(
                &self.event_tx,
                PipelineEvent::agent_started(phase, spec.kind.name()),
            )
            .await;
            let agent = self.factory.create(spec.kind);
            let start = Instant::now();
            let agent_result = agent.execute(ctx).await;
            let duration_ms = start.elapsed().as_millis() as u64;
            let outcome = AgentOutcome::from_result(spec.kind, agent_result, duration_ms);
            emit(
                &self.event_tx,
                PipelineEvent::agent_completed(phase, spec.kind.name(), outcome.succeeded, duration_ms),
            )
            .await;

            if outcome.succeeded {
                debug!(agent = spec.kind.name(), duration_ms, "agent completed");
                ctx.merge_agent_output(spec.kind.name(), outcome.output.clone());
            } else {
                warn!(
                    agent = spec.kind.name(),
                    errors = ?outcome.errors,
                    "agent failed"
                );
            }

            result.record_agent(&outcome);
            let critical_failure = !outcome.succeeded && spec.critical;
            outcomes.push(outcome);
            if critical_failure {
                return false;
            }
        }
        true
    }

    async fn finalize(&self, state: RunState, status: RunStatus) -> PipelineResult {
        emit(
            &self.event_tx,
            PipelineEvent::pipeline_completed(state.final_report.clone()),
        )
        .await;
        let result = state.finish(status);
        info!(
            run_id = %result.run_id,
            status = %result.status,
            duration_ms = result.duration_ms(),
            retries = result.retry_history.len(),
            "lesson pipeline finished"
        );
        result
    }
}

/// Forwards an event to the observer channel, if one is attached.
async fn emit(tx: &Option<mpsc::Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(sender) = tx {
        let _ = sender.send(event).await;
    }
}

/// Gathers serialized violations from every validator's output.
fn collect_violations(ctx: &LessonContext, roster: &PhaseRoster) -> Vec<Violation> {
    let mut violations = Vec::new();
    for spec in &roster.agents {
        let Some(reported) = ctx
            .agent_output_value(spec.kind.name(), "violations")
            .and_then(Value::as_array)
        else {
            continue;
        };
        for value in reported {
            match serde_json::from_value::<Violation>(value.clone()) {
                Ok(violation) => violations.push(violation),
                Err(parse_error) => warn!(
                    agent = spec.kind.name(),
                    %parse_error,
                    "ignoring malformed violation"
                ),
            }
        }
    }
    violations
}

/// Checks the context for conditions that fail the run outright.
fn detect_auto_fail(ctx: &LessonContext) -> AutoFailConditions {
    let mut conditions = AutoFailConditions::none();

    if let Some(missing) = ctx
        .agent_output_value("component_validator", "missing_components")
        .and_then(Value::as_array)
    {
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().filter_map(Value::as_str).collect();
            conditions.flag_missing_artifact(format!(
                "required components missing: {}",
                names.join(", ")
            ));
        }
    }

    if let Some(sections) = ctx
        .agent_output_value("content_builder", "content")
        .and_then(|c| c.get("sections"))
        .and_then(Value::as_array)
    {
        if sections.is_empty() {
            conditions.flag_missing_structure("content has no sections");
        }
    }

    if let Some(slides) = ctx
        .agent_output_value("slide_outliner", "slides")
        .and_then(|deck| deck.get("slides"))
        .and_then(Value::as_array)
    {
        if slides.is_empty() {
            conditions.flag_missing_structure("slide deck is empty");
        }
    }

    conditions
}

/// Seeds the context flags a retry strategy's re-run agents react to.
fn apply_retry_flags(ctx: &mut LessonContext, record: &RetryRecord) {
    ctx.set("retry_attempt", json!(record.attempt_number));
    match record.strategy {
        RetryStrategy::EnrichmentPass => {
            ctx.set("enrichment_requested", json!(true));
        }
        RetryStrategy::TimingAdjust => {
            let actual = ctx
                .agent_output_value("timing_validator", "actual_words")
                .cloned()
                .unwrap_or_else(|| json!(0.0));
            let target = ctx
                .agent_output_value("timing_validator", "target_words")
                .cloned()
                .unwrap_or_else(|| json!(0.0));
            ctx.set(
                "word_budget_feedback",
                json!({ "actual_words": actual, "target_words": target }),
            );
        }
        RetryStrategy::SlideRework => {
            ctx.set("slide_rework_requested", json!(true));
        }
        // A full regeneration needs no steering flags.
        RetryStrategy::ComponentRegen => {}
    }
}
