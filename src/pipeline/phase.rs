//! Pipeline phases and per-phase execution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agents::AgentOutcome;

/// The four stages of a lesson generation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Unit skeleton and standards alignment.
    UnitPlanning,
    /// Drafting of every lesson artifact for the day.
    DailyGeneration,
    /// Quality gates over the drafted artifacts.
    Validation,
    /// Final packaging of the validated artifacts.
    Assembly,
}

impl Phase {
    /// All phases in the order the orchestrator runs them.
    pub fn all() -> [Phase; 4] {
        [
            Phase::UnitPlanning,
            Phase::DailyGeneration,
            Phase::Validation,
            Phase::Assembly,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::UnitPlanning => "unit_planning",
            Phase::DailyGeneration => "daily_generation",
            Phase::Validation => "validation",
            Phase::Assembly => "assembly",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Phase::UnitPlanning => "Unit Planning",
            Phase::DailyGeneration => "Daily Generation",
            Phase::Validation => "Validation",
            Phase::Assembly => "Assembly",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Lifecycle of a phase within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Pending,
    Running,
    Completed,
    /// A critical agent failed; the run aborts.
    Failed,
    /// Validation failed and targeted agents are being re-run.
    Retrying,
    /// Retries are exhausted; the run continues degraded.
    Escalated,
}

impl PhaseState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseState::Completed | PhaseState::Failed | PhaseState::Escalated
        )
    }
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PhaseState::Pending => "pending",
            PhaseState::Running => "running",
            PhaseState::Completed => "completed",
            PhaseState::Failed => "failed",
            PhaseState::Retrying => "retrying",
            PhaseState::Escalated => "escalated",
        };
        write!(f, "{label}")
    }
}

/// Execution record for one phase. Retries mutate the same record rather
/// than appending a new one, so `retry_count` is the only growth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_name: String,
    pub status: PhaseState,
    /// Agents that ran, in order, including re-runs.
    pub agents_run: Vec<String>,
    /// Agents whose execution returned an error.
    pub agents_failed: Vec<String>,
    pub retry_count: u32,
    /// Merged outputs of the phase's agents.
    pub outputs: Map<String, Value>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PhaseResult {
    /// Starts a new record in the running state.
    pub fn started(phase: Phase) -> Self {
        Self {
            phase_name: phase.name().to_string(),
            status: PhaseState::Running,
            agents_run: Vec::new(),
            agents_failed: Vec::new(),
            retry_count: 0,
            outputs: Map::new(),
            started_at: Utc::now(),
            duration_ms: 0,
        }
    }

    /// Folds one agent outcome into the record.
    pub fn record_agent(&mut self, outcome: &AgentOutcome) {
        self.agents_run.push(outcome.agent_name.clone());
        if !outcome.succeeded {
            self.agents_failed.push(outcome.agent_name.clone());
        }
        for (key, value) in &outcome.output {
            self.outputs.insert(key.clone(), value.clone());
        }
    }

    pub fn complete(&mut self) {
        self.status = PhaseState::Completed;
        self.touch_duration();
    }

    pub fn fail(&mut self) {
        self.status = PhaseState::Failed;
        self.touch_duration();
    }

    pub fn mark_retrying(&mut self) {
        self.status = PhaseState::Retrying;
        self.retry_count += 1;
    }

    pub fn escalate(&mut self) {
        self.status = PhaseState::Escalated;
        self.touch_duration();
    }

    fn touch_duration(&mut self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentKind, AgentOutput, AgentOutcome};
    use serde_json::json;

    #[test]
    fn test_phase_order() {
        let phases = Phase::all();
        assert_eq!(phases[0], Phase::UnitPlanning);
        assert_eq!(phases[3], Phase::Assembly);
        assert_eq!(Phase::Validation.name(), "validation");
    }

    #[test]
    fn test_terminal_states() {
        assert!(PhaseState::Completed.is_terminal());
        assert!(PhaseState::Failed.is_terminal());
        assert!(PhaseState::Escalated.is_terminal());
        assert!(!PhaseState::Running.is_terminal());
        assert!(!PhaseState::Retrying.is_terminal());
    }

    #[test]
    fn test_record_agent_tracks_failures_and_outputs() {
        let mut result = PhaseResult::started(Phase::DailyGeneration);

        let ok = AgentOutcome::from_result(
            AgentKind::Warmup,
            Ok(AgentOutput::new().with_entry("warmup", json!({"prompt": "p"}))),
            12,
        );
        let failed = AgentOutcome::from_result(
            AgentKind::ContentBuilder,
            Err(crate::agents::AgentError::GenerationFailed("boom".into())),
            3,
        );
        result.record_agent(&ok);
        result.record_agent(&failed);

        assert_eq!(result.agents_run, vec!["warmup", "content_builder"]);
        assert_eq!(result.agents_failed, vec!["content_builder"]);
        assert!(result.outputs.contains_key("warmup"));
    }

    #[test]
    fn test_retry_then_complete_keeps_one_record() {
        let mut result = PhaseResult::started(Phase::Validation);
        result.mark_retrying();
        result.mark_retrying();
        result.complete();

        assert_eq!(result.retry_count, 2);
        assert_eq!(result.status, PhaseState::Completed);
    }
}
