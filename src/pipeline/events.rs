//! Progress events emitted during a pipeline run.
//!
//! The orchestrator sends these over an optional mpsc channel so callers can
//! stream run progress without polling. Sends are best-effort: a dropped or
//! full receiver never stalls the run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::phase::Phase;
use crate::quality::{AggregateReport, GateResult, RetryStrategy};

/// Events emitted during a lesson generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::large_enum_variant)]
pub enum PipelineEvent {
    /// A phase has started.
    PhaseStarted {
        /// The phase that started.
        phase: Phase,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// An agent invocation has started.
    AgentStarted {
        /// The phase the agent belongs to.
        phase: Phase,
        /// Name of the agent.
        agent: String,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// An agent invocation has finished.
    AgentCompleted {
        /// The phase the agent belongs to.
        phase: Phase,
        /// Name of the agent.
        agent: String,
        /// Whether the agent succeeded.
        succeeded: bool,
        /// Execution duration in milliseconds.
        duration_ms: u64,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// A quality gate has been evaluated.
    GateEvaluated {
        /// Result of the gate.
        result: GateResult,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// Validation failed and a targeted re-run has been scheduled.
    RetryScheduled {
        /// Retry attempt number, starting at 1.
        attempt: u32,
        /// The gate that triggered the retry.
        failed_gate: String,
        /// The recovery strategy chosen.
        strategy: RetryStrategy,
        /// Agents that will be re-run.
        agents: Vec<String>,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// Retries are exhausted; the run continues without assembly.
    Escalated {
        /// Retry attempts consumed.
        attempts: u32,
        /// The gate still failing when retries ran out.
        failed_gate: String,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// A phase has finished, in any terminal state.
    PhaseCompleted {
        /// The phase that finished.
        phase: Phase,
        /// Whether the phase completed cleanly.
        succeeded: bool,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
    /// The run has finished.
    PipelineCompleted {
        /// Final aggregate report, absent when validation never scored.
        report: Option<AggregateReport>,
        /// Timestamp of the event.
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Creates a phase started event.
    pub fn phase_started(phase: Phase) -> Self {
        PipelineEvent::PhaseStarted {
            phase,
            timestamp: Utc::now(),
        }
    }

    /// Creates an agent started event.
    pub fn agent_started(phase: Phase, agent: impl Into<String>) -> Self {
        PipelineEvent::AgentStarted {
            phase,
            agent: agent.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an agent completed event.
    pub fn agent_completed(
        phase: Phase,
        agent: impl Into<String>,
        succeeded: bool,
        duration_ms: u64,
    ) -> Self {
        PipelineEvent::AgentCompleted {
            phase,
            agent: agent.into(),
            succeeded,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Creates a gate evaluated event.
    pub fn gate_evaluated(result: GateResult) -> Self {
        PipelineEvent::GateEvaluated {
            result,
            timestamp: Utc::now(),
        }
    }

    /// Creates a retry scheduled event.
    pub fn retry_scheduled(
        attempt: u32,
        failed_gate: impl Into<String>,
        strategy: RetryStrategy,
        agents: Vec<String>,
    ) -> Self {
        PipelineEvent::RetryScheduled {
            attempt,
            failed_gate: failed_gate.into(),
            strategy,
            agents,
            timestamp: Utc::now(),
        }
    }

    /// Creates an escalated event.
    pub fn escalated(attempts: u32, failed_gate: impl Into<String>) -> Self {
        PipelineEvent::Escalated {
            attempts,
            failed_gate: failed_gate.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a phase completed event.
    pub fn phase_completed(phase: Phase, succeeded: bool) -> Self {
        PipelineEvent::PhaseCompleted {
            phase,
            succeeded,
            timestamp: Utc::now(),
        }
    }

    /// Creates a pipeline completed event.
    pub fn pipeline_completed(report: Option<AggregateReport>) -> Self {
        PipelineEvent::PipelineCompleted {
            report,
            timestamp: Utc::now(),
        }
    }
}
