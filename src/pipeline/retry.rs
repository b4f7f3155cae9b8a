//! Retry bookkeeping for failed validation rounds.
//!
//! The controller decides, after each failed validation, whether to re-run
//! a targeted set of generation agents or to give up and escalate. It owns
//! the full retry history for the run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::AgentKind;
use crate::quality::{GateResult, RetryStrategy};

/// One recorded retry decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecord {
    /// Attempt number, starting at 1.
    pub attempt_number: u32,
    /// Name of the gate that drove the retry, or "aggregate" when every
    /// gate passed but the final score still fell short.
    pub failed_gate: String,
    /// Human-readable reason taken from the gate's issues.
    pub reason: String,
    /// Strategy chosen for the re-run.
    pub strategy: RetryStrategy,
    /// Agents scheduled for re-run, in roster order.
    pub agents_rerun: Vec<String>,
    /// When the decision was made.
    pub recorded_at: DateTime<Utc>,
}

/// What the orchestrator should do after a failed validation round.
#[derive(Debug, Clone)]
pub enum RetryAction {
    /// Re-run the listed agents, then validate again.
    Retry {
        record: RetryRecord,
        agents: Vec<AgentKind>,
    },
    /// Retries are exhausted.
    Escalate {
        /// The gate still failing when the budget ran out.
        failed_gate: String,
        /// Attempts consumed.
        attempts: u32,
    },
}

/// Tracks retry attempts across the validation loop of one run.
#[derive(Debug)]
pub struct RetryController {
    max_retry_iterations: u32,
    retry_map: BTreeMap<RetryStrategy, Vec<AgentKind>>,
    attempts: u32,
    history: Vec<RetryRecord>,
}

impl RetryController {
    pub fn new(
        max_retry_iterations: u32,
        retry_map: BTreeMap<RetryStrategy, Vec<AgentKind>>,
    ) -> Self {
        Self {
            max_retry_iterations,
            retry_map,
            attempts: 0,
            history: Vec::new(),
        }
    }

    /// Decides the next action for a failed validation round.
    ///
    /// Consumes one attempt. The first failed gate in configuration order
    /// picks the strategy; when every gate passed but the aggregate still
    /// failed, slide rework is used as the cheapest redraft.
    pub fn next_action(&mut self, gate_results: &[GateResult]) -> RetryAction {
        self.attempts += 1;

        let failed = gate_results.iter().find(|result| !result.passed);
        let (failed_gate, strategy, reason) = match failed {
            Some(result) => {
                let strategy = result.retry_strategy.unwrap_or(RetryStrategy::SlideRework);
                let reason = result
                    .issues
                    .first()
                    .cloned()
                    .unwrap_or_else(|| format!("gate {} failed", result.gate_name));
                (result.gate_name.clone(), strategy, reason)
            }
            None => (
                "aggregate".to_string(),
                RetryStrategy::SlideRework,
                "final score fell below the pass threshold after deductions".to_string(),
            ),
        };

        if self.attempts > self.max_retry_iterations {
            return RetryAction::Escalate {
                failed_gate,
                attempts: self.max_retry_iterations,
            };
        }

        let agents = self
            .retry_map
            .get(&strategy)
            .cloned()
            .unwrap_or_else(|| strategy.default_agents());
        let record = RetryRecord {
            attempt_number: self.attempts,
            failed_gate,
            reason,
            strategy,
            agents_rerun: agents.iter().map(|agent| agent.name().to_string()).collect(),
            recorded_at: Utc::now(),
        };
        self.history.push(record.clone());
        RetryAction::Retry { record, agents }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempts.min(self.max_retry_iterations)
    }

    pub fn history(&self) -> &[RetryRecord] {
        &self.history
    }

    pub fn into_history(self) -> Vec<RetryRecord> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::GateResult;

    fn failed_gate(name: &str, strategy: RetryStrategy) -> GateResult {
        let mut result = GateResult::skipped(name, 85.0);
        result.retry_strategy = Some(strategy);
        result.issues = vec![format!("{name} fell short")];
        result
    }

    fn passed_gate(name: &str) -> GateResult {
        let mut result = GateResult::skipped(name, 85.0);
        result.passed = true;
        result.retry_strategy = None;
        result
    }

    fn default_map() -> BTreeMap<RetryStrategy, Vec<AgentKind>> {
        BTreeMap::from([
            (
                RetryStrategy::EnrichmentPass,
                vec![AgentKind::ContentBuilder],
            ),
            (RetryStrategy::SlideRework, vec![AgentKind::SlideOutliner]),
        ])
    }

    #[test]
    fn test_first_failed_gate_picks_the_strategy() {
        let mut controller = RetryController::new(3, default_map());
        let results = vec![
            passed_gate("components"),
            failed_gate("content_quality", RetryStrategy::EnrichmentPass),
            failed_gate("slide_format", RetryStrategy::SlideRework),
        ];

        match controller.next_action(&results) {
            RetryAction::Retry { record, agents } => {
                assert_eq!(record.attempt_number, 1);
                assert_eq!(record.failed_gate, "content_quality");
                assert_eq!(record.strategy, RetryStrategy::EnrichmentPass);
                assert_eq!(record.reason, "content_quality fell short");
                assert_eq!(agents, vec![AgentKind::ContentBuilder]);
            }
            RetryAction::Escalate { .. } => panic!("expected a retry"),
        }
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn test_escalates_after_budget_is_spent() {
        let mut controller = RetryController::new(3, default_map());
        let results = vec![failed_gate("slide_format", RetryStrategy::SlideRework)];

        for attempt in 1..=3 {
            match controller.next_action(&results) {
                RetryAction::Retry { record, .. } => {
                    assert_eq!(record.attempt_number, attempt);
                }
                RetryAction::Escalate { .. } => panic!("attempt {attempt} escalated early"),
            }
        }

        match controller.next_action(&results) {
            RetryAction::Escalate {
                failed_gate,
                attempts,
            } => {
                assert_eq!(failed_gate, "slide_format");
                assert_eq!(attempts, 3);
            }
            RetryAction::Retry { .. } => panic!("fourth failure must escalate"),
        }
        // Escalation adds no record: the history holds the three real retries.
        assert_eq!(controller.history().len(), 3);
        assert_eq!(controller.attempts_used(), 3);
    }

    #[test]
    fn test_aggregate_failure_falls_back_to_slide_rework() {
        let mut controller = RetryController::new(3, default_map());
        let results = vec![passed_gate("components"), passed_gate("slide_format")];

        match controller.next_action(&results) {
            RetryAction::Retry { record, agents } => {
                assert_eq!(record.failed_gate, "aggregate");
                assert_eq!(record.strategy, RetryStrategy::SlideRework);
                assert_eq!(agents, vec![AgentKind::SlideOutliner]);
            }
            RetryAction::Escalate { .. } => panic!("expected a retry"),
        }
    }

    #[test]
    fn test_missing_map_entry_uses_strategy_defaults() {
        let mut controller = RetryController::new(3, BTreeMap::new());
        let results = vec![failed_gate("timing_fit", RetryStrategy::TimingAdjust)];

        match controller.next_action(&results) {
            RetryAction::Retry { agents, .. } => {
                assert_eq!(agents, RetryStrategy::TimingAdjust.default_agents());
            }
            RetryAction::Escalate { .. } => panic!("expected a retry"),
        }
    }
}
