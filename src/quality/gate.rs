//! Gate data model: specs, results, and retry strategy tags.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::agents::AgentKind;

/// Strategy tag a failed gate attaches to name its regeneration path.
///
/// Each tag maps to a small, configurable set of generation agents to re-run
/// before validation is attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Deepen thin content by re-running the content builder.
    EnrichmentPass,
    /// Regenerate all lesson components to restore missing artifacts.
    ComponentRegen,
    /// Resize duration-sensitive content to fit the period.
    TimingAdjust,
    /// Rebuild the slide blueprint.
    SlideRework,
}

impl RetryStrategy {
    /// Returns the wire tag for this strategy.
    pub fn tag(&self) -> &'static str {
        match self {
            RetryStrategy::EnrichmentPass => "enrichment_pass",
            RetryStrategy::ComponentRegen => "component_regen",
            RetryStrategy::TimingAdjust => "timing_adjust",
            RetryStrategy::SlideRework => "slide_rework",
        }
    }

    /// Returns the built-in agent set for this strategy.
    ///
    /// Used as a fallback when the configured retry map has no entry.
    pub fn default_agents(&self) -> Vec<AgentKind> {
        match self {
            RetryStrategy::EnrichmentPass => vec![AgentKind::ContentBuilder],
            RetryStrategy::ComponentRegen => vec![
                AgentKind::Warmup,
                AgentKind::ContentBuilder,
                AgentKind::ExampleWriter,
                AgentKind::HandoutDesigner,
                AgentKind::SlideOutliner,
            ],
            RetryStrategy::TimingAdjust => {
                vec![AgentKind::ContentBuilder, AgentKind::Warmup]
            }
            RetryStrategy::SlideRework => vec![AgentKind::SlideOutliner],
        }
    }

    /// Returns every strategy tag.
    pub fn all() -> Vec<RetryStrategy> {
        vec![
            RetryStrategy::EnrichmentPass,
            RetryStrategy::ComponentRegen,
            RetryStrategy::TimingAdjust,
            RetryStrategy::SlideRework,
        ]
    }
}

impl std::fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl std::str::FromStr for RetryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "enrichment_pass" | "enrichment" => Ok(RetryStrategy::EnrichmentPass),
            "component_regen" | "components" => Ok(RetryStrategy::ComponentRegen),
            "timing_adjust" | "timing" => Ok(RetryStrategy::TimingAdjust),
            "slide_rework" | "slides" => Ok(RetryStrategy::SlideRework),
            other => Err(format!("Unknown retry strategy: {}", other)),
        }
    }
}

/// How a gate derives its score from a validator's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GateKind {
    /// Weighted combination of category scores; weights sum to 1.0.
    Weighted {
        /// Category name to weight.
        weights: BTreeMap<String, f64>,
    },
    /// All required elements must be present; the score is the percentage found.
    Binary {
        /// Element names that must all be present.
        required: Vec<String>,
    },
}

/// Declarative description of one quality gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSpec {
    /// Gate name, unique within a configuration.
    pub name: String,
    /// Validator agent whose output feeds this gate.
    pub agent: AgentKind,
    /// Scoring mode.
    pub kind: GateKind,
    /// Pass threshold on the 0-100 scale.
    pub threshold: f64,
    /// Relative weight in the cross-gate aggregate.
    pub weight: f64,
    /// Strategy tag attached when the gate fails.
    pub retry_strategy: RetryStrategy,
}

impl GateSpec {
    /// Creates a weighted gate spec.
    pub fn weighted(
        name: impl Into<String>,
        agent: AgentKind,
        weights: BTreeMap<String, f64>,
        threshold: f64,
        weight: f64,
        retry_strategy: RetryStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            agent,
            kind: GateKind::Weighted { weights },
            threshold,
            weight,
            retry_strategy,
        }
    }

    /// Creates a binary presence gate spec.
    pub fn binary(
        name: impl Into<String>,
        agent: AgentKind,
        required: Vec<String>,
        weight: f64,
        retry_strategy: RetryStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            agent,
            kind: GateKind::Binary { required },
            threshold: 100.0,
            weight,
            retry_strategy,
        }
    }

    /// Returns true if this gate uses binary presence scoring.
    pub fn is_binary(&self) -> bool {
        matches!(self.kind, GateKind::Binary { .. })
    }
}

/// Outcome of evaluating one gate against a validator's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateResult {
    /// Name of the evaluated gate.
    pub gate_name: String,
    /// Score on the 0-100 scale, or None when the gate produced no score.
    pub raw_score: Option<f64>,
    /// Whether the gate passed.
    pub passed: bool,
    /// Per-category scores that fed the gate.
    pub category_scores: BTreeMap<String, f64>,
    /// Human-readable issues found during evaluation.
    pub issues: Vec<String>,
    /// Threshold the score was compared against.
    pub threshold: f64,
    /// Strategy tag, present only when the gate failed.
    pub retry_strategy: Option<RetryStrategy>,
}

impl GateResult {
    /// Creates a result for a gate whose validator produced no usable output.
    ///
    /// Such a gate carries no score, cannot pass, and is skipped during
    /// cross-gate weighting.
    pub fn skipped(gate_name: impl Into<String>, threshold: f64) -> Self {
        Self {
            gate_name: gate_name.into(),
            raw_score: None,
            passed: false,
            category_scores: BTreeMap::new(),
            issues: vec!["validator produced no output".to_string()],
            threshold,
            retry_strategy: None,
        }
    }

    /// Returns true if this gate passed.
    pub fn is_pass(&self) -> bool {
        self.passed
    }
}
