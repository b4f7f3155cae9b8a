//! Pipeline configuration.
//!
//! Holds everything a run needs decided up front: retry policy, status
//! thresholds, the quality gates, the per-phase agent rosters, and the
//! mapping from retry strategies to the agents they re-run. Ships with a
//! working default and can be overridden from the environment or a YAML
//! file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use super::phase::Phase;
use crate::agents::AgentKind;
use crate::quality::{
    GateSpec, RetryStrategy, DEFAULT_PASS_THRESHOLD, DEFAULT_REVISION_THRESHOLD,
};

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One agent's slot in a phase roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// The agent to run.
    pub kind: AgentKind,
    /// Whether a failure of this agent aborts the whole run.
    #[serde(default)]
    pub critical: bool,
}

impl AgentSpec {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            critical: false,
        }
    }

    pub fn critical(kind: AgentKind) -> Self {
        Self {
            kind,
            critical: true,
        }
    }
}

/// The agents of one phase, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseRoster {
    pub phase: Phase,
    pub agents: Vec<AgentSpec>,
}

impl PhaseRoster {
    pub fn new(phase: Phase, agents: Vec<AgentSpec>) -> Self {
        Self { phase, agents }
    }

    /// Returns true if `kind` appears in this roster.
    pub fn contains(&self, kind: AgentKind) -> bool {
        self.agents.iter().any(|agent| agent.kind == kind)
    }

    /// Whether `kind` is marked critical in this roster.
    pub fn is_critical(&self, kind: AgentKind) -> bool {
        self.agents
            .iter()
            .any(|agent| agent.kind == kind && agent.critical)
    }
}

/// Configuration for the pipeline runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum validation retry iterations before escalating.
    #[serde(default = "default_max_retry_iterations")]
    pub max_retry_iterations: u32,
    /// When set, skip assembly and report what would have been packaged.
    #[serde(default)]
    pub dry_run: bool,
    /// Final score at or above this passes outright.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    /// Final score at or above this (but below pass) needs revision.
    #[serde(default = "default_revision_threshold")]
    pub revision_threshold: f64,
    /// Quality gates evaluated during validation, in order.
    #[serde(default = "default_gates")]
    pub gates: Vec<GateSpec>,
    /// Agent rosters per phase, in phase order.
    #[serde(default = "default_phases")]
    pub phases: Vec<PhaseRoster>,
    /// Agents re-run for each retry strategy. Strategies absent here fall
    /// back to the strategy's built-in agent set.
    #[serde(default = "default_retry_map")]
    pub retry_map: BTreeMap<RetryStrategy, Vec<AgentKind>>,
}

fn default_max_retry_iterations() -> u32 {
    3
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

fn default_revision_threshold() -> f64 {
    DEFAULT_REVISION_THRESHOLD
}

fn default_gates() -> Vec<GateSpec> {
    vec![
        GateSpec::weighted(
            "content_quality",
            AgentKind::ContentDepthValidator,
            BTreeMap::from([
                ("depth".to_string(), 0.30),
                ("examples".to_string(), 0.20),
                ("procedure".to_string(), 0.20),
                ("tone".to_string(), 0.15),
                ("connections".to_string(), 0.15),
            ]),
            85.0,
            0.40,
            RetryStrategy::EnrichmentPass,
        ),
        GateSpec::binary(
            "components",
            AgentKind::ComponentValidator,
            vec![
                "warmup".to_string(),
                "content".to_string(),
                "examples".to_string(),
                "handout".to_string(),
                "slides".to_string(),
            ],
            0.25,
            RetryStrategy::ComponentRegen,
        ),
        GateSpec::weighted(
            "timing_fit",
            AgentKind::TimingValidator,
            BTreeMap::from([
                ("word_budget_fit".to_string(), 0.70),
                ("section_balance".to_string(), 0.30),
            ]),
            80.0,
            0.15,
            RetryStrategy::TimingAdjust,
        ),
        GateSpec::weighted(
            "slide_format",
            AgentKind::SlideFormatValidator,
            BTreeMap::from([
                ("structure".to_string(), 0.60),
                ("sequencing".to_string(), 0.40),
            ]),
            80.0,
            0.20,
            RetryStrategy::SlideRework,
        ),
    ]
}

fn default_phases() -> Vec<PhaseRoster> {
    vec![
        PhaseRoster::new(
            Phase::UnitPlanning,
            vec![
                AgentSpec::critical(AgentKind::UnitPlanner),
                AgentSpec::new(AgentKind::StandardsMapper),
            ],
        ),
        PhaseRoster::new(
            Phase::DailyGeneration,
            vec![
                AgentSpec::new(AgentKind::Warmup),
                AgentSpec::critical(AgentKind::ContentBuilder),
                AgentSpec::new(AgentKind::ExampleWriter),
                AgentSpec::new(AgentKind::HandoutDesigner),
                AgentSpec::new(AgentKind::SlideOutliner),
            ],
        ),
        PhaseRoster::new(
            Phase::Validation,
            vec![
                AgentSpec::new(AgentKind::ContentDepthValidator),
                AgentSpec::critical(AgentKind::ComponentValidator),
                AgentSpec::new(AgentKind::TimingValidator),
                AgentSpec::new(AgentKind::SlideFormatValidator),
            ],
        ),
        PhaseRoster::new(
            Phase::Assembly,
            vec![AgentSpec::critical(AgentKind::PackageAssembler)],
        ),
    ]
}

fn default_retry_map() -> BTreeMap<RetryStrategy, Vec<AgentKind>> {
    BTreeMap::from([
        (
            RetryStrategy::EnrichmentPass,
            vec![AgentKind::ContentBuilder],
        ),
        (
            RetryStrategy::ComponentRegen,
            vec![
                AgentKind::Warmup,
                AgentKind::ContentBuilder,
                AgentKind::ExampleWriter,
                AgentKind::HandoutDesigner,
                AgentKind::SlideOutliner,
            ],
        ),
        (
            RetryStrategy::TimingAdjust,
            vec![AgentKind::ContentBuilder, AgentKind::Warmup],
        ),
        (RetryStrategy::SlideRework, vec![AgentKind::SlideOutliner]),
    ])
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retry_iterations: default_max_retry_iterations(),
            dry_run: false,
            pass_threshold: default_pass_threshold(),
            revision_threshold: default_revision_threshold(),
            gates: default_gates(),
            phases: default_phases(),
            retry_map: default_retry_map(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LESSONFORGE_MAX_RETRIES`: Retry iterations before escalating (default: 3)
    /// - `LESSONFORGE_DRY_RUN`: Skip assembly and file output (default: false)
    /// - `LESSONFORGE_PASS_THRESHOLD`: Final score needed to pass (default: 90.0)
    /// - `LESSONFORGE_REVISION_THRESHOLD`: Floor of the needs-revision band (default: 80.0)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value or the
    /// resulting configuration fails validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("LESSONFORGE_MAX_RETRIES") {
            config.max_retry_iterations = parse_env_value(&val, "LESSONFORGE_MAX_RETRIES")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_DRY_RUN") {
            config.dry_run = parse_env_bool(&val, "LESSONFORGE_DRY_RUN")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_PASS_THRESHOLD") {
            config.pass_threshold = parse_env_value(&val, "LESSONFORGE_PASS_THRESHOLD")?;
        }

        if let Ok(val) = std::env::var("LESSONFORGE_REVISION_THRESHOLD") {
            config.revision_threshold = parse_env_value(&val, "LESSONFORGE_REVISION_THRESHOLD")?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file. Fields absent from the file
    /// keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed, or the
    /// resulting configuration fails validation.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retry_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_retry_iterations must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.pass_threshold) {
            return Err(ConfigError::ValidationFailed(
                "pass_threshold must be between 0 and 100".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.revision_threshold) {
            return Err(ConfigError::ValidationFailed(
                "revision_threshold must be between 0 and 100".to_string(),
            ));
        }

        if self.pass_threshold <= self.revision_threshold {
            return Err(ConfigError::ValidationFailed(
                "pass_threshold must exceed revision_threshold".to_string(),
            ));
        }

        let expected: Vec<Phase> = Phase::all().to_vec();
        let actual: Vec<Phase> = self.phases.iter().map(|roster| roster.phase).collect();
        if actual != expected {
            return Err(ConfigError::ValidationFailed(
                "phases must list unit_planning, daily_generation, validation, assembly in order"
                    .to_string(),
            ));
        }

        for roster in &self.phases {
            if roster.agents.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "phase {} has an empty roster",
                    roster.phase.name()
                )));
            }
        }

        if self.gates.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "at least one quality gate is required".to_string(),
            ));
        }

        let validation_roster = self
            .roster(Phase::Validation)
            .ok_or_else(|| ConfigError::ValidationFailed("validation roster missing".to_string()))?;
        let generation_roster = self.roster(Phase::DailyGeneration).ok_or_else(|| {
            ConfigError::ValidationFailed("daily_generation roster missing".to_string())
        })?;

        for gate in &self.gates {
            if !(0.0..=100.0).contains(&gate.threshold) {
                return Err(ConfigError::ValidationFailed(format!(
                    "gate {}: threshold must be between 0 and 100",
                    gate.name
                )));
            }
            if gate.weight <= 0.0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "gate {}: weight must be greater than 0",
                    gate.name
                )));
            }
            if !validation_roster.contains(gate.agent) {
                return Err(ConfigError::ValidationFailed(format!(
                    "gate {}: agent {} is not in the validation roster",
                    gate.name, gate.agent
                )));
            }
            match &gate.kind {
                crate::quality::GateKind::Weighted { weights } => {
                    if weights.is_empty() {
                        return Err(ConfigError::ValidationFailed(format!(
                            "gate {}: weighted gate has no category weights",
                            gate.name
                        )));
                    }
                    if weights.values().any(|w| *w <= 0.0) {
                        return Err(ConfigError::ValidationFailed(format!(
                            "gate {}: category weights must be greater than 0",
                            gate.name
                        )));
                    }
                    let sum: f64 = weights.values().sum();
                    if (sum - 1.0).abs() > 1e-6 {
                        return Err(ConfigError::ValidationFailed(format!(
                            "gate {}: category weights sum to {sum}, expected 1.0",
                            gate.name
                        )));
                    }
                }
                crate::quality::GateKind::Binary { required } => {
                    if required.is_empty() {
                        return Err(ConfigError::ValidationFailed(format!(
                            "gate {}: binary gate has no required elements",
                            gate.name
                        )));
                    }
                }
            }
        }

        for (strategy, agents) in &self.retry_map {
            if agents.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "retry strategy {strategy} maps to no agents"
                )));
            }
            for agent in agents {
                if !generation_roster.contains(*agent) {
                    return Err(ConfigError::ValidationFailed(format!(
                        "retry strategy {strategy}: agent {agent} is not in the daily_generation roster"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Builder method to set the retry ceiling.
    pub fn with_max_retry_iterations(mut self, max: u32) -> Self {
        self.max_retry_iterations = max;
        self
    }

    /// Builder method to enable or disable dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Builder method to set the pass threshold.
    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    /// Builder method to set the revision threshold.
    pub fn with_revision_threshold(mut self, threshold: f64) -> Self {
        self.revision_threshold = threshold;
        self
    }

    /// Builder method to replace the gate list.
    pub fn with_gates(mut self, gates: Vec<GateSpec>) -> Self {
        self.gates = gates;
        self
    }

    /// Builder method to replace the phase rosters.
    pub fn with_phases(mut self, phases: Vec<PhaseRoster>) -> Self {
        self.phases = phases;
        self
    }

    /// Builder method to replace the retry map.
    pub fn with_retry_map(mut self, retry_map: BTreeMap<RetryStrategy, Vec<AgentKind>>) -> Self {
        self.retry_map = retry_map;
        self
    }

    /// The roster configured for `phase`, if any.
    pub fn roster(&self, phase: Phase) -> Option<&PhaseRoster> {
        self.phases.iter().find(|roster| roster.phase == phase)
    }

    /// Gate weights keyed by gate name, for cross-gate aggregation.
    pub fn gate_weights(&self) -> BTreeMap<String, f64> {
        self.gates
            .iter()
            .map(|gate| (gate.name.clone(), gate.weight))
            .collect()
    }

    /// Agents to re-run for `strategy`, falling back to the strategy's
    /// built-in set when the map has no entry.
    pub fn agents_for(&self, strategy: RetryStrategy) -> Vec<AgentKind> {
        self.retry_map
            .get(&strategy)
            .cloned()
            .unwrap_or_else(|| strategy.default_agents())
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
