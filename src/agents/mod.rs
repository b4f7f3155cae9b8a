//! Agents that produce and validate lesson package content.
//!
//! Each agent is a named unit of work: given the shared context it returns an
//! output map plus warnings, or an error. The orchestrator converts either
//! arm into a recorded outcome and is the only writer into the context.

pub mod error;

mod assembler;
mod component_validator;
mod content_builder;
mod content_depth_validator;
mod example_writer;
mod handout_designer;
mod slide_format_validator;
mod slide_outliner;
mod standards_mapper;
mod timing_validator;
mod unit_planner;
mod warmup;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::context::LessonContext;

pub use assembler::PackageAssemblerAgent;
pub use component_validator::ComponentValidatorAgent;
pub use content_builder::{ContentBuilderAgent, WORDS_PER_MINUTE};
pub use content_depth_validator::ContentDepthValidatorAgent;
pub use error::{AgentError, AgentResult};
pub use example_writer::ExampleWriterAgent;
pub use handout_designer::HandoutDesignerAgent;
pub use slide_format_validator::SlideFormatValidatorAgent;
pub use slide_outliner::{SlideOutlinerAgent, SLIDE_BODY_CHAR_LIMIT};
pub use standards_mapper::StandardsMapperAgent;
pub use timing_validator::TimingValidatorAgent;
pub use unit_planner::UnitPlannerAgent;
pub use warmup::WarmupAgent;

/// The agents known to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Builds the unit skeleton from the lesson identity.
    UnitPlanner,
    /// Tags the unit with standards codes.
    StandardsMapper,
    /// Writes the opening activity.
    Warmup,
    /// Writes the core lesson sections.
    ContentBuilder,
    /// Writes worked examples per section.
    ExampleWriter,
    /// Designs the student handout.
    HandoutDesigner,
    /// Outlines the slide blueprint.
    SlideOutliner,
    /// Scores content depth, tone, and connections.
    ContentDepthValidator,
    /// Checks that every required artifact is present.
    ComponentValidator,
    /// Checks word budget and section balance against the period length.
    TimingValidator,
    /// Checks slide structure and collects formatting violations.
    SlideFormatValidator,
    /// Merges all artifacts into the final package.
    PackageAssembler,
}

impl AgentKind {
    /// Returns the snake_case name used for context keys and reports.
    pub fn name(&self) -> &'static str {
        match self {
            AgentKind::UnitPlanner => "unit_planner",
            AgentKind::StandardsMapper => "standards_mapper",
            AgentKind::Warmup => "warmup",
            AgentKind::ContentBuilder => "content_builder",
            AgentKind::ExampleWriter => "example_writer",
            AgentKind::HandoutDesigner => "handout_designer",
            AgentKind::SlideOutliner => "slide_outliner",
            AgentKind::ContentDepthValidator => "content_depth_validator",
            AgentKind::ComponentValidator => "component_validator",
            AgentKind::TimingValidator => "timing_validator",
            AgentKind::SlideFormatValidator => "slide_format_validator",
            AgentKind::PackageAssembler => "package_assembler",
        }
    }

    /// Returns the display name for this agent.
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::UnitPlanner => "Unit Planner",
            AgentKind::StandardsMapper => "Standards Mapper",
            AgentKind::Warmup => "Warmup Writer",
            AgentKind::ContentBuilder => "Content Builder",
            AgentKind::ExampleWriter => "Example Writer",
            AgentKind::HandoutDesigner => "Handout Designer",
            AgentKind::SlideOutliner => "Slide Outliner",
            AgentKind::ContentDepthValidator => "Content Depth Validator",
            AgentKind::ComponentValidator => "Component Validator",
            AgentKind::TimingValidator => "Timing Validator",
            AgentKind::SlideFormatValidator => "Slide Format Validator",
            AgentKind::PackageAssembler => "Package Assembler",
        }
    }

    /// Returns the well-known key this agent writes its artifact under, if it
    /// produces one.
    pub fn artifact_key(&self) -> Option<&'static str> {
        match self {
            AgentKind::UnitPlanner => Some("unit_plan"),
            AgentKind::StandardsMapper => Some("standards"),
            AgentKind::Warmup => Some("warmup"),
            AgentKind::ContentBuilder => Some("content"),
            AgentKind::ExampleWriter => Some("examples"),
            AgentKind::HandoutDesigner => Some("handout"),
            AgentKind::SlideOutliner => Some("slides"),
            AgentKind::PackageAssembler => Some("lesson_package"),
            AgentKind::ContentDepthValidator
            | AgentKind::ComponentValidator
            | AgentKind::TimingValidator
            | AgentKind::SlideFormatValidator => None,
        }
    }

    /// Returns true if this agent is a validator.
    pub fn is_validator(&self) -> bool {
        matches!(
            self,
            AgentKind::ContentDepthValidator
                | AgentKind::ComponentValidator
                | AgentKind::TimingValidator
                | AgentKind::SlideFormatValidator
        )
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unit_planner" | "unit-planner" => Ok(AgentKind::UnitPlanner),
            "standards_mapper" | "standards-mapper" => Ok(AgentKind::StandardsMapper),
            "warmup" => Ok(AgentKind::Warmup),
            "content_builder" | "content-builder" => Ok(AgentKind::ContentBuilder),
            "example_writer" | "example-writer" => Ok(AgentKind::ExampleWriter),
            "handout_designer" | "handout-designer" => Ok(AgentKind::HandoutDesigner),
            "slide_outliner" | "slide-outliner" => Ok(AgentKind::SlideOutliner),
            "content_depth_validator" => Ok(AgentKind::ContentDepthValidator),
            "component_validator" => Ok(AgentKind::ComponentValidator),
            "timing_validator" => Ok(AgentKind::TimingValidator),
            "slide_format_validator" => Ok(AgentKind::SlideFormatValidator),
            "package_assembler" | "assembler" => Ok(AgentKind::PackageAssembler),
            other => Err(format!("Unknown agent: {}", other)),
        }
    }
}

/// Successful result of one agent execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentOutput {
    /// Key/value payload merged into the shared context.
    pub output: Map<String, Value>,
    /// Non-fatal notes surfaced to the run history.
    pub warnings: Vec<String>,
}

impl AgentOutput {
    /// Creates an empty output.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an output from an existing map.
    pub fn from_map(output: Map<String, Value>) -> Self {
        Self {
            output,
            warnings: Vec::new(),
        }
    }

    /// Builder method to add one output entry.
    pub fn with_entry(mut self, key: impl Into<String>, value: Value) -> Self {
        self.output.insert(key.into(), value);
        self
    }

    /// Builder method to add a warning.
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Recorded result of one agent invocation, success or failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutcome {
    /// Name of the agent that ran.
    pub agent_name: String,
    /// Whether execution succeeded.
    pub succeeded: bool,
    /// Output map, empty on failure.
    pub output: Map<String, Value>,
    /// Error messages, empty on success.
    pub errors: Vec<String>,
    /// Warnings from the agent.
    pub warnings: Vec<String>,
    /// Execution duration in milliseconds.
    pub duration_ms: u64,
    /// When the invocation finished.
    pub finished_at: DateTime<Utc>,
}

impl AgentOutcome {
    /// Builds an outcome from an agent's execution result.
    ///
    /// Errors never propagate past this boundary; a failed execution becomes
    /// `succeeded = false` with the message in `errors`.
    pub fn from_result(kind: AgentKind, result: AgentResult<AgentOutput>, duration_ms: u64) -> Self {
        match result {
            Ok(output) => Self {
                agent_name: kind.name().to_string(),
                succeeded: true,
                output: output.output,
                errors: Vec::new(),
                warnings: output.warnings,
                duration_ms,
                finished_at: Utc::now(),
            },
            Err(err) => Self {
                agent_name: kind.name().to_string(),
                succeeded: false,
                output: Map::new(),
                errors: vec![err.to_string()],
                warnings: Vec::new(),
                duration_ms,
                finished_at: Utc::now(),
            },
        }
    }

    /// Returns true if the agent completed successfully.
    pub fn is_success(&self) -> bool {
        self.succeeded
    }
}

/// Trait implemented by every pipeline agent.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent's kind.
    fn kind(&self) -> AgentKind;

    /// Executes the agent against the shared context.
    ///
    /// Agents read from the context and return their output; they never
    /// write into the context themselves.
    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput>;
}

/// Creates the production implementation for the given agent kind.
pub fn create_agent(kind: AgentKind) -> Box<dyn Agent> {
    match kind {
        AgentKind::UnitPlanner => Box::new(UnitPlannerAgent::new()),
        AgentKind::StandardsMapper => Box::new(StandardsMapperAgent::new()),
        AgentKind::Warmup => Box::new(WarmupAgent::new()),
        AgentKind::ContentBuilder => Box::new(ContentBuilderAgent::new()),
        AgentKind::ExampleWriter => Box::new(ExampleWriterAgent::new()),
        AgentKind::HandoutDesigner => Box::new(HandoutDesignerAgent::new()),
        AgentKind::SlideOutliner => Box::new(SlideOutlinerAgent::new()),
        AgentKind::ContentDepthValidator => Box::new(ContentDepthValidatorAgent::new()),
        AgentKind::ComponentValidator => Box::new(ComponentValidatorAgent::new()),
        AgentKind::TimingValidator => Box::new(TimingValidatorAgent::new()),
        AgentKind::SlideFormatValidator => Box::new(SlideFormatValidatorAgent::new()),
        AgentKind::PackageAssembler => Box::new(PackageAssemblerAgent::new()),
    }
}

/// Factory seam for agent creation, so tests can substitute scripted agents.
pub trait AgentFactory: Send + Sync {
    /// Creates an agent for the given kind.
    fn create(&self, kind: AgentKind) -> Box<dyn Agent>;
}

/// Default factory producing the built-in agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAgentFactory;

impl AgentFactory for DefaultAgentFactory {
    fn create(&self, kind: AgentKind) -> Box<dyn Agent> {
        create_agent(kind)
    }
}
