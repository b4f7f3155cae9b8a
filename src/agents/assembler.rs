//! Package assembler agent.
//!
//! Final pipeline stage: gathers every artifact the generation agents
//! produced into one lesson package. Runs only after validation has passed,
//! so a missing required artifact here is a hard error.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

/// Artifacts the package cannot ship without, as (agent, artifact key).
const REQUIRED_ARTIFACTS: [(&str, &str); 6] = [
    ("unit_planner", "unit_plan"),
    ("warmup", "warmup"),
    ("content_builder", "content"),
    ("example_writer", "examples"),
    ("handout_designer", "handout"),
    ("slide_outliner", "slides"),
];

pub struct PackageAssemblerAgent;

impl PackageAssemblerAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PackageAssemblerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for PackageAssemblerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::PackageAssembler
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let identity = &ctx.identity;

        let mut artifacts = Map::new();
        for (agent, key) in REQUIRED_ARTIFACTS {
            let artifact = ctx
                .agent_output_value(agent, key)
                .cloned()
                .ok_or_else(|| AgentError::missing_key("package_assembler", key))?;
            artifacts.insert(key.to_string(), artifact);
        }

        let mut output = AgentOutput::new();
        match ctx.agent_output_value("standards_mapper", "standards") {
            Some(standards) => {
                artifacts.insert("standards".to_string(), standards.clone());
            }
            None => {
                output = output
                    .with_warning("packaging without standards alignment".to_string());
            }
        }

        let package = json!({
            "package_id": Uuid::new_v4().to_string(),
            "assembled_at": Utc::now(),
            "identity": serde_json::to_value(identity)?,
            "file_stem": format!(
                "unit{:02}_day{:02}",
                identity.unit_number, identity.day
            ),
            "artifacts": Value::Object(artifacts),
        });

        Ok(output.with_entry("lesson_package", package))
    }
}
