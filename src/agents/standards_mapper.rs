//! Standards mapper agent.
//!
//! Aligns the unit plan with a curriculum framework chosen from the lesson
//! subject and emits the standard codes the handout cites. Runs after the
//! unit planner but is not critical: a lesson without standard codes is
//! still assemblable.

use async_trait::async_trait;
use serde_json::json;

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

pub struct StandardsMapperAgent;

impl StandardsMapperAgent {
    pub fn new() -> Self {
        Self
    }

    /// Picks a framework name and code prefix for the subject.
    fn framework_for(subject: &str) -> (&'static str, &'static str) {
        let lowered = subject.to_lowercase();
        if lowered.contains("science") {
            ("NGSS", "MS-PS")
        } else if lowered.contains("math") {
            ("CCSS-M", "8.EE")
        } else if lowered.contains("english") || lowered.contains("ela") {
            ("CCSS-ELA", "RI.8")
        } else if lowered.contains("history") || lowered.contains("social") {
            ("C3", "D2.His")
        } else {
            ("STATE", "GEN")
        }
    }
}

impl Default for StandardsMapperAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for StandardsMapperAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::StandardsMapper
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let plan = ctx
            .get("unit_planner_output")
            .ok_or_else(|| AgentError::missing_key("standards_mapper", "unit_planner_output"))?;
        let plan = plan
            .get("unit_plan")
            .ok_or_else(|| AgentError::missing_key("standards_mapper", "unit_plan"))?;

        let identity = &ctx.identity;
        let (framework, prefix) = Self::framework_for(&identity.subject);
        let codes = vec![
            format!("{prefix}-{}.{}", identity.unit_number, identity.day),
            format!("{prefix}-{}.{}", identity.unit_number, identity.day + 1),
        ];

        let vocabulary: Vec<String> = plan
            .get("vocabulary")
            .and_then(|v| v.as_array())
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let notes = if vocabulary.is_empty() {
            format!("Alignment based on the day's topic: {}", identity.topic)
        } else {
            format!(
                "Alignment emphasizes the terms {} from the unit plan",
                vocabulary.join(", ")
            )
        };

        let standards = json!({
            "framework": framework,
            "codes": codes,
            "notes": notes,
        });

        Ok(AgentOutput::new().with_entry("standards", standards))
    }
}
