//! Handout designer agent.
//!
//! Builds the student-facing handout from the drafted content and examples:
//! section summaries, practice prompts, and a cited source list. Missing
//! standards downgrade to a warning rather than a failure.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

pub struct HandoutDesignerAgent;

impl HandoutDesignerAgent {
    pub fn new() -> Self {
        Self
    }

    /// First sentence of a section body, used as the handout summary line.
    fn summary_of(body: &str) -> String {
        body.split_terminator(['.', '!', '?'])
            .next()
            .map(|s| format!("{}.", s.trim()))
            .unwrap_or_default()
    }
}

impl Default for HandoutDesignerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for HandoutDesignerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::HandoutDesigner
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let content = ctx
            .get("content_builder_output")
            .and_then(|v| v.get("content"))
            .cloned()
            .ok_or_else(|| {
                AgentError::missing_key("handout_designer", "content_builder_output")
            })?;
        let sections = content
            .get("sections")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AgentError::InvalidInput("content output has no sections array".to_string())
            })?;

        let identity = &ctx.identity;

        let handout_sections: Vec<Value> = sections
            .iter()
            .filter_map(|section| {
                let title = section.get("title")?.as_str()?;
                let body = section.get("body")?.as_str()?;
                Some(json!({
                    "heading": title,
                    "summary": Self::summary_of(body),
                }))
            })
            .collect();

        // Practice items reuse the worked-example prompts when present.
        let practice_items: Vec<Value> = ctx
            .agent_output_value("example_writer", "examples")
            .and_then(|examples| examples.get("items").cloned())
            .and_then(|items| items.as_array().cloned())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("prompt").cloned())
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![json!(format!(
                    "Write three sentences explaining {} to someone who missed class.",
                    identity.topic
                ))]
            });

        let mut sources = vec![json!({
            "name": format!("Class textbook, Unit {}", identity.unit_number),
            "cited": true,
        })];
        let mut output = AgentOutput::new();
        match ctx.agent_output_value("standards_mapper", "standards") {
            Some(standards) => {
                let framework = standards
                    .get("framework")
                    .and_then(|f| f.as_str())
                    .unwrap_or("STATE");
                if let Some(codes) = standards.get("codes").and_then(|c| c.as_array()) {
                    for code in codes.iter().filter_map(|c| c.as_str()) {
                        sources.push(json!({
                            "name": format!("{framework} standard {code}"),
                            "cited": true,
                        }));
                    }
                }
            }
            None => {
                output = output.with_warning(
                    "no standards available; handout cites the textbook only".to_string(),
                );
            }
        }

        let handout = json!({
            "title": format!(
                "Unit {} day {}: {}",
                identity.unit_number, identity.day, identity.topic
            ),
            "instructions": "Work top to bottom. Answer in full sentences and cite a source for each claim.",
            "sections": handout_sections,
            "practice_items": practice_items,
            "sources": sources,
        });

        Ok(output.with_entry("handout", handout))
    }
}
