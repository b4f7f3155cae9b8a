//! Component validator.
//!
//! Checks that every deliverable the package needs actually exists in the
//! context, in the shape later stages expect. Feeds the binary components
//! gate and reports uncited handout sources as violations. Critical: a
//! malformed artifact aborts validation rather than scoring it.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;
use crate::quality::{Violation, ViolationKind};

/// Deliverables the lesson package requires, as (artifact key, producing agent).
const REQUIRED_COMPONENTS: [(&str, &str); 5] = [
    ("warmup", "warmup"),
    ("content", "content_builder"),
    ("examples", "example_writer"),
    ("handout", "handout_designer"),
    ("slides", "slide_outliner"),
];

pub struct ComponentValidatorAgent;

impl ComponentValidatorAgent {
    pub fn new() -> Self {
        Self
    }

    /// Shape checks for artifacts downstream stages index into. Returns an
    /// error message when the artifact exists but is unusable.
    fn shape_error(component: &str, artifact: &Value) -> Option<String> {
        match component {
            "content" => {
                let ok = artifact
                    .get("sections")
                    .map(|s| s.is_array())
                    .unwrap_or(false);
                (!ok).then(|| "content artifact has no sections array".to_string())
            }
            "slides" => {
                let ok = artifact
                    .get("slides")
                    .map(|s| s.is_array())
                    .unwrap_or(false);
                (!ok).then(|| "slides artifact has no slides array".to_string())
            }
            "examples" => {
                let ok = artifact.get("items").map(|i| i.is_array()).unwrap_or(false);
                (!ok).then(|| "examples artifact has no items array".to_string())
            }
            _ => None,
        }
    }
}

impl Default for ComponentValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ComponentValidatorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ComponentValidator
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let mut present = Vec::new();
        let mut missing = Vec::new();
        let mut issues = Vec::new();

        for (component, agent) in REQUIRED_COMPONENTS {
            match ctx.agent_output_value(agent, component) {
                Some(artifact) if !artifact.is_null() => {
                    if let Some(message) = Self::shape_error(component, artifact) {
                        return Err(AgentError::InvalidInput(message));
                    }
                    present.push(json!(component));
                }
                _ => {
                    missing.push(json!(component));
                    issues.push(json!(format!(
                        "missing {component}: agent {agent} produced no usable output"
                    )));
                }
            }
        }

        // Handout sources must carry citations; uncited ones are deducted
        // from the final score rather than failing this gate.
        let mut violations = Vec::new();
        if let Some(sources) = ctx
            .agent_output_value("handout_designer", "handout")
            .and_then(|h| h.get("sources"))
            .and_then(|s| s.as_array())
        {
            let uncited: Vec<&str> = sources
                .iter()
                .filter(|source| {
                    !source
                        .get("cited")
                        .and_then(|c| c.as_bool())
                        .unwrap_or(false)
                })
                .filter_map(|source| source.get("name").and_then(|n| n.as_str()))
                .collect();
            if !uncited.is_empty() {
                violations.push(serde_json::to_value(
                    Violation::new(ViolationKind::MissingCitation)
                        .with_count(uncited.len() as u32)
                        .with_detail(format!("uncited sources: {}", uncited.join(", "))),
                )?);
            }
        }

        let mut output = Map::new();
        output.insert(
            "required_components".to_string(),
            Value::Array(
                REQUIRED_COMPONENTS
                    .iter()
                    .map(|(component, _)| json!(component))
                    .collect(),
            ),
        );
        output.insert("present_components".to_string(), Value::Array(present));
        output.insert("missing_components".to_string(), Value::Array(missing));
        output.insert("issues".to_string(), Value::Array(issues));
        output.insert("violations".to_string(), Value::Array(violations));
        Ok(AgentOutput::from_map(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;

    fn healthy_artifact(component: &str) -> Value {
        match component {
            "content" => json!({ "sections": [] }),
            "slides" => json!({ "slides": [] }),
            "examples" => json!({ "items": [] }),
            "handout" => json!({
                "sources": [
                    { "name": "Class textbook", "cited": true },
                ]
            }),
            _ => json!({ "prompt": "Think back" }),
        }
    }

    fn full_context() -> LessonContext {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 1, "Magnetism"));
        for (component, agent) in REQUIRED_COMPONENTS {
            let mut out = Map::new();
            out.insert(component.to_string(), healthy_artifact(component));
            ctx.merge_agent_output(agent, out);
        }
        ctx
    }

    #[tokio::test]
    async fn test_all_components_present() {
        let ctx = full_context();
        let result = ComponentValidatorAgent::new().execute(&ctx).await.unwrap();

        assert_eq!(result.output["present_components"].as_array().unwrap().len(), 5);
        assert!(result.output["missing_components"].as_array().unwrap().is_empty());
        assert!(result.output["violations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_component_is_reported() {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 1, "Magnetism"));
        for (component, agent) in REQUIRED_COMPONENTS {
            if component == "slides" {
                continue;
            }
            let mut out = Map::new();
            out.insert(component.to_string(), healthy_artifact(component));
            ctx.merge_agent_output(agent, out);
        }

        let result = ComponentValidatorAgent::new().execute(&ctx).await.unwrap();
        let missing = result.output["missing_components"].as_array().unwrap();
        assert_eq!(missing, &vec![json!("slides")]);
        assert_eq!(result.output["present_components"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_malformed_content_aborts() {
        let mut ctx = full_context();
        let mut out = Map::new();
        out.insert("content".to_string(), json!({ "sections": "not an array" }));
        ctx.merge_agent_output("content_builder", out);

        let err = ComponentValidatorAgent::new().execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_uncited_sources_become_violations() {
        let mut ctx = full_context();
        let mut out = Map::new();
        out.insert(
            "handout".to_string(),
            json!({
                "sources": [
                    { "name": "Class textbook", "cited": true },
                    { "name": "Web article", "cited": false },
                    { "name": "Workbook", "cited": false },
                ]
            }),
        );
        ctx.merge_agent_output("handout_designer", out);

        let result = ComponentValidatorAgent::new().execute(&ctx).await.unwrap();
        let violations = result.output["violations"].as_array().unwrap();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0]["kind"], "missing_citation");
        assert_eq!(violations[0]["count"], 2);
    }
}
