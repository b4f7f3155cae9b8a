//! Example writer agent.
//!
//! Attaches one worked example to every concept section the content builder
//! produced. Examples feed both the handout practice items and the
//! content-depth gate's coverage check.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

pub struct ExampleWriterAgent;

impl ExampleWriterAgent {
    pub fn new() -> Self {
        Self
    }

    /// Strips the "Core concept: " prefix so prompts read naturally.
    fn term_from_title(title: &str) -> &str {
        title.rsplit(':').next().unwrap_or(title).trim()
    }

    fn example_for(topic: &str, title: &str, index: usize) -> Value {
        let term = Self::term_from_title(title);
        json!({
            "section": title,
            "prompt": format!(
                "Example {}: a classmate claims {term} has nothing to do with {topic}. \
                 Use today's notes to respond.",
                index + 1
            ),
            "walkthrough": format!(
                "Start by restating what {term} means in this unit. Then point to one \
                 observation from class that only makes sense if {term} is involved. \
                 Finally, state the connection to {topic} in a single sentence."
            ),
            "answer": format!(
                "{term} is part of how {topic} works, so the claim does not hold."
            ),
        })
    }
}

impl Default for ExampleWriterAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ExampleWriterAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ExampleWriter
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let content = ctx
            .get("content_builder_output")
            .and_then(|v| v.get("content"))
            .cloned()
            .ok_or_else(|| AgentError::missing_key("example_writer", "content_builder_output"))?;

        let sections = content
            .get("sections")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AgentError::InvalidInput("content output has no sections array".to_string())
            })?;

        let topic = ctx.identity.topic.clone();
        let items: Vec<Value> = sections
            .iter()
            .filter(|section| section.get("kind").and_then(|k| k.as_str()) == Some("concept"))
            .enumerate()
            .filter_map(|(index, section)| {
                let title = section.get("title")?.as_str()?;
                Some(Self::example_for(&topic, title, index))
            })
            .collect();

        let mut output = AgentOutput::new();
        if items.is_empty() {
            output = output.with_warning(
                "content had no concept sections; examples artifact is empty".to_string(),
            );
        }
        let count = items.len();
        Ok(output.with_entry(
            "examples",
            json!({ "items": items, "count": count }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;
    use serde_json::Map;

    fn context_with_content() -> LessonContext {
        let mut ctx = LessonContext::new(LessonIdentity::new(2, 1, "Photosynthesis"));
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!({
                "sections": [
                    { "title": "Opening: Photosynthesis", "kind": "intro", "body": "x" },
                    { "title": "Core concept: chlorophyll", "kind": "concept", "body": "x" },
                    { "title": "Core concept: glucose", "kind": "concept", "body": "x" },
                    { "title": "Guided practice", "kind": "practice", "body": "x" },
                ]
            }),
        );
        ctx.merge_agent_output("content_builder", content);
        ctx
    }

    #[tokio::test]
    async fn test_one_example_per_concept_section() {
        let ctx = context_with_content();
        let result = ExampleWriterAgent::new().execute(&ctx).await.unwrap();
        let examples = result.output.get("examples").unwrap();

        assert_eq!(examples["count"], 2);
        let items = examples["items"].as_array().unwrap();
        assert!(items[0]["prompt"]
            .as_str()
            .unwrap()
            .contains("chlorophyll"));
        assert_eq!(items[1]["section"], "Core concept: glucose");
    }

    #[tokio::test]
    async fn test_requires_content() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "Photosynthesis"));
        let err = ExampleWriterAgent::new().execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingContextKey { .. }));
    }

    #[test]
    fn test_term_from_title_strips_prefix() {
        assert_eq!(
            ExampleWriterAgent::term_from_title("Core concept: osmosis"),
            "osmosis"
        );
        assert_eq!(ExampleWriterAgent::term_from_title("Guided practice"), "Guided practice");
    }
}
