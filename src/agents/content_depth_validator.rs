//! Content depth validator.
//!
//! Scores the drafted content for the content-quality gate: explanation
//! depth, worked-example coverage, procedural steps, tone, and connections
//! to prior learning. Also flags placeholder text left in section bodies.

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;
use crate::quality::{Violation, ViolationKind};

/// Phrases that signal an explanation goes beyond restating a definition.
const DEPTH_MARKER_PATTERN: &str =
    r"(?i)\b(because|for instance|therefore|which means|so that)\b";

/// Phrases that tie the day's material back to earlier work.
const CONNECTION_PATTERN: &str =
    r"(?i)\b(builds on|connects to|recall|previously|last (class|unit|lesson))\b";

/// Unrendered template braces or drafting markers left in the prose.
const PLACEHOLDER_PATTERN: &str = r"\{\{.*?\}\}|\bTBD\b|\bTODO\b";

/// Numbered procedure steps at the start of a line.
const STEP_PATTERN: &str = r"(?m)^\s*\d+\.";

/// Depth markers expected per section for full credit.
const MARKERS_PER_SECTION: f64 = 2.0;

/// Numbered steps expected for full procedure credit.
const EXPECTED_STEPS: f64 = 3.0;

/// Prior-learning references expected for full credit.
const EXPECTED_CONNECTIONS: f64 = 2.0;

/// Readable average sentence length, in words.
const TONE_RANGE: std::ops::RangeInclusive<f64> = 8.0..=26.0;

/// Categories scoring below this produce an issue string.
const ISSUE_FLOOR: f64 = 70.0;

pub struct ContentDepthValidatorAgent {
    depth_markers: Regex,
    connection_markers: Regex,
    placeholders: Regex,
    steps: Regex,
}

impl ContentDepthValidatorAgent {
    pub fn new() -> Self {
        Self {
            depth_markers: Regex::new(DEPTH_MARKER_PATTERN)
                .expect("Invalid regex for depth markers"),
            connection_markers: Regex::new(CONNECTION_PATTERN)
                .expect("Invalid regex for connections"),
            placeholders: Regex::new(PLACEHOLDER_PATTERN)
                .expect("Invalid regex for placeholders"),
            steps: Regex::new(STEP_PATTERN).expect("Invalid regex for numbered steps"),
        }
    }

    fn tone_score(bodies: &[&str]) -> f64 {
        let mut sentence_lengths = Vec::new();
        for body in bodies {
            for sentence in body.split_terminator(['.', '!', '?']) {
                let words = sentence.split_whitespace().count();
                // Fragments like list numerals are not sentences.
                if words >= 3 {
                    sentence_lengths.push(words as f64);
                }
            }
        }
        if sentence_lengths.is_empty() {
            return 0.0;
        }
        let avg = sentence_lengths.iter().sum::<f64>() / sentence_lengths.len() as f64;
        if TONE_RANGE.contains(&avg) {
            100.0
        } else if avg < *TONE_RANGE.start() {
            (avg / TONE_RANGE.start() * 100.0).clamp(0.0, 100.0)
        } else {
            (TONE_RANGE.end() / avg * 100.0).clamp(0.0, 100.0)
        }
    }
}

impl Default for ContentDepthValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ContentDepthValidatorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ContentDepthValidator
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let content = ctx
            .get("content_builder_output")
            .and_then(|v| v.get("content"))
            .cloned()
            .ok_or_else(|| {
                AgentError::missing_key("content_depth_validator", "content_builder_output")
            })?;
        let sections = content
            .get("sections")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AgentError::InvalidInput("content output has no sections array".to_string())
            })?;

        let bodies: Vec<&str> = sections
            .iter()
            .filter_map(|s| s.get("body").and_then(|b| b.as_str()))
            .collect();
        let all_text = bodies.join("\n");

        // Depth blends word-budget attainment with explanation markers.
        let word_count = content
            .get("word_count")
            .and_then(|v| v.as_f64())
            .unwrap_or_else(|| all_text.split_whitespace().count() as f64);
        let target = content
            .get("target_word_count")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0)
            .max(1.0);
        let length_score = (word_count / target * 100.0).clamp(0.0, 100.0);
        let marker_count = self.depth_markers.find_iter(&all_text).count() as f64;
        let marker_target = (sections.len() as f64 * MARKERS_PER_SECTION).max(1.0);
        let marker_score = (marker_count / marker_target * 100.0).min(100.0);
        let depth = 0.6 * length_score + 0.4 * marker_score;

        let concept_count = sections
            .iter()
            .filter(|s| s.get("kind").and_then(|k| k.as_str()) == Some("concept"))
            .count()
            .max(1) as f64;
        let example_count = ctx
            .agent_output_value("example_writer", "examples")
            .and_then(|e| e.get("count"))
            .and_then(|c| c.as_f64())
            .unwrap_or(0.0);
        let examples = (example_count / concept_count * 100.0).min(100.0);

        let step_count = self.steps.find_iter(&all_text).count() as f64;
        let procedure = (step_count / EXPECTED_STEPS * 100.0).min(100.0);

        let tone = Self::tone_score(&bodies);

        let connection_count = self.connection_markers.find_iter(&all_text).count() as f64;
        let connections = (connection_count / EXPECTED_CONNECTIONS * 100.0).min(100.0);

        let mut issues = Vec::new();
        let categories = [
            ("depth", depth, "explanations stay at surface level"),
            ("examples", examples, "concept sections lack worked examples"),
            ("procedure", procedure, "guided practice has too few numbered steps"),
            ("tone", tone, "sentence length sits outside the readable range"),
            ("connections", connections, "content does not reference prior learning"),
        ];
        for (name, score, message) in categories {
            if score < ISSUE_FLOOR {
                issues.push(json!(format!("{name}: {message} ({score:.0})")));
            }
        }

        let mut violations = Vec::new();
        let placeholder_count = self.placeholders.find_iter(&all_text).count();
        if placeholder_count > 0 {
            let first = self
                .placeholders
                .find(&all_text)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            violations.push(serde_json::to_value(
                Violation::new(ViolationKind::PlaceholderText)
                    .with_count(placeholder_count as u32)
                    .with_detail(format!("found '{first}' in section body")),
            )?);
        }

        let mut output = Map::new();
        output.insert(
            "category_scores".to_string(),
            json!({
                "depth": depth,
                "examples": examples,
                "procedure": procedure,
                "tone": tone,
                "connections": connections,
            }),
        );
        output.insert("issues".to_string(), Value::Array(issues));
        output.insert("violations".to_string(), Value::Array(violations));
        Ok(AgentOutput::from_map(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;

    fn context_with_body(body: &str, word_count: u64, target: u64) -> LessonContext {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 1, "Erosion"));
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!({
                "sections": [
                    { "title": "Core concept: erosion", "kind": "concept", "body": body },
                ],
                "word_count": word_count,
                "target_word_count": target,
            }),
        );
        ctx.merge_agent_output("content_builder", content);
        ctx
    }

    #[tokio::test]
    async fn test_rich_content_scores_high() {
        let body = "Erosion matters because water reshapes the land over time. \
            For instance, a riverbank loses soil every spring, which means the channel widens. \
            This builds on last class, so recall what we said previously about weathering.\n\
            1. Restate the idea.\n2. Work the example, because reasoning aloud helps.\n3. Compare answers.";
        let mut ctx = context_with_body(body, 500, 500);
        let mut examples = Map::new();
        examples.insert("examples".to_string(), json!({ "count": 1 }));
        ctx.merge_agent_output("example_writer", examples);

        let result = ContentDepthValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert_eq!(scores["depth"].as_f64().unwrap(), 100.0);
        assert_eq!(scores["examples"].as_f64().unwrap(), 100.0);
        assert_eq!(scores["procedure"].as_f64().unwrap(), 100.0);
        assert_eq!(scores["connections"].as_f64().unwrap(), 100.0);
        assert!(result.output["violations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_shallow_content_scores_low_with_issues() {
        let body = "Erosion is a thing. It happens. Water moves dirt.";
        let ctx = context_with_body(body, 10, 500);

        let result = ContentDepthValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert!(scores["depth"].as_f64().unwrap() < 50.0);
        assert_eq!(scores["examples"].as_f64().unwrap(), 0.0);
        assert_eq!(scores["procedure"].as_f64().unwrap(), 0.0);
        assert!(!result.output["issues"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_placeholder_text_becomes_a_violation() {
        let body = "Erosion matters because water moves soil. {{ detail }} TBD for the rest.";
        let ctx = context_with_body(body, 500, 500);

        let result = ContentDepthValidatorAgent::new().execute(&ctx).await.unwrap();
        let violations = result.output["violations"].as_array().unwrap();

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0]["kind"], "placeholder_text");
        assert_eq!(violations[0]["count"], 2);
    }

    #[tokio::test]
    async fn test_requires_content() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "Erosion"));
        let err = ContentDepthValidatorAgent::new()
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingContextKey { .. }));
    }

    #[test]
    fn test_tone_penalizes_choppy_prose() {
        let choppy = vec!["One two three. Four five six. Seven eight nine."];
        let readable = vec!["This sentence runs long enough to land inside the readable range for class prose."];
        assert!(
            ContentDepthValidatorAgent::tone_score(&choppy)
                < ContentDepthValidatorAgent::tone_score(&readable)
        );
        assert_eq!(ContentDepthValidatorAgent::tone_score(&readable), 100.0);
    }
}
