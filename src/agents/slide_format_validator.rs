//! Slide format validator.
//!
//! Scores the slide blueprint for the slide-format gate: structural
//! completeness of each slide and deck sequencing. Char-limit overruns and
//! missing presenter tips are discrete violations deducted from the final
//! score, so they are not folded into the category scores as well.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::error::{AgentError, AgentResult};
use super::slide_outliner::SLIDE_BODY_CHAR_LIMIT;
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;
use crate::quality::{Violation, ViolationKind};

/// Sequencing credit for opening on a title slide.
const OPENS_WITH_TITLE_CREDIT: f64 = 40.0;

/// Sequencing credit for closing on a recap slide.
const CLOSES_WITH_RECAP_CREDIT: f64 = 30.0;

/// Sequencing credit for a deck of at least this many slides.
const MIN_DECK_CREDIT: f64 = 30.0;
const MIN_DECK_SLIDES: usize = 3;

pub struct SlideFormatValidatorAgent;

impl SlideFormatValidatorAgent {
    pub fn new() -> Self {
        Self
    }

    fn str_field<'a>(slide: &'a Value, field: &str) -> &'a str {
        slide.get(field).and_then(|v| v.as_str()).unwrap_or("")
    }
}

impl Default for SlideFormatValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SlideFormatValidatorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SlideFormatValidator
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let deck = ctx
            .get("slide_outliner_output")
            .and_then(|v| v.get("slides"))
            .cloned()
            .ok_or_else(|| {
                AgentError::missing_key("slide_format_validator", "slide_outliner_output")
            })?;
        let slides = deck.get("slides").and_then(|v| v.as_array()).ok_or_else(|| {
            AgentError::InvalidInput("slides artifact has no slides array".to_string())
        })?;

        let char_limit = deck
            .get("char_limit")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(SLIDE_BODY_CHAR_LIMIT);

        let mut complete = 0usize;
        let mut over_limit = 0u32;
        let mut missing_tips = 0u32;
        for slide in slides {
            let title = Self::str_field(slide, "title");
            let body = Self::str_field(slide, "body");
            if !title.is_empty() && !body.is_empty() {
                complete += 1;
            }
            if body.chars().count() > char_limit {
                over_limit += 1;
            }
            if Self::str_field(slide, "presenter_tip").is_empty() {
                missing_tips += 1;
            }
        }

        let structure = if slides.is_empty() {
            0.0
        } else {
            complete as f64 / slides.len() as f64 * 100.0
        };

        let mut sequencing = 0.0;
        let opens_with_title = slides
            .first()
            .map(|s| Self::str_field(s, "kind") == "title")
            .unwrap_or(false);
        let closes_with_recap = slides
            .last()
            .map(|s| Self::str_field(s, "kind") == "recap")
            .unwrap_or(false);
        if opens_with_title {
            sequencing += OPENS_WITH_TITLE_CREDIT;
        }
        if closes_with_recap {
            sequencing += CLOSES_WITH_RECAP_CREDIT;
        }
        if slides.len() >= MIN_DECK_SLIDES {
            sequencing += MIN_DECK_CREDIT;
        }

        let mut issues = Vec::new();
        if !opens_with_title {
            issues.push(json!("deck does not open with a title slide"));
        }
        if !closes_with_recap {
            issues.push(json!("deck does not close with a recap slide"));
        }
        if over_limit > 0 {
            issues.push(json!(format!(
                "{over_limit} slide bodies exceed the {char_limit} character limit"
            )));
        }

        let mut violations = Vec::new();
        if over_limit > 0 {
            violations.push(serde_json::to_value(
                Violation::new(ViolationKind::CharLimitExceeded)
                    .with_count(over_limit)
                    .with_detail(format!("limit is {char_limit} characters")),
            )?);
        }
        if missing_tips > 0 {
            violations.push(serde_json::to_value(
                Violation::new(ViolationKind::MissingTip).with_count(missing_tips),
            )?);
        }

        let mut output = Map::new();
        output.insert(
            "category_scores".to_string(),
            json!({
                "structure": structure,
                "sequencing": sequencing,
            }),
        );
        output.insert("issues".to_string(), Value::Array(issues));
        output.insert("violations".to_string(), Value::Array(violations));
        output.insert("checked_slides".to_string(), json!(slides.len()));
        Ok(AgentOutput::from_map(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;

    fn context_with_deck(slides: Vec<Value>) -> LessonContext {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 1, "Light"));
        let mut out = Map::new();
        out.insert(
            "slides".to_string(),
            json!({ "slides": slides, "char_limit": SLIDE_BODY_CHAR_LIMIT }),
        );
        ctx.merge_agent_output("slide_outliner", out);
        ctx
    }

    fn slide(kind: &str, title: &str, body: &str, tip: &str) -> Value {
        json!({ "kind": kind, "title": title, "body": body, "presenter_tip": tip })
    }

    #[tokio::test]
    async fn test_well_formed_deck_scores_full() {
        let ctx = context_with_deck(vec![
            slide("title", "Light", "Objectives", "Pause here."),
            slide("content", "Reflection", "Light bounces.", "Cold call."),
            slide("recap", "Recap", "One takeaway.", "Collect cards."),
        ]);

        let result = SlideFormatValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert_eq!(scores["structure"].as_f64().unwrap(), 100.0);
        assert_eq!(scores["sequencing"].as_f64().unwrap(), 100.0);
        assert!(result.output["violations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_bodies_are_violations_not_structure_failures() {
        let long_body = "x".repeat(SLIDE_BODY_CHAR_LIMIT + 1);
        let ctx = context_with_deck(vec![
            slide("title", "Light", "Objectives", "Pause here."),
            slide("content", "Reflection", &long_body, "Cold call."),
            slide("content", "Refraction", &long_body, "Cold call."),
            slide("recap", "Recap", "One takeaway.", "Collect cards."),
        ]);

        let result = SlideFormatValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert_eq!(scores["structure"].as_f64().unwrap(), 100.0);
        let violations = result.output["violations"].as_array().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0]["kind"], "char_limit_exceeded");
        assert_eq!(violations[0]["count"], 2);
    }

    #[tokio::test]
    async fn test_missing_tips_and_bad_sequencing() {
        let ctx = context_with_deck(vec![
            slide("content", "Reflection", "Light bounces.", ""),
            slide("content", "Refraction", "Light bends.", "Cold call."),
        ]);

        let result = SlideFormatValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        // No title opener, no recap closer, under three slides.
        assert_eq!(scores["sequencing"].as_f64().unwrap(), 0.0);
        let violations = result.output["violations"].as_array().unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0]["kind"], "missing_tip");
        assert_eq!(violations[0]["count"], 1);
    }

    #[tokio::test]
    async fn test_requires_deck() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "Light"));
        let err = SlideFormatValidatorAgent::new()
            .execute(&ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingContextKey { .. }));
    }

    #[tokio::test]
    async fn test_empty_body_fails_structure() {
        let ctx = context_with_deck(vec![
            slide("title", "Light", "Objectives", "Pause here."),
            slide("content", "Reflection", "", "Cold call."),
        ]);

        let result = SlideFormatValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();
        assert_eq!(scores["structure"].as_f64().unwrap(), 50.0);
    }
}
