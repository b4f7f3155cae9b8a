//! Slide outliner agent.
//!
//! Turns the drafted content into a slide blueprint: a title slide, one
//! content slide per section, and a recap. Bodies are trimmed to the
//! character limit at a word boundary and every slide carries a presenter
//! tip.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

/// Hard ceiling on slide body length. Validated downstream and reported as
/// a formatting violation when exceeded.
pub const SLIDE_BODY_CHAR_LIMIT: usize = 300;

/// How many sentences of a section body make it onto its slide.
const SENTENCES_PER_SLIDE: usize = 2;

const PRESENTER_TIPS: [&str; 4] = [
    "Pause here and take two student responses before moving on.",
    "Keep this slide up while pairs talk so the prompt stays visible.",
    "Cold call one student to restate the idea in their own words.",
    "Point at the anchor chart when the vocabulary term comes up.",
];

pub struct SlideOutlinerAgent;

impl SlideOutlinerAgent {
    pub fn new() -> Self {
        Self
    }

    /// Truncates `text` to `limit` characters without splitting a word.
    fn truncate_at_word(text: &str, limit: usize) -> String {
        if text.chars().count() <= limit {
            return text.to_string();
        }
        let mut kept = String::new();
        for word in text.split_whitespace() {
            let candidate_len = if kept.is_empty() {
                word.chars().count()
            } else {
                kept.chars().count() + 1 + word.chars().count()
            };
            if candidate_len > limit {
                break;
            }
            if !kept.is_empty() {
                kept.push(' ');
            }
            kept.push_str(word);
        }
        kept
    }

    fn leading_sentences(body: &str, count: usize) -> String {
        let sentences: Vec<&str> = body
            .split_terminator(['.', '!', '?'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(count)
            .collect();
        if sentences.is_empty() {
            body.to_string()
        } else {
            format!("{}.", sentences.join(". "))
        }
    }

    fn tip(index: usize) -> &'static str {
        PRESENTER_TIPS[index % PRESENTER_TIPS.len()]
    }
}

impl Default for SlideOutlinerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for SlideOutlinerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::SlideOutliner
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let content = ctx
            .get("content_builder_output")
            .and_then(|v| v.get("content"))
            .cloned()
            .ok_or_else(|| AgentError::missing_key("slide_outliner", "content_builder_output"))?;
        let sections = content
            .get("sections")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AgentError::InvalidInput("content output has no sections array".to_string())
            })?;

        let identity = &ctx.identity;

        // A rework rerun tightens bodies to a single sentence so overlong
        // slides shrink instead of being re-cut the same way.
        let sentences_per_slide = if ctx.get_bool("slide_rework_requested") {
            1
        } else {
            SENTENCES_PER_SLIDE
        };

        let objectives = ctx
            .agent_output_value("unit_planner", "unit_plan")
            .and_then(|plan| plan.get("objectives").cloned())
            .and_then(|v| v.as_array().cloned())
            .map(|objectives| {
                objectives
                    .iter()
                    .filter_map(|o| o.as_str().map(String::from))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_else(|| format!("Understand {}", identity.topic));

        let mut slides = Vec::new();
        slides.push(json!({
            "kind": "title",
            "title": format!(
                "{} (Unit {}, day {})",
                identity.topic, identity.unit_number, identity.day
            ),
            "body": Self::truncate_at_word(&objectives, SLIDE_BODY_CHAR_LIMIT),
            "presenter_tip": Self::tip(0),
        }));

        for (index, section) in sections.iter().enumerate() {
            let title = section
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or("Section");
            let body = section.get("body").and_then(|b| b.as_str()).unwrap_or("");
            let excerpt = Self::leading_sentences(body, sentences_per_slide);
            slides.push(json!({
                "kind": "content",
                "title": title,
                "body": Self::truncate_at_word(&excerpt, SLIDE_BODY_CHAR_LIMIT),
                "presenter_tip": Self::tip(index + 1),
            }));
        }

        slides.push(json!({
            "kind": "recap",
            "title": "Recap and exit ticket",
            "body": "One takeaway, one question. Hand your exit card to the teacher on the way out.",
            "presenter_tip": Self::tip(sections.len() + 1),
        }));

        let slide_count = slides.len();
        Ok(AgentOutput::new().with_entry(
            "slides",
            json!({
                "slides": Value::Array(slides),
                "char_limit": SLIDE_BODY_CHAR_LIMIT,
                "slide_count": slide_count,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;
    use serde_json::Map;

    fn context_with_sections() -> LessonContext {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 2, "Weather fronts"));
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!({
                "sections": [
                    { "title": "Opening: Weather fronts", "kind": "intro",
                      "body": "Today we explore weather fronts. This lesson builds on air masses. More follows." },
                    { "title": "Core concept: pressure", "kind": "concept",
                      "body": "Pressure is central to weather fronts. Start from the warmup." },
                ]
            }),
        );
        ctx.merge_agent_output("content_builder", content);
        ctx
    }

    #[tokio::test]
    async fn test_deck_is_title_sections_recap() {
        let ctx = context_with_sections();
        let result = SlideOutlinerAgent::new().execute(&ctx).await.unwrap();
        let deck = result.output.get("slides").unwrap();

        let slides = deck["slides"].as_array().unwrap();
        assert_eq!(slides.len(), 4);
        assert_eq!(slides[0]["kind"], "title");
        assert_eq!(slides[1]["kind"], "content");
        assert_eq!(slides[3]["kind"], "recap");
        assert!(slides
            .iter()
            .all(|s| !s["presenter_tip"].as_str().unwrap().is_empty()));
        assert_eq!(deck["char_limit"], 300);
    }

    #[tokio::test]
    async fn test_bodies_respect_the_char_limit() {
        let mut ctx = LessonContext::new(LessonIdentity::new(1, 1, "Weather fronts"));
        let long_body = "wordiness ".repeat(80);
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!({ "sections": [{ "title": "Long", "kind": "concept", "body": long_body }] }),
        );
        ctx.merge_agent_output("content_builder", content);

        let result = SlideOutlinerAgent::new().execute(&ctx).await.unwrap();
        let deck = result.output.get("slides").unwrap();
        for slide in deck["slides"].as_array().unwrap() {
            assert!(slide["body"].as_str().unwrap().chars().count() <= SLIDE_BODY_CHAR_LIMIT);
        }
    }

    #[tokio::test]
    async fn test_rework_tightens_to_one_sentence() {
        let mut ctx = context_with_sections();
        ctx.set("slide_rework_requested", json!(true));

        let result = SlideOutlinerAgent::new().execute(&ctx).await.unwrap();
        let deck = result.output.get("slides").unwrap();
        let body = deck["slides"][1]["body"].as_str().unwrap();
        assert_eq!(body, "Today we explore weather fronts.");
    }

    #[test]
    fn test_truncate_keeps_whole_words() {
        let text = "alpha beta gamma delta";
        assert_eq!(SlideOutlinerAgent::truncate_at_word(text, 12), "alpha beta");
        assert_eq!(SlideOutlinerAgent::truncate_at_word(text, 100), text);
    }
}
