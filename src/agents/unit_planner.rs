//! Unit planner agent.
//!
//! Produces the unit skeleton for a single lesson day: objectives, key
//! vocabulary pulled from the topic, and a summary paragraph. Every later
//! generation agent reads this plan, so it runs first and is critical.

use async_trait::async_trait;
use serde_json::json;
use tera::{Context as TeraContext, Tera};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

/// One-paragraph summary rendered into the unit plan.
const SUMMARY_TEMPLATE: &str = "Unit {{ unit_number }}, day {{ day }}: {{ topic }}. \
This {{ duration_minutes }} minute {{ subject }} lesson for grade {{ grade_level }} \
builds on the unit so far and sets up the next day's work.";

/// Maximum vocabulary terms extracted from the topic.
const MAX_VOCABULARY_TERMS: usize = 6;

pub struct UnitPlannerAgent;

impl UnitPlannerAgent {
    pub fn new() -> Self {
        Self
    }

    /// Pulls candidate vocabulary from the topic: lowercased words longer
    /// than three characters, in topic order, capped at
    /// [`MAX_VOCABULARY_TERMS`].
    fn vocabulary_from_topic(topic: &str) -> Vec<String> {
        topic
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
            })
            .filter(|word| word.len() > 3)
            .take(MAX_VOCABULARY_TERMS)
            .collect()
    }

    fn objectives(topic: &str) -> Vec<String> {
        vec![
            format!("Explain the core idea behind {topic} in their own words"),
            format!("Apply {topic} to a worked example with a partner"),
            format!("Connect {topic} to what the unit has covered so far"),
        ]
    }
}

impl Default for UnitPlannerAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for UnitPlannerAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::UnitPlanner
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let identity = &ctx.identity;
        if identity.topic.trim().is_empty() {
            return Err(AgentError::GenerationFailed(
                "lesson topic is empty".to_string(),
            ));
        }

        let mut tera_ctx = TeraContext::new();
        tera_ctx.insert("unit_number", &identity.unit_number);
        tera_ctx.insert("day", &identity.day);
        tera_ctx.insert("topic", &identity.topic);
        tera_ctx.insert("duration_minutes", &identity.duration_minutes);
        tera_ctx.insert("subject", &identity.subject);
        tera_ctx.insert("grade_level", &identity.grade_level);
        let summary = Tera::one_off(SUMMARY_TEMPLATE, &tera_ctx, false)?;

        let vocabulary = Self::vocabulary_from_topic(&identity.topic);
        let objectives = Self::objectives(&identity.topic);

        let unit_plan = json!({
            "unit_number": identity.unit_number,
            "day": identity.day,
            "topic": identity.topic,
            "duration_minutes": identity.duration_minutes,
            "objectives": objectives,
            "vocabulary": vocabulary,
            "summary": summary,
        });

        let mut output = AgentOutput::new().with_entry("unit_plan", unit_plan);
        if vocabulary.is_empty() {
            output = output.with_warning(format!(
                "no vocabulary terms could be extracted from topic '{}'",
                identity.topic
            ));
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;

    #[tokio::test]
    async fn test_unit_plan_has_objectives_and_summary() {
        let ctx = LessonContext::new(LessonIdentity::new(3, 2, "Plate tectonics and earthquakes"));
        let agent = UnitPlannerAgent::new();

        let result = agent.execute(&ctx).await.unwrap();
        let plan = result.output.get("unit_plan").unwrap();

        assert_eq!(plan["objectives"].as_array().unwrap().len(), 3);
        let summary = plan["summary"].as_str().unwrap();
        assert!(summary.contains("Unit 3, day 2"));
        assert!(summary.contains("Plate tectonics"));
    }

    #[tokio::test]
    async fn test_empty_topic_fails_generation() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "   "));
        let agent = UnitPlannerAgent::new();

        let err = agent.execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::GenerationFailed(_)));
    }

    #[test]
    fn test_vocabulary_skips_short_words() {
        let terms = UnitPlannerAgent::vocabulary_from_topic("The law of conservation of mass");
        assert_eq!(terms, vec!["conservation", "mass"]);
    }

    #[test]
    fn test_vocabulary_caps_term_count() {
        let terms = UnitPlannerAgent::vocabulary_from_topic(
            "photosynthesis chlorophyll glucose stomata xylem phloem transpiration",
        );
        assert_eq!(terms.len(), MAX_VOCABULARY_TERMS);
    }
}
