//! Timing validator.
//!
//! Scores whether the drafted content fits the class period: prose length
//! against the speaking-pace budget, and section minutes against the time
//! left after the warmup. Feeds the timing-fit gate, and its measured word
//! counts drive the builder's redraft on a timing retry.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::content_builder::WORDS_PER_MINUTE;
use super::error::{AgentError, AgentResult};
use super::warmup::WarmupAgent;
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

/// Score lost per unit of relative deviation. A 10% miss costs 20 points.
const DEVIATION_SLOPE: f64 = 200.0;

/// Penalty for a single section monopolizing the period.
const OVERLONG_SECTION_PENALTY: f64 = 15.0;

/// A section longer than this fraction of the period is overlong.
const OVERLONG_SECTION_SHARE: f64 = 0.4;

/// Categories scoring below this produce an issue string.
const ISSUE_FLOOR: f64 = 80.0;

pub struct TimingValidatorAgent;

impl TimingValidatorAgent {
    pub fn new() -> Self {
        Self
    }

    fn deviation_score(actual: f64, expected: f64) -> f64 {
        if expected <= 0.0 {
            return 0.0;
        }
        let deviation = (actual - expected).abs() / expected;
        (100.0 - deviation * DEVIATION_SLOPE).clamp(0.0, 100.0)
    }
}

impl Default for TimingValidatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for TimingValidatorAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::TimingValidator
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let content = ctx
            .get("content_builder_output")
            .and_then(|v| v.get("content"))
            .cloned()
            .ok_or_else(|| {
                AgentError::missing_key("timing_validator", "content_builder_output")
            })?;
        let sections = content
            .get("sections")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                AgentError::InvalidInput("content output has no sections array".to_string())
            })?;

        let duration = ctx.identity.duration_minutes;
        let target_words = (duration * WORDS_PER_MINUTE) as f64;
        let actual_words = content
            .get("word_count")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let word_budget_fit = Self::deviation_score(actual_words, target_words);

        let warmup_minutes = ctx
            .agent_output_value("warmup", "warmup")
            .and_then(|w| w.get("duration_minutes"))
            .and_then(|m| m.as_u64())
            .map(|m| m as u32)
            .unwrap_or_else(|| WarmupAgent::warmup_minutes(duration));
        let expected_minutes = duration.saturating_sub(warmup_minutes).max(1) as f64;
        let section_minutes: f64 = sections
            .iter()
            .filter_map(|s| s.get("minutes").and_then(|m| m.as_f64()))
            .sum();

        let mut section_balance = Self::deviation_score(section_minutes, expected_minutes);
        let overlong_limit = duration as f64 * OVERLONG_SECTION_SHARE;
        let overlong = sections
            .iter()
            .filter_map(|s| s.get("minutes").and_then(|m| m.as_f64()))
            .filter(|&m| m > overlong_limit)
            .count();
        section_balance =
            (section_balance - overlong as f64 * OVERLONG_SECTION_PENALTY).clamp(0.0, 100.0);

        let mut issues = Vec::new();
        if word_budget_fit < ISSUE_FLOOR {
            issues.push(json!(format!(
                "content runs {actual_words:.0} words against a budget of {target_words:.0}"
            )));
        }
        if section_balance < ISSUE_FLOOR {
            issues.push(json!(format!(
                "sections plan {section_minutes:.0} minutes but {expected_minutes:.0} are available after the warmup"
            )));
        }

        let mut output = Map::new();
        output.insert(
            "category_scores".to_string(),
            json!({
                "word_budget_fit": word_budget_fit,
                "section_balance": section_balance,
            }),
        );
        output.insert("issues".to_string(), Value::Array(issues));
        output.insert("actual_words".to_string(), json!(actual_words));
        output.insert("target_words".to_string(), json!(target_words));
        Ok(AgentOutput::from_map(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;

    fn context_with_timing(
        duration: u32,
        word_count: u64,
        minutes: &[u64],
        warmup_minutes: u64,
    ) -> LessonContext {
        let mut ctx =
            LessonContext::new(LessonIdentity::new(1, 1, "Circuits").with_duration_minutes(duration));
        let sections: Vec<Value> = minutes
            .iter()
            .map(|m| json!({ "title": "s", "kind": "concept", "minutes": m }))
            .collect();
        let mut content = Map::new();
        content.insert(
            "content".to_string(),
            json!({ "sections": sections, "word_count": word_count }),
        );
        ctx.merge_agent_output("content_builder", content);

        let mut warmup = Map::new();
        warmup.insert(
            "warmup".to_string(),
            json!({ "duration_minutes": warmup_minutes }),
        );
        ctx.merge_agent_output("warmup", warmup);
        ctx
    }

    #[tokio::test]
    async fn test_on_budget_content_scores_full() {
        let ctx = context_with_timing(50, 1000, &[6, 10, 10, 9, 6, 4], 5);
        let result = TimingValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert_eq!(scores["word_budget_fit"].as_f64().unwrap(), 100.0);
        assert_eq!(scores["section_balance"].as_f64().unwrap(), 100.0);
        assert!(result.output["issues"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overshoot_costs_points() {
        // 1250 words against a 1000-word budget: 25% over, 50 points off.
        let ctx = context_with_timing(50, 1250, &[6, 10, 10, 9, 6, 4], 5);
        let result = TimingValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        let fit = scores["word_budget_fit"].as_f64().unwrap();
        assert!((fit - 50.0).abs() < 1e-9);
        assert!(!result.output["issues"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlong_section_is_penalized() {
        // One 25-minute section in a 50-minute period.
        let ctx = context_with_timing(50, 1000, &[25, 10, 10], 5);
        let result = TimingValidatorAgent::new().execute(&ctx).await.unwrap();
        let scores = result.output["category_scores"].as_object().unwrap();

        assert_eq!(scores["section_balance"].as_f64().unwrap(), 85.0);
    }

    #[tokio::test]
    async fn test_reports_measured_words_for_feedback() {
        let ctx = context_with_timing(50, 1250, &[45], 5);
        let result = TimingValidatorAgent::new().execute(&ctx).await.unwrap();

        assert_eq!(result.output["actual_words"], json!(1250.0));
        assert_eq!(result.output["target_words"], json!(1000.0));
    }

    #[tokio::test]
    async fn test_requires_content() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "Circuits"));
        let err = TimingValidatorAgent::new().execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingContextKey { .. }));
    }
}
