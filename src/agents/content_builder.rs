//! Content builder agent.
//!
//! Drafts the instructional core of the lesson: an opening, three concept
//! sections keyed to unit vocabulary, guided practice, and a closure. Each
//! section carries a minute allocation, and section bodies are padded with
//! elaboration sentences until the lesson hits its word budget.

use async_trait::async_trait;
use serde_json::{json, Value};
use tera::{Context as TeraContext, Tera};

use super::error::{AgentError, AgentResult};
use super::warmup::WarmupAgent;
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

/// Speaking-pace budget used to size lesson prose against its duration.
pub const WORDS_PER_MINUTE: u32 = 20;

/// Minute shares for intro, three concept sections, practice, and closure.
const SECTION_SHARES: [u32; 6] = [15, 20, 20, 20, 15, 10];

/// Cap on elaboration sentences appended to a single section.
const MAX_ELABORATIONS_PER_SECTION: usize = 40;

const INTRO_TEMPLATE: &str = "Today we explore {{ topic }}. This lesson builds on what \
the class already knows about {{ subject }}, because a clear through line keeps new \
terms anchored to familiar ones. By the end, students will be able to {{ objective }}.";

const CONCEPT_TEMPLATE: &str = "{{ term }} is central to {{ topic }}. Start from what \
students noticed during the warmup, because naming {{ term }} precisely gives the class \
a shared language. For instance, ask students to describe {{ term }} in their own words \
before offering the formal definition, which means misconceptions surface early enough \
to address.";

const PRACTICE_TEMPLATE: &str = "Guided practice for {{ topic }}:\n1. Restate the key \
idea of {{ term }} in one sentence.\n2. Work the shared example as a class, because \
talking through each move exposes the reasoning.\n3. Try the paired problem and compare \
answers with your partner.\n4. Write down one question you still have.";

const CLOSURE_TEMPLATE: &str = "Close by asking how {{ topic }} connects to the unit \
question. Students record one takeaway and one question on an exit card; tomorrow's \
warmup will recall both. This also connects to the next lesson, so collect the cards \
on the way out.";

/// Filler sentences cycled into a section until it reaches its word budget.
/// `{term}` is substituted before use.
const ELABORATIONS: [&str; 5] = [
    "This matters because {term} shapes how students interpret what they observe.",
    "For instance, a quick sketch of {term} on the board keeps the discussion concrete.",
    "Therefore, return to {term} whenever the class drifts toward memorizing instead of reasoning.",
    "Students often conflate {term} with its everyday meaning, so pause and contrast the two directly.",
    "A short turn-and-talk about {term} gives quieter students a rehearsal before sharing out.",
];

/// Extra prompts appended when an enrichment rerun is requested.
const ENRICHMENT_ELABORATIONS: [&str; 3] = [
    "Push further by asking what would change if {term} were absent, because the counterfactual exposes structure.",
    "For instance, connect {term} to something the class has brought up earlier this week.",
    "Invite students to draft their own definition of {term}, which means the vocabulary becomes theirs.",
];

pub struct ContentBuilderAgent;

impl ContentBuilderAgent {
    pub fn new() -> Self {
        Self
    }

    /// Splits `total` minutes across sections proportionally to `shares`,
    /// handing rounding leftovers to the largest shares so the allocations
    /// sum to `total` exactly.
    fn split_minutes(total: u32, shares: &[u32]) -> Vec<u32> {
        let share_sum: u32 = shares.iter().sum();
        let mut minutes: Vec<u32> = shares.iter().map(|s| total * s / share_sum).collect();
        let mut assigned: u32 = minutes.iter().sum();

        let mut order: Vec<usize> = (0..shares.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(shares[i]));
        let mut cursor = 0;
        while assigned < total {
            minutes[order[cursor % order.len()]] += 1;
            assigned += 1;
            cursor += 1;
        }
        minutes
    }

    fn count_words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    /// Pads `body` with elaboration sentences until it reaches `budget`
    /// words, then appends one enrichment prompt when requested.
    fn fill_to_budget(body: &mut String, term: &str, budget: usize, enriched: bool) {
        let mut added = 0;
        while Self::count_words(body) < budget && added < MAX_ELABORATIONS_PER_SECTION {
            let sentence = ELABORATIONS[added % ELABORATIONS.len()].replace("{term}", term);
            body.push(' ');
            body.push_str(&sentence);
            added += 1;
        }
        if enriched {
            let sentence = ENRICHMENT_ELABORATIONS[added % ENRICHMENT_ELABORATIONS.len()]
                .replace("{term}", term);
            body.push(' ');
            body.push_str(&sentence);
        }
    }

    fn render(template: &str, tera_ctx: &TeraContext) -> AgentResult<String> {
        Ok(Tera::one_off(template, tera_ctx, false)?)
    }
}

impl Default for ContentBuilderAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for ContentBuilderAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::ContentBuilder
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let plan = ctx
            .get("unit_planner_output")
            .and_then(|v| v.get("unit_plan"))
            .cloned()
            .ok_or_else(|| AgentError::missing_key("content_builder", "unit_planner_output"))?;

        let identity = &ctx.identity;
        let topic = identity.topic.clone();

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
        let term_for = |index: usize| -> String {
            if vocabulary.is_empty() {
                topic.clone()
            } else {
                vocabulary[index % vocabulary.len()].clone()
            }
        };

        let objective = plan
            .get("objectives")
            .and_then(|v| v.as_array())
            .and_then(|objectives| objectives.first())
            .and_then(|first| first.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("reason about {topic}"));

        // Minutes available after the warmup. The warmup output wins when it
        // exists so a rerun stays consistent with the published activity.
        let warmup_minutes = ctx
            .get("warmup_output")
            .and_then(|v| v.get("warmup"))
            .and_then(|w| w.get("duration_minutes"))
            .and_then(|m| m.as_u64())
            .map(|m| m as u32)
            .unwrap_or_else(|| WarmupAgent::warmup_minutes(identity.duration_minutes));
        let remaining = identity
            .duration_minutes
            .saturating_sub(warmup_minutes)
            .max(1);
        let minutes = Self::split_minutes(remaining, &SECTION_SHARES);

        let target_words = (identity.duration_minutes * WORDS_PER_MINUTE) as usize;

        // A timing rerun passes back the measured overshoot or undershoot;
        // scale section budgets by it so the redraft converges.
        let budget_scale = ctx
            .get("word_budget_feedback")
            .and_then(|v| {
                let actual = v.get("actual_words")?.as_f64()?;
                let target = v.get("target_words")?.as_f64()?;
                if actual > 0.0 {
                    Some((target / actual).clamp(0.6, 1.4))
                } else {
                    None
                }
            })
            .unwrap_or(1.0);
        let enriched = ctx.get_bool("enrichment_requested");

        let mut tera_ctx = TeraContext::new();
        tera_ctx.insert("topic", &topic);
        tera_ctx.insert("subject", &identity.subject);
        tera_ctx.insert("objective", &objective);

        let mut specs: Vec<(String, &str, &str, String)> = Vec::new();
        specs.push((
            format!("Opening: {topic}"),
            "intro",
            INTRO_TEMPLATE,
            term_for(0),
        ));
        for concept in 0..3 {
            specs.push((
                format!("Core concept: {}", term_for(concept)),
                "concept",
                CONCEPT_TEMPLATE,
                term_for(concept),
            ));
        }
        specs.push((
            "Guided practice".to_string(),
            "practice",
            PRACTICE_TEMPLATE,
            term_for(0),
        ));
        specs.push((
            "Closure and exit ticket".to_string(),
            "closure",
            CLOSURE_TEMPLATE,
            term_for(1),
        ));

        let mut sections = Vec::new();
        let mut word_count = 0usize;
        for (index, (title, kind, template, term)) in specs.into_iter().enumerate() {
            tera_ctx.insert("term", &term);
            let mut body = Self::render(template, &tera_ctx)?;
            let section_budget =
                (target_words as f64 * minutes[index] as f64 / remaining as f64 * budget_scale)
                    as usize;
            // The numbered practice steps stand on their own; padding them
            // would bury the procedure.
            if kind != "practice" {
                Self::fill_to_budget(&mut body, &term, section_budget, enriched);
            }
            word_count += Self::count_words(&body);
            sections.push(json!({
                "title": title,
                "kind": kind,
                "body": body,
                "minutes": minutes[index],
            }));
        }

        let content = json!({
            "sections": Value::Array(sections),
            "word_count": word_count,
            "target_word_count": target_words,
            "planned_minutes": remaining,
            "warmup_minutes": warmup_minutes,
        });

        let mut output = AgentOutput::new().with_entry("content", content);
        if vocabulary.is_empty() {
            output = output.with_warning(
                "unit plan carried no vocabulary; concept sections reuse the topic".to_string(),
            );
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LessonIdentity;
    use serde_json::Map;

    fn context_for(duration: u32) -> LessonContext {
        let mut ctx = LessonContext::new(
            LessonIdentity::new(1, 3, "Energy transfer in ecosystems")
                .with_duration_minutes(duration),
        );
        let mut plan = Map::new();
        plan.insert(
            "unit_plan".to_string(),
            json!({
                "vocabulary": ["energy", "transfer", "ecosystems"],
                "objectives": ["Explain energy transfer in their own words"],
            }),
        );
        ctx.merge_agent_output("unit_planner", plan);
        ctx
    }

    #[tokio::test]
    async fn test_sections_cover_the_available_minutes() {
        let ctx = context_for(50);
        let agent = ContentBuilderAgent::new();

        let result = agent.execute(&ctx).await.unwrap();
        let content = result.output.get("content").unwrap();

        let sections = content["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 6);
        let total: u64 = sections
            .iter()
            .map(|s| s["minutes"].as_u64().unwrap())
            .sum();
        assert_eq!(total, content["planned_minutes"].as_u64().unwrap());
        assert_eq!(content["target_word_count"], 1000);
    }

    #[tokio::test]
    async fn test_word_count_tracks_the_budget() {
        let ctx = context_for(50);
        let agent = ContentBuilderAgent::new();

        let result = agent.execute(&ctx).await.unwrap();
        let content = result.output.get("content").unwrap();

        let words = content["word_count"].as_u64().unwrap() as f64;
        let target = content["target_word_count"].as_u64().unwrap() as f64;
        assert!((words - target).abs() / target < 0.15);
    }

    #[tokio::test]
    async fn test_enrichment_appends_extra_prompts() {
        let plain = ContentBuilderAgent::new()
            .execute(&context_for(50))
            .await
            .unwrap();
        let mut enriched_ctx = context_for(50);
        enriched_ctx.set("enrichment_requested", json!(true));
        let enriched = ContentBuilderAgent::new()
            .execute(&enriched_ctx)
            .await
            .unwrap();

        let words = |out: &AgentOutput| {
            out.output.get("content").unwrap()["word_count"]
                .as_u64()
                .unwrap()
        };
        assert!(words(&enriched) > words(&plain));
    }

    #[tokio::test]
    async fn test_requires_unit_plan() {
        let ctx = LessonContext::new(LessonIdentity::new(1, 1, "Energy transfer"));
        let err = ContentBuilderAgent::new().execute(&ctx).await.unwrap_err();
        assert!(matches!(err, AgentError::MissingContextKey { .. }));
    }

    #[test]
    fn test_split_minutes_sums_exactly() {
        for total in [5, 17, 45, 81] {
            let minutes = ContentBuilderAgent::split_minutes(total, &SECTION_SHARES);
            assert_eq!(minutes.iter().sum::<u32>(), total, "total {total}");
        }
    }

    #[test]
    fn test_split_minutes_favors_largest_shares() {
        let minutes = ContentBuilderAgent::split_minutes(45, &SECTION_SHARES);
        assert_eq!(minutes, vec![6, 10, 10, 9, 6, 4]);
    }
}
