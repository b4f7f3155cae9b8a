//! Warmup agent.
//!
//! Writes the opening activity for the lesson: a short think-pair-share
//! prompt that recalls prior work and points at the day's first objective.

use async_trait::async_trait;
use serde_json::json;
use tera::{Context as TeraContext, Tera};

use super::error::{AgentError, AgentResult};
use super::{Agent, AgentKind, AgentOutput};
use crate::context::LessonContext;

const PROMPT_TEMPLATE: &str = "Think back to our last {{ subject }} class. Write two \
sentences about what you recall, then tell your partner how that might connect to \
{{ topic }}. Be ready to share one idea with the class.";

/// Warmups never drop below this many minutes, whatever the lesson length.
pub(crate) const MIN_WARMUP_MINUTES: u32 = 3;

/// Fraction of the lesson given to the warmup, as a divisor.
const WARMUP_SHARE_DIVISOR: u32 = 10;

pub struct WarmupAgent;

impl WarmupAgent {
    pub fn new() -> Self {
        Self
    }

    /// Warmup length for a lesson of the given duration.
    pub(crate) fn warmup_minutes(duration_minutes: u32) -> u32 {
        (duration_minutes / WARMUP_SHARE_DIVISOR).max(MIN_WARMUP_MINUTES)
    }
}

impl Default for WarmupAgent {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Agent for WarmupAgent {
    fn kind(&self) -> AgentKind {
        AgentKind::Warmup
    }

    async fn execute(&self, ctx: &LessonContext) -> AgentResult<AgentOutput> {
        let plan = ctx
            .get("unit_planner_output")
            .and_then(|v| v.get("unit_plan"))
            .cloned()
            .ok_or_else(|| AgentError::missing_key("warmup", "unit_planner_output"))?;

        let identity = &ctx.identity;
        let mut tera_ctx = TeraContext::new();
        tera_ctx.insert("subject", &identity.subject);
        tera_ctx.insert("topic", &identity.topic);
        let prompt = Tera::one_off(PROMPT_TEMPLATE, &tera_ctx, false)?;

        let connection = plan
            .get("objectives")
            .and_then(|v| v.as_array())
            .and_then(|objectives| objectives.first())
            .and_then(|first| first.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("Connect prior work to {}", identity.topic));

        let warmup = json!({
            "prompt": prompt,
            "duration_minutes": Self::warmup_minutes(identity.duration_minutes),
            "format": "think-pair-share",
            "connection": connection,
        });

        Ok(AgentOutput::new().with_entry("warmup", warmup))
    }
}
