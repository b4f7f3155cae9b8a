//! Shared execution context for a single pipeline run.
//!
//! The context is the only shared mutable state in the pipeline: every agent
//! reads from it, and the orchestrator merges each agent's output back into it
//! before the next agent runs. Keys are only ever added or overwritten, never
//! removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::quality::GateResult;

/// Identity of the lesson a pipeline run is producing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonIdentity {
    /// Unit number within the course.
    pub unit_number: u32,
    /// Day within the unit.
    pub day: u32,
    /// Topic of the lesson.
    pub topic: String,
    /// Class period length in minutes.
    pub duration_minutes: u32,
    /// Grade level the lesson targets.
    pub grade_level: String,
    /// Subject area.
    pub subject: String,
}

impl LessonIdentity {
    /// Creates a new lesson identity with default duration, grade, and subject.
    pub fn new(unit_number: u32, day: u32, topic: impl Into<String>) -> Self {
        Self {
            unit_number,
            day,
            topic: topic.into(),
            duration_minutes: 50,
            grade_level: "8".to_string(),
            subject: "Science".to_string(),
        }
    }

    /// Builder method to set the class period length.
    pub fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    /// Builder method to set the grade level.
    pub fn with_grade_level(mut self, grade: impl Into<String>) -> Self {
        self.grade_level = grade.into();
        self
    }

    /// Builder method to set the subject area.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

/// Shared, mutable accumulator threaded through every phase of a run.
///
/// Holds the lesson identity, a flat key/value store, the per-agent output
/// history under `previous_outputs`, and the most recent gate results. The
/// orchestrator is the only writer; agents receive `&LessonContext` and
/// return their output for merging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonContext {
    /// Identity of the lesson being generated.
    pub identity: LessonIdentity,
    /// Flat key/value store, including promoted `<agent>_output` keys.
    values: HashMap<String, Value>,
    /// Raw output maps keyed by agent name.
    previous_outputs: HashMap<String, Map<String, Value>>,
    /// Latest result per gate, replaced in place on re-validation.
    gate_results: Vec<GateResult>,
    /// When the run began.
    pub created_at: DateTime<Utc>,
}

impl LessonContext {
    /// Creates a fresh context for one pipeline run.
    pub fn new(identity: LessonIdentity) -> Self {
        Self {
            identity,
            values: HashMap::new(),
            previous_outputs: HashMap::new(),
            gate_results: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the value stored under `key`, or `default` when absent.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.values.get(key).unwrap_or(default)
    }

    /// Returns the string stored under `key`, if the value is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Returns the boolean stored under `key`, defaulting to false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.values
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Stores `value` under `key`, overwriting any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Merges a completed agent's output into the context.
    ///
    /// The raw map lands under `previous_outputs[agent_name]`, and the same
    /// map is promoted to the flat `<agent_name>_output` key so downstream
    /// agents that expect flat access can find it.
    pub fn merge_agent_output(&mut self, agent_name: &str, output: Map<String, Value>) {
        self.values.insert(
            format!("{}_output", agent_name),
            Value::Object(output.clone()),
        );
        self.previous_outputs.insert(agent_name.to_string(), output);
    }

    /// Returns the raw output map recorded for `agent_name`, if any.
    pub fn agent_output(&self, agent_name: &str) -> Option<&Map<String, Value>> {
        self.previous_outputs.get(agent_name)
    }

    /// Returns true if an output has been recorded for `agent_name`.
    pub fn has_agent_output(&self, agent_name: &str) -> bool {
        self.previous_outputs.contains_key(agent_name)
    }

    /// Returns a value nested inside an agent's recorded output.
    pub fn agent_output_value(&self, agent_name: &str, key: &str) -> Option<&Value> {
        self.previous_outputs
            .get(agent_name)
            .and_then(|output| output.get(key))
    }

    /// Records a gate result, replacing any earlier result for the same gate.
    pub fn record_gate_result(&mut self, result: GateResult) {
        if let Some(existing) = self
            .gate_results
            .iter_mut()
            .find(|r| r.gate_name == result.gate_name)
        {
            *existing = result;
        } else {
            self.gate_results.push(result);
        }
    }

    /// Returns the latest recorded gate results.
    pub fn gate_results(&self) -> &[GateResult] {
        &self.gate_results
    }

    /// Returns the names of all agents whose outputs are recorded.
    pub fn recorded_agents(&self) -> Vec<&str> {
        self.previous_outputs.keys().map(String::as_str).collect()
    }
}
