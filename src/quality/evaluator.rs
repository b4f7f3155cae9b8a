//! Evaluates a single quality gate against a validator agent's output.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use super::gate::{GateKind, GateResult, GateSpec};

/// Computes one gate's score and pass/fail verdict.
///
/// Evaluation is a pure function of the gate spec and the validator output:
/// re-evaluating unchanged inputs yields an identical result.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateEvaluator;

impl GateEvaluator {
    /// Creates a new evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluates `spec` against a validator's output map.
    pub fn evaluate(&self, spec: &GateSpec, output: &Map<String, Value>) -> GateResult {
        let mut result = match &spec.kind {
            GateKind::Weighted { weights } => self.evaluate_weighted(spec, weights, output),
            GateKind::Binary { required } => self.evaluate_binary(spec, required, output),
        };

        result.retry_strategy = if result.passed {
            None
        } else {
            Some(spec.retry_strategy)
        };

        debug!(
            gate = %spec.name,
            raw_score = ?result.raw_score,
            passed = result.passed,
            "gate evaluated"
        );
        result
    }

    /// Weighted gates renormalize over the categories actually present, so a
    /// validator that reports only a subset of categories is scored on that
    /// subset rather than zeroed out.
    fn evaluate_weighted(
        &self,
        spec: &GateSpec,
        weights: &BTreeMap<String, f64>,
        output: &Map<String, Value>,
    ) -> GateResult {
        let reported = output.get("category_scores").and_then(Value::as_object);

        let mut category_scores = BTreeMap::new();
        let mut weighted_sum = 0.0;
        let mut weight_present = 0.0;

        if let Some(scores) = reported {
            for (category, weight) in weights {
                if let Some(score) = scores.get(category).and_then(Value::as_f64) {
                    let score = score.clamp(0.0, 100.0);
                    category_scores.insert(category.clone(), score);
                    weighted_sum += score * weight;
                    weight_present += weight;
                }
            }
        }

        let raw_score = if weight_present > 0.0 {
            Some(weighted_sum / weight_present)
        } else {
            None
        };
        let passed = raw_score.map(|s| s >= spec.threshold).unwrap_or(false);

        let mut issues = collect_reported_issues(output);
        match raw_score {
            Some(score) if !passed => {
                issues.push(format!(
                    "weighted score {:.1} below threshold {:.1}",
                    score, spec.threshold
                ));
            }
            None => issues.push("no category scores produced".to_string()),
            _ => {}
        }

        GateResult {
            gate_name: spec.name.clone(),
            raw_score,
            passed,
            category_scores,
            issues,
            threshold: spec.threshold,
            retry_strategy: None,
        }
    }

    /// Binary gates score the percentage of required elements present and
    /// only pass when every element is found.
    fn evaluate_binary(
        &self,
        spec: &GateSpec,
        required: &[String],
        output: &Map<String, Value>,
    ) -> GateResult {
        let present: Vec<&str> = output
            .get("present_components")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut category_scores = BTreeMap::new();
        let mut issues = collect_reported_issues(output);
        let mut found = 0usize;

        for element in required {
            if present.contains(&element.as_str()) {
                category_scores.insert(element.clone(), 100.0);
                found += 1;
            } else {
                category_scores.insert(element.clone(), 0.0);
                issues.push(format!("missing component: {}", element));
            }
        }

        let raw_score = if required.is_empty() {
            Some(100.0)
        } else {
            Some(found as f64 / required.len() as f64 * 100.0)
        };
        let passed = found == required.len();

        GateResult {
            gate_name: spec.name.clone(),
            raw_score,
            passed,
            category_scores,
            issues,
            threshold: spec.threshold,
            retry_strategy: None,
        }
    }
}

/// Pulls the validator's own issue strings out of its output map.
fn collect_reported_issues(output: &Map<String, Value>) -> Vec<String> {
    output
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentKind;
    use crate::quality::RetryStrategy;
    use serde_json::json;

    fn weighted_spec(weights: &[(&str, f64)], threshold: f64) -> GateSpec {
        let weights = weights
            .iter()
            .map(|(name, w)| (name.to_string(), *w))
            .collect();
        GateSpec::weighted(
            "content_quality",
            AgentKind::ContentDepthValidator,
            weights,
            threshold,
            0.4,
            RetryStrategy::EnrichmentPass,
        )
    }

    fn output_with_scores(scores: Value) -> Map<String, Value> {
        let mut output = Map::new();
        output.insert("category_scores".to_string(), scores);
        output
    }

    #[test]
    fn test_weighted_score_standard_vector() {
        let spec = weighted_spec(
            &[
                ("depth", 0.30),
                ("examples", 0.20),
                ("procedure", 0.20),
                ("tone", 0.15),
                ("connections", 0.15),
            ],
            85.0,
        );
        let output = output_with_scores(json!({
            "depth": 90.0,
            "examples": 80.0,
            "procedure": 85.0,
            "tone": 95.0,
            "connections": 90.0,
        }));

        let result = GateEvaluator::new().evaluate(&spec, &output);
        let raw = result.raw_score.unwrap();
        assert!((raw - 87.75).abs() < 1e-9);
        assert!(result.passed);
        assert!(result.retry_strategy.is_none());
    }

    #[test]
    fn test_weighted_score_stays_in_range() {
        let spec = weighted_spec(&[("a", 0.5), ("b", 0.5)], 50.0);
        for (a, b) in [(0.0, 0.0), (0.0, 100.0), (100.0, 100.0), (37.5, 62.5)] {
            let output = output_with_scores(json!({ "a": a, "b": b }));
            let raw = GateEvaluator::new()
                .evaluate(&spec, &output)
                .raw_score
                .unwrap();
            assert!((0.0..=100.0).contains(&raw));
        }
    }

    #[test]
    fn test_weights_renormalize_over_present_categories() {
        // Two of ten categories present, weights 0.10 and 0.20, both scored
        // 100: the aggregate must renormalize to 100.
        let mut weights = vec![("present_a", 0.10), ("present_b", 0.20)];
        let absent = [
            "absent_0", "absent_1", "absent_2", "absent_3", "absent_4", "absent_5", "absent_6",
            "absent_7",
        ];
        for name in absent {
            weights.push((name, 0.0875));
        }
        let spec = weighted_spec(&weights, 85.0);
        let output = output_with_scores(json!({
            "present_a": 100.0,
            "present_b": 100.0,
        }));

        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!((result.raw_score.unwrap() - 100.0).abs() < 1e-9);
        assert!(result.passed);
    }

    #[test]
    fn test_category_scores_clamped_before_weighting() {
        let spec = weighted_spec(&[("depth", 1.0)], 85.0);
        let output = output_with_scores(json!({ "depth": 150.0 }));
        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!((result.raw_score.unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_boundary_passes() {
        let spec = weighted_spec(&[("depth", 1.0)], 85.0);
        let output = output_with_scores(json!({ "depth": 85.0 }));
        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!(result.passed);
    }

    #[test]
    fn test_failed_gate_carries_retry_strategy() {
        let spec = weighted_spec(&[("depth", 1.0)], 85.0);
        let output = output_with_scores(json!({ "depth": 60.0 }));
        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!(!result.passed);
        assert_eq!(result.retry_strategy, Some(RetryStrategy::EnrichmentPass));
        assert!(result
            .issues
            .iter()
            .any(|i| i.contains("below threshold")));
    }

    #[test]
    fn test_no_category_scores_yields_no_score() {
        let spec = weighted_spec(&[("depth", 1.0)], 85.0);
        let result = GateEvaluator::new().evaluate(&spec, &Map::new());
        assert!(result.raw_score.is_none());
        assert!(!result.passed);
        assert!(result.retry_strategy.is_some());
    }

    #[test]
    fn test_binary_gate_requires_all_components() {
        let spec = GateSpec::binary(
            "components",
            AgentKind::ComponentValidator,
            vec![
                "warmup".to_string(),
                "content".to_string(),
                "examples".to_string(),
                "handout".to_string(),
                "slides".to_string(),
            ],
            0.25,
            RetryStrategy::ComponentRegen,
        );

        let mut output = Map::new();
        output.insert(
            "present_components".to_string(),
            json!(["warmup", "content", "slides"]),
        );
        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!((result.raw_score.unwrap() - 60.0).abs() < 1e-9);
        assert!(!result.passed);
        assert_eq!(result.retry_strategy, Some(RetryStrategy::ComponentRegen));
        assert_eq!(
            result
                .issues
                .iter()
                .filter(|i| i.starts_with("missing component"))
                .count(),
            2
        );

        output.insert(
            "present_components".to_string(),
            json!(["warmup", "content", "examples", "handout", "slides"]),
        );
        let result = GateEvaluator::new().evaluate(&spec, &output);
        assert!((result.raw_score.unwrap() - 100.0).abs() < 1e-9);
        assert!(result.passed);
        assert!(result.retry_strategy.is_none());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let spec = weighted_spec(&[("depth", 0.6), ("tone", 0.4)], 80.0);
        let output = output_with_scores(json!({ "depth": 88.0, "tone": 92.0 }));

        let evaluator = GateEvaluator::new();
        let first = evaluator.evaluate(&spec, &output);
        let second = evaluator.evaluate(&spec, &output);
        assert_eq!(first.raw_score, second.raw_score);
        assert_eq!(first.passed, second.passed);
        assert_eq!(first.category_scores, second.category_scores);
    }
}
