//! Cross-gate score aggregation, deductions, and final status.
//!
//! Combines the validation phase's gate results into one pipeline-level
//! score, subtracts points for discrete formatting violations, applies
//! automatic-fail overrides, and derives the final status.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::gate::GateResult;

/// Score at or above which the pipeline passes outright.
pub const DEFAULT_PASS_THRESHOLD: f64 = 90.0;

/// Score at or above which the pipeline needs revision instead of failing.
pub const DEFAULT_REVISION_THRESHOLD: f64 = 80.0;

/// Most repeats of a single violation before it forfeits the whole score.
pub const MAX_VIOLATION_COUNT: u32 = 3;

/// Pipeline-level validation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStatus {
    /// Score met the pass threshold with no overrides.
    Pass,
    /// Score fell in the revision band.
    NeedsRevision,
    /// Score fell below the revision band, or an override fired.
    Fail,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineStatus::Pass => write!(f, "PASS"),
            PipelineStatus::NeedsRevision => write!(f, "NEEDS_REVISION"),
            PipelineStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Status band for one entry of the score breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CategoryStatus {
    /// Raw score at or above 80.
    Pass,
    /// Raw score in the 60-80 band.
    Warn,
    /// Raw score below 60.
    Fail,
}

impl CategoryStatus {
    /// Maps a raw score to its status band.
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            CategoryStatus::Pass
        } else if score >= 60.0 {
            CategoryStatus::Warn
        } else {
            CategoryStatus::Fail
        }
    }
}

/// Discrete formatting violations that carry point deductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// A slide body exceeds the per-slide character limit.
    CharLimitExceeded,
    /// A slide is missing its presenter tip.
    MissingTip,
    /// A handout source is not cited.
    MissingCitation,
    /// Unfilled template markers left in prose.
    PlaceholderText,
}

impl ViolationKind {
    /// Points deducted per occurrence of this violation.
    pub fn points(&self) -> f64 {
        match self {
            ViolationKind::CharLimitExceeded => 3.0,
            ViolationKind::MissingTip => 5.0,
            ViolationKind::MissingCitation => 2.0,
            ViolationKind::PlaceholderText => 4.0,
        }
    }

    /// Returns the wire label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            ViolationKind::CharLimitExceeded => "char_limit_exceeded",
            ViolationKind::MissingTip => "missing_tip",
            ViolationKind::MissingCitation => "missing_citation",
            ViolationKind::PlaceholderText => "placeholder_text",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One discrete violation, with an occurrence count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    /// What was violated.
    pub kind: ViolationKind,
    /// How many times it occurred.
    #[serde(default = "default_violation_count")]
    pub count: u32,
    /// Optional location or explanation.
    pub detail: Option<String>,
}

fn default_violation_count() -> u32 {
    1
}

impl Violation {
    /// Creates a single-occurrence violation.
    pub fn new(kind: ViolationKind) -> Self {
        Self {
            kind,
            count: 1,
            detail: None,
        }
    }

    /// Builder method to set the occurrence count.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Builder method to attach a detail string.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Points this violation deducts from the pipeline score.
    ///
    /// A count past `MAX_VIOLATION_COUNT` forfeits the full 100-point scale.
    pub fn deduction(&self) -> f64 {
        if self.count > MAX_VIOLATION_COUNT {
            100.0
        } else {
            self.kind.points() * f64::from(self.count)
        }
    }
}

/// Override flags that force the pipeline status to FAIL.
///
/// Each flag is independent and carries its reason; any true flag overrides
/// the numeric score.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoFailConditions {
    /// A required artifact is absent from the package.
    pub missing_required_artifact: bool,
    /// Total formatting violations exceed the allowed count.
    pub excessive_formatting_violations: bool,
    /// A required structural element (sections, slides) is empty.
    pub missing_structural_element: bool,
    /// Human-readable reasons for every raised flag.
    pub reasons: Vec<String>,
}

impl AutoFailConditions {
    /// Creates conditions with no flags raised.
    pub fn none() -> Self {
        Self::default()
    }

    /// Flags a missing required artifact.
    pub fn flag_missing_artifact(&mut self, reason: impl Into<String>) {
        self.missing_required_artifact = true;
        self.reasons.push(reason.into());
    }

    /// Flags an excessive number of formatting violations.
    pub fn flag_excessive_violations(&mut self, reason: impl Into<String>) {
        self.excessive_formatting_violations = true;
        self.reasons.push(reason.into());
    }

    /// Flags a missing structural element.
    pub fn flag_missing_structure(&mut self, reason: impl Into<String>) {
        self.missing_structural_element = true;
        self.reasons.push(reason.into());
    }

    /// Returns true if any flag is raised.
    pub fn any(&self) -> bool {
        self.missing_required_artifact
            || self.excessive_formatting_violations
            || self.missing_structural_element
    }
}

/// One row of the per-gate score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBreakdownItem {
    /// Gate the row describes.
    pub category: String,
    /// The gate's raw score.
    pub raw_score: f64,
    /// Renormalized weight over the gates that produced a score.
    pub weight: f64,
    /// `raw_score * weight`.
    pub weighted_contribution: f64,
    /// Status band for the raw score.
    pub status: CategoryStatus,
}

/// Full aggregation output for one validation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateReport {
    /// Cross-gate weighted score before deductions.
    pub weighted_score: f64,
    /// Score after deductions, floored at 0.
    pub final_score: f64,
    /// Final status after overrides.
    pub status: PipelineStatus,
    /// Per-gate contribution rows.
    pub breakdown: Vec<ScoreBreakdownItem>,
    /// Points removed by deductions.
    pub deductions_applied: f64,
    /// The violations that drove the deductions.
    pub violations: Vec<Violation>,
    /// Override flags considered for this round.
    pub auto_fail: AutoFailConditions,
}

impl AggregateReport {
    /// Returns true if the round passed.
    pub fn is_pass(&self) -> bool {
        self.status == PipelineStatus::Pass
    }
}

/// Subtracts violation deductions from `score`, flooring at 0.
pub fn apply_deductions(score: f64, violations: &[Violation]) -> f64 {
    let total: f64 = violations.iter().map(Violation::deduction).sum();
    (score - total).max(0.0)
}

/// Maps a final score and override flag to a pipeline status using the
/// default thresholds.
pub fn determine_status(score: f64, auto_fail: bool) -> PipelineStatus {
    if auto_fail {
        PipelineStatus::Fail
    } else if score >= DEFAULT_PASS_THRESHOLD {
        PipelineStatus::Pass
    } else if score >= DEFAULT_REVISION_THRESHOLD {
        PipelineStatus::NeedsRevision
    } else {
        PipelineStatus::Fail
    }
}

/// Combines gate results into a pipeline-level verdict.
#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    gate_weights: BTreeMap<String, f64>,
    pass_threshold: f64,
    revision_threshold: f64,
}

impl ScoreAggregator {
    /// Creates an aggregator over the given gate-name-to-weight table.
    pub fn new(gate_weights: BTreeMap<String, f64>) -> Self {
        Self {
            gate_weights,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            revision_threshold: DEFAULT_REVISION_THRESHOLD,
        }
    }

    /// Builder method to override the status thresholds.
    pub fn with_status_thresholds(mut self, pass: f64, revision: f64) -> Self {
        self.pass_threshold = pass;
        self.revision_threshold = revision;
        self
    }

    /// Weighted cross-gate score, renormalized over the gates that produced
    /// a score. Raw scores are clamped to [0,100] before weighting.
    pub fn cross_gate_score(&self, results: &[GateResult]) -> f64 {
        let mut weighted_sum = 0.0;
        let mut weight_present = 0.0;

        for result in results {
            let Some(raw) = result.raw_score else {
                continue;
            };
            let weight = self
                .gate_weights
                .get(&result.gate_name)
                .copied()
                .unwrap_or(0.0);
            if weight > 0.0 {
                weighted_sum += raw.clamp(0.0, 100.0) * weight;
                weight_present += weight;
            }
        }

        if weight_present > 0.0 {
            (weighted_sum / weight_present).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }

    /// Per-gate breakdown rows with renormalized weights, so contributions
    /// sum to the cross-gate score.
    pub fn breakdown(&self, results: &[GateResult]) -> Vec<ScoreBreakdownItem> {
        let weight_present: f64 = results
            .iter()
            .filter(|r| r.raw_score.is_some())
            .filter_map(|r| self.gate_weights.get(&r.gate_name))
            .sum();
        if weight_present <= 0.0 {
            return Vec::new();
        }

        results
            .iter()
            .filter_map(|result| {
                let raw = result.raw_score?.clamp(0.0, 100.0);
                let weight =
                    self.gate_weights.get(&result.gate_name).copied().unwrap_or(0.0)
                        / weight_present;
                Some(ScoreBreakdownItem {
                    category: result.gate_name.clone(),
                    raw_score: raw,
                    weight,
                    weighted_contribution: raw * weight,
                    status: CategoryStatus::from_score(raw),
                })
            })
            .collect()
    }

    /// Runs the full aggregation: cross-gate score, deductions, overrides,
    /// and status determination.
    ///
    /// The aggregator raises the excessive-violations flag itself when the
    /// total violation count passes `MAX_VIOLATION_COUNT`.
    pub fn aggregate(
        &self,
        results: &[GateResult],
        violations: &[Violation],
        mut auto_fail: AutoFailConditions,
    ) -> AggregateReport {
        let weighted_score = self.cross_gate_score(results);

        let total_count: u32 = violations.iter().map(|v| v.count).sum();
        if total_count > MAX_VIOLATION_COUNT {
            auto_fail.flag_excessive_violations(format!(
                "{} formatting violations exceed the allowed {}",
                total_count, MAX_VIOLATION_COUNT
            ));
        }

        let final_score = apply_deductions(weighted_score, violations);
        let status = if auto_fail.any() {
            PipelineStatus::Fail
        } else if final_score >= self.pass_threshold {
            PipelineStatus::Pass
        } else if final_score >= self.revision_threshold {
            PipelineStatus::NeedsRevision
        } else {
            PipelineStatus::Fail
        };

        debug!(
            weighted_score,
            final_score,
            status = %status,
            violations = total_count,
            "pipeline score aggregated"
        );

        AggregateReport {
            weighted_score,
            final_score,
            status,
            breakdown: self.breakdown(results),
            deductions_applied: weighted_score - final_score,
            violations: violations.to_vec(),
            auto_fail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(name: &str, raw: Option<f64>) -> GateResult {
        GateResult {
            gate_name: name.to_string(),
            raw_score: raw,
            passed: raw.map(|s| s >= 80.0).unwrap_or(false),
            category_scores: BTreeMap::new(),
            issues: Vec::new(),
            threshold: 80.0,
            retry_strategy: None,
        }
    }

    fn weights(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries
            .iter()
            .map(|(name, w)| (name.to_string(), *w))
            .collect()
    }

    #[test]
    fn test_determine_status_thresholds() {
        assert_eq!(determine_status(90.0, false), PipelineStatus::Pass);
        assert_eq!(determine_status(89.999, false), PipelineStatus::NeedsRevision);
        assert_eq!(determine_status(80.0, false), PipelineStatus::NeedsRevision);
        assert_eq!(determine_status(79.999, false), PipelineStatus::Fail);
    }

    #[test]
    fn test_determine_status_override_wins() {
        assert_eq!(determine_status(100.0, true), PipelineStatus::Fail);
    }

    #[test]
    fn test_apply_deductions_single_violation() {
        let violations = vec![Violation::new(ViolationKind::CharLimitExceeded)];
        assert!((apply_deductions(95.0, &violations) - 92.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_deductions_two_violations() {
        let violations = vec![
            Violation::new(ViolationKind::CharLimitExceeded),
            Violation::new(ViolationKind::MissingTip),
        ];
        assert!((apply_deductions(95.0, &violations) - 87.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_deductions_forfeits_on_excessive_count() {
        let violations = vec![Violation::new(ViolationKind::CharLimitExceeded).with_count(20)];
        assert!((apply_deductions(95.0, &violations) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_deductions_monotonic_and_floored() {
        let mut violations = Vec::new();
        let mut last = apply_deductions(95.0, &violations);
        for _ in 0..25 {
            violations.push(Violation::new(ViolationKind::MissingTip));
            let next = apply_deductions(95.0, &violations);
            assert!(next <= last);
            assert!(next >= 0.0);
            last = next;
        }
        assert!((last - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_gate_score_renormalizes_over_present_gates() {
        let aggregator = ScoreAggregator::new(weights(&[
            ("content_quality", 0.40),
            ("components", 0.25),
            ("timing_fit", 0.15),
            ("slide_format", 0.20),
        ]));

        // The timing gate produced no score; the rest scored 100.
        let results = vec![
            gate("content_quality", Some(100.0)),
            gate("components", Some(100.0)),
            gate("timing_fit", None),
            gate("slide_format", Some(100.0)),
        ];
        let score = aggregator.cross_gate_score(&results);
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_gate_score_weighted_mix() {
        let aggregator =
            ScoreAggregator::new(weights(&[("a", 0.75), ("b", 0.25)]));
        let results = vec![gate("a", Some(80.0)), gate("b", Some(100.0))];
        assert!((aggregator.cross_gate_score(&results) - 85.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_gate_score_empty_is_zero() {
        let aggregator = ScoreAggregator::new(weights(&[("a", 1.0)]));
        assert!((aggregator.cross_gate_score(&[]) - 0.0).abs() < 1e-9);
        assert!((aggregator.cross_gate_score(&[gate("a", None)]) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_breakdown_statuses() {
        let aggregator = ScoreAggregator::new(weights(&[
            ("a", 0.4),
            ("b", 0.4),
            ("c", 0.2),
        ]));
        let results = vec![
            gate("a", Some(85.0)),
            gate("b", Some(70.0)),
            gate("c", Some(50.0)),
        ];
        let breakdown = aggregator.breakdown(&results);
        assert_eq!(breakdown.len(), 3);
        assert_eq!(breakdown[0].status, CategoryStatus::Pass);
        assert_eq!(breakdown[1].status, CategoryStatus::Warn);
        assert_eq!(breakdown[2].status, CategoryStatus::Fail);

        let contribution_sum: f64 = breakdown.iter().map(|i| i.weighted_contribution).sum();
        assert!((contribution_sum - aggregator.cross_gate_score(&results)).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_passes_clean_round() {
        let aggregator = ScoreAggregator::new(weights(&[("a", 0.5), ("b", 0.5)]));
        let results = vec![gate("a", Some(95.0)), gate("b", Some(93.0))];
        let report = aggregator.aggregate(&results, &[], AutoFailConditions::none());
        assert_eq!(report.status, PipelineStatus::Pass);
        assert!(report.is_pass());
        assert!((report.deductions_applied - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_raises_excessive_violations_flag() {
        let aggregator = ScoreAggregator::new(weights(&[("a", 1.0)]));
        let results = vec![gate("a", Some(98.0))];
        let violations = vec![
            Violation::new(ViolationKind::CharLimitExceeded).with_count(2),
            Violation::new(ViolationKind::MissingCitation).with_count(2),
        ];
        let report = aggregator.aggregate(&results, &violations, AutoFailConditions::none());
        assert!(report.auto_fail.excessive_formatting_violations);
        assert_eq!(report.status, PipelineStatus::Fail);
    }

    #[test]
    fn test_aggregate_override_forces_fail() {
        let aggregator = ScoreAggregator::new(weights(&[("a", 1.0)]));
        let results = vec![gate("a", Some(100.0))];
        let mut auto_fail = AutoFailConditions::none();
        auto_fail.flag_missing_artifact("handout absent from package");
        let report = aggregator.aggregate(&results, &[], auto_fail);
        assert_eq!(report.status, PipelineStatus::Fail);
        assert_eq!(report.auto_fail.reasons.len(), 1);
    }

    #[test]
    fn test_aggregate_revision_band() {
        let aggregator = ScoreAggregator::new(weights(&[("a", 1.0)]));
        let results = vec![gate("a", Some(88.0))];
        let report = aggregator.aggregate(&results, &[], AutoFailConditions::none());
        assert_eq!(report.status, PipelineStatus::NeedsRevision);
    }

    #[test]
    fn test_violation_roundtrip_with_default_count() {
        let parsed: Violation =
            serde_json::from_value(serde_json::json!({"kind": "missing_tip", "detail": null}))
                .unwrap();
        assert_eq!(parsed.count, 1);
        assert_eq!(parsed.kind, ViolationKind::MissingTip);
    }
}
