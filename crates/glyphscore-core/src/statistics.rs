//! Aggregate statistics over a calibration run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::MetricBreakdown;
use crate::report::CaseOutcome;

/// Aggregate statistics across all outcomes of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationStats {
    pub total_cases: usize,
    /// Cases that produced a scored result.
    pub scored: usize,
    /// Cases that tripped the validity gate.
    pub empty_drawings: usize,
    /// Cases that failed to load or evaluate.
    pub errors: usize,
    /// Cases with a result and no violated expectation.
    pub expectations_met: usize,
    /// Mean overall score over scored cases.
    pub mean_score: f64,
    /// Mean confidence over scored cases.
    pub mean_confidence: f64,
    /// Fraction of cases with a result whose `is_correct` is true.
    pub pass_rate: f64,
    /// Per-metric means over scored cases.
    pub metric_means: MetricBreakdown,
    /// Breakdown by case tag.
    pub per_tag: BTreeMap<String, TagStats>,
}

impl CalibrationStats {
    /// Fraction of all cases that met their expectations.
    pub fn expectation_rate(&self) -> f64 {
        ratio(self.expectations_met, self.total_cases)
    }
}

/// Statistics for the cases sharing one tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub cases: usize,
    pub mean_score: f64,
    pub expectations_met: usize,
}

fn ratio(n: usize, d: usize) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Compute aggregate statistics from all outcomes.
pub fn compute_aggregate_stats(outcomes: &[CaseOutcome]) -> CalibrationStats {
    let results: Vec<_> = outcomes.iter().filter_map(|o| o.result.as_ref()).collect();
    let scored: Vec<_> = results
        .iter()
        .copied()
        .filter(|r| !r.is_empty_drawing())
        .collect();

    let metric_means = MetricBreakdown {
        shape_accuracy: mean(scored.iter().map(|r| r.breakdown.shape_accuracy)),
        edge_match: mean(scored.iter().map(|r| r.breakdown.edge_match)),
        proportion_accuracy: mean(scored.iter().map(|r| r.breakdown.proportion_accuracy)),
        alignment_accuracy: mean(scored.iter().map(|r| r.breakdown.alignment_accuracy)),
    };

    let mut tagged: BTreeMap<String, Vec<&CaseOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        for tag in &outcome.tags {
            tagged.entry(tag.clone()).or_default().push(outcome);
        }
    }
    let per_tag = tagged
        .into_iter()
        .map(|(tag, group)| {
            let stats = TagStats {
                cases: group.len(),
                mean_score: mean(group.iter().filter_map(|o| o.score()).map(f64::from)),
                expectations_met: group.iter().filter(|o| o.met_expectations()).count(),
            };
            (tag, stats)
        })
        .collect();

    CalibrationStats {
        total_cases: outcomes.len(),
        scored: scored.len(),
        empty_drawings: results.len() - scored.len(),
        errors: outcomes.iter().filter(|o| o.error.is_some()).count(),
        expectations_met: outcomes.iter().filter(|o| o.met_expectations()).count(),
        mean_score: mean(scored.iter().map(|r| f64::from(r.overall_score))),
        mean_confidence: mean(scored.iter().map(|r| r.confidence)),
        pass_rate: ratio(results.iter().filter(|r| r.is_correct).count(), results.len()),
        metric_means,
        per_tag,
    }
}
