//! Calibration report types with JSON persistence and regression detection.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EvaluatorConfig;
use crate::model::EvaluationResult;
use crate::statistics::CalibrationStats;

/// What happened to one calibration case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseOutcome {
    pub case_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// `None` when the case errored before a result was produced.
    pub result: Option<EvaluationResult>,
    /// Load or evaluation error, if any.
    #[serde(default)]
    pub error: Option<String>,
    /// Expectations the result did not meet.
    #[serde(default)]
    pub violations: Vec<String>,
    pub duration_ms: u64,
}

impl CaseOutcome {
    /// A case meets its expectations when it produced a result with no violations.
    pub fn met_expectations(&self) -> bool {
        self.result.is_some() && self.violations.is_empty()
    }

    pub fn score(&self) -> Option<u32> {
        self.result.as_ref().map(|r| r.overall_score)
    }
}

/// A complete calibration report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    /// Summary of the calibration set.
    pub calibration_set: CalibrationSetSummary,
    /// The scorer configuration the cases ran under.
    pub config: EvaluatorConfig,
    /// Per-case outcomes, in case order.
    pub outcomes: Vec<CaseOutcome>,
    /// Aggregate statistics.
    pub aggregate: CalibrationStats,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Summary of a calibration set (without the full case definitions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSetSummary {
    pub id: String,
    pub name: String,
    pub case_count: usize,
}

impl CalibrationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: CalibrationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Compare this report against a baseline.
    ///
    /// A case regresses when its score drops by more than `threshold` points,
    /// or when it met its expectations in the baseline and no longer does.
    /// Errored cases count as a score of 0.
    pub fn compare(&self, baseline: &CalibrationReport, threshold: f64) -> RegressionReport {
        let index = |report: &CalibrationReport| -> HashMap<String, (f64, bool)> {
            report
                .outcomes
                .iter()
                .map(|o| {
                    let score = o.score().map_or(0.0, f64::from);
                    (o.case_id.clone(), (score, o.met_expectations()))
                })
                .collect()
        };

        let baseline_scores = index(baseline);

        let mut regressions = Vec::new();
        let mut improvements = Vec::new();
        let mut newly_failing = Vec::new();
        let mut unchanged = 0usize;
        let mut new_cases = 0usize;

        // Walk the current outcomes in order so the output is stable.
        for outcome in &self.outcomes {
            let Some(&(baseline_score, baseline_met)) = baseline_scores.get(&outcome.case_id)
            else {
                new_cases += 1;
                continue;
            };

            let current = outcome.score().map_or(0.0, f64::from);
            let delta = current - baseline_score;
            let change = ScoreChange {
                case_id: outcome.case_id.clone(),
                baseline_score,
                current_score: current,
                delta,
            };

            if baseline_met && !outcome.met_expectations() {
                newly_failing.push(outcome.case_id.clone());
            }

            if delta < -threshold {
                regressions.push(change);
            } else if delta > threshold {
                improvements.push(change);
            } else {
                unchanged += 1;
            }
        }

        let current_ids: HashSet<&str> = self
            .outcomes
            .iter()
            .map(|o| o.case_id.as_str())
            .collect();
        let removed_cases = baseline
            .outcomes
            .iter()
            .filter(|o| !current_ids.contains(o.case_id.as_str()))
            .count();

        RegressionReport {
            regressions,
            improvements,
            unchanged,
            new_cases,
            removed_cases,
            newly_failing,
        }
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Cases where the score went down.
    pub regressions: Vec<ScoreChange>,
    /// Cases where the score went up.
    pub improvements: Vec<ScoreChange>,
    /// Cases with no significant change.
    pub unchanged: usize,
    /// Cases in current but not baseline.
    pub new_cases: usize,
    /// Cases in baseline but not current.
    pub removed_cases: usize,
    /// Cases that met their expectations in the baseline but not anymore.
    #[serde(default)]
    pub newly_failing: Vec<String>,
}

/// A score difference for one case between two reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreChange {
    pub case_id: String,
    pub baseline_score: f64,
    pub current_score: f64,
    pub delta: f64,
}

impl RegressionReport {
    /// Format the regression report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Summary:** {} regressions, {} improvements, {} unchanged, {} new, {} removed\n\n",
            self.regressions.len(),
            self.improvements.len(),
            self.unchanged,
            self.new_cases,
            self.removed_cases,
        ));

        if !self.regressions.is_empty() {
            md.push_str("### Regressions\n\n");
            md.push_str("| Case | Baseline | Current | Delta |\n");
            md.push_str("|------|----------|---------|-------|\n");
            for r in &self.regressions {
                md.push_str(&format!(
                    "| {} | {:.0} | {:.0} | {:.0} |\n",
                    r.case_id, r.baseline_score, r.current_score, r.delta
                ));
            }
            md.push('\n');
        }

        if !self.newly_failing.is_empty() {
            md.push_str("### Newly failing expectations\n\n");
            for case_id in &self.newly_failing {
                md.push_str(&format!("- {case_id}\n"));
            }
            md.push('\n');
        }

        if !self.improvements.is_empty() {
            md.push_str("### Improvements\n\n");
            md.push_str("| Case | Baseline | Current | Delta |\n");
            md.push_str("|------|----------|---------|-------|\n");
            for i in &self.improvements {
                md.push_str(&format!(
                    "| {} | {:.0} | {:.0} | +{:.0} |\n",
                    i.case_id, i.baseline_score, i.current_score, i.delta
                ));
            }
        }

        md
    }

    /// Returns true if any score dropped or any expectation started failing.
    pub fn has_regressions(&self) -> bool {
        !self.regressions.is_empty() || !self.newly_failing.is_empty()
    }
}
