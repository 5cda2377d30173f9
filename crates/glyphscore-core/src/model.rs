//! Core data model types for glyphscore.
//!
//! These are the values that cross the engine boundary: what a caller hands
//! in for one evaluation, and the immutable result it gets back.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::preprocess::RawImage;

/// Identifies what was drawn. Only used to personalize feedback text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterMeta {
    #[serde(default)]
    pub character_id: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
}

impl CharacterMeta {
    pub fn new(character_id: impl Into<String>, lesson_id: impl Into<String>) -> Self {
        Self {
            character_id: Some(character_id.into()),
            lesson_id: Some(lesson_id.into()),
        }
    }
}

/// Everything needed for a single evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    /// The learner's drawing.
    pub user: RawImage,
    /// The reference glyph rendering.
    pub reference: RawImage,
    pub meta: CharacterMeta,
    /// Overrides the configured passing score for this call only.
    pub passing_score: Option<u32>,
}

impl EvaluationRequest {
    pub fn new(user: RawImage, reference: RawImage) -> Self {
        Self {
            user,
            reference,
            meta: CharacterMeta::default(),
            passing_score: None,
        }
    }

    pub fn with_meta(mut self, meta: CharacterMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_passing_score(mut self, score: u32) -> Self {
        self.passing_score = Some(score);
        self
    }
}

/// Per-metric scores, each 0–100, all taken from the same canonical pair.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBreakdown {
    /// Mask IoU.
    pub shape_accuracy: f64,
    /// Edge-map correlation (stroke consistency).
    pub edge_match: f64,
    /// Bounding-box size agreement.
    pub proportion_accuracy: f64,
    /// Center-of-mass agreement.
    pub alignment_accuracy: f64,
}

impl MetricBreakdown {
    /// The four metrics in a fixed order: shape, edge, alignment, proportion.
    pub fn values(&self) -> [f64; 4] {
        [
            self.shape_accuracy,
            self.edge_match,
            self.alignment_accuracy,
            self.proportion_accuracy,
        ]
    }

    /// Round every metric to two decimals so serialized results are stable.
    pub fn rounded(self) -> Self {
        let r = |v: f64| (v * 100.0).round() / 100.0;
        Self {
            shape_accuracy: r(self.shape_accuracy),
            edge_match: r(self.edge_match),
            proportion_accuracy: r(self.proportion_accuracy),
            alignment_accuracy: r(self.alignment_accuracy),
        }
    }
}

/// How an evaluation concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationOutcome {
    /// All four metrics were computed and aggregated.
    Scored,
    /// The drawing did not pass the validity gate; no metric was computed.
    EmptyDrawing,
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationOutcome::Scored => write!(f, "scored"),
            EvaluationOutcome::EmptyDrawing => write!(f, "empty_drawing"),
        }
    }
}

/// The result of evaluating one drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    /// Overall score, 0–100.
    pub overall_score: u32,
    pub breakdown: MetricBreakdown,
    /// Agreement between the sub-metrics, 0.0–1.0.
    pub confidence: f64,
    /// `overall_score >= passing score`.
    pub is_correct: bool,
    pub feedback_message: String,
    /// Ordered, at most five entries.
    pub improvement_tips: Vec<String>,
    /// Decorative flavor line, chosen deterministically from the character id.
    #[serde(default)]
    pub encouragement: Option<String>,
    pub outcome: EvaluationOutcome,
}

impl EvaluationResult {
    pub fn is_empty_drawing(&self) -> bool {
        self.outcome == EvaluationOutcome::EmptyDrawing
    }
}

/// A drawing/reference pair with the score range it is expected to land in.
///
/// Calibration sets pin the scorer's behavior so weight or threshold changes
/// show up as regressions instead of silent drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationCase {
    /// Unique identifier for this case.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Path to the learner drawing (resolved against the set file).
    pub user_image: PathBuf,
    /// Path to the reference rendering (resolved against the set file).
    pub reference_image: PathBuf,
    #[serde(default)]
    pub meta: CharacterMeta,
    /// Per-case passing score override.
    #[serde(default)]
    pub passing_score: Option<u32>,
    /// Tags for filtering cases.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub expectations: Expectations,
}

/// What a calibration case expects from the scorer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectations {
    #[serde(default)]
    pub min_score: Option<u32>,
    #[serde(default)]
    pub max_score: Option<u32>,
    #[serde(default)]
    pub expect_correct: Option<bool>,
    /// The drawing should (or should not) trip the validity gate.
    #[serde(default)]
    pub expect_empty: Option<bool>,
}

impl Expectations {
    /// Returns `true` if nothing is asserted.
    pub fn is_empty(&self) -> bool {
        self.min_score.is_none()
            && self.max_score.is_none()
            && self.expect_correct.is_none()
            && self.expect_empty.is_none()
    }

    /// Describe every expectation the result violates.
    pub fn violations(&self, result: &EvaluationResult) -> Vec<String> {
        let mut violations = Vec::new();
        let score = result.overall_score;

        if let Some(min) = self.min_score {
            if score < min {
                violations.push(format!("score {score} is below min_score {min}"));
            }
        }
        if let Some(max) = self.max_score {
            if score > max {
                violations.push(format!("score {score} is above max_score {max}"));
            }
        }
        if let Some(expected) = self.expect_correct {
            if result.is_correct != expected {
                violations.push(format!(
                    "is_correct is {}, expected {expected}",
                    result.is_correct
                ));
            }
        }
        if let Some(expected) = self.expect_empty {
            if result.is_empty_drawing() != expected {
                violations.push(format!(
                    "outcome is {}, expected {}",
                    result.outcome,
                    if expected { "empty_drawing" } else { "scored" }
                ));
            }
        }

        violations
    }
}

/// A collection of calibration cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationSet {
    /// Unique identifier for this set.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cases: Vec<CalibrationCase>,
}

impl CalibrationSet {
    /// Keep only cases carrying at least one of `tags`. An empty list keeps everything.
    pub fn retain_tags(&mut self, tags: &[String]) {
        if tags.is_empty() {
            return;
        }
        self.cases.retain(|case| case.tags.iter().any(|t| tags.contains(t)));
    }
}
