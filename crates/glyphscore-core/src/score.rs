//! Combining sub-metrics into the overall score and confidence.

use serde::{Deserialize, Serialize};

use crate::config::EvaluatorConfig;
use crate::model::MetricBreakdown;

/// Confidence never drops below this, however much the metrics disagree.
pub const MIN_CONFIDENCE: f64 = 0.5;
/// Confidence never rises above this, even for perfect agreement.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Output of [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    /// 0–100.
    pub overall_score: u32,
    pub confidence: f64,
    /// Multiplier applied for ink density (1.0 when none applied).
    pub penalty: f64,
}

/// Weighted sum of the four metrics, density penalty, rounding.
pub fn aggregate(
    breakdown: &MetricBreakdown,
    ink_density: f64,
    config: &EvaluatorConfig,
) -> Aggregate {
    let w = &config.weights;
    let weighted = breakdown.shape_accuracy * w.shape
        + breakdown.edge_match * w.edge
        + breakdown.alignment_accuracy * w.alignment
        + breakdown.proportion_accuracy * w.proportion;

    let penalty = density_penalty(ink_density, config);
    let overall_score = (weighted * penalty).round().clamp(0.0, 100.0) as u32;

    Aggregate {
        overall_score,
        confidence: confidence(&breakdown.values()),
        penalty,
    }
}

/// Multiplier for drawings that are too faint or scribbled over the canvas.
pub fn density_penalty(ink_density: f64, config: &EvaluatorConfig) -> f64 {
    if ink_density < config.faint_density {
        config.faint_penalty
    } else if ink_density > config.saturated_density {
        config.saturated_penalty
    } else {
        1.0
    }
}

/// `clamp(1 - stddev(metrics) / 100, 0.5, 0.95)`, population stddev.
pub fn confidence(metrics: &[f64]) -> f64 {
    if metrics.is_empty() {
        return MIN_CONFIDENCE;
    }
    let n = metrics.len() as f64;
    let mean = metrics.iter().sum::<f64>() / n;
    let variance = metrics.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / n;
    (1.0 - variance.sqrt() / 100.0).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}
