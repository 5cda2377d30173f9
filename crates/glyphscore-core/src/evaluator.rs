//! The evaluation pipeline.
//!
//! raw → canonical → binary mask → geometry → shape / edge metrics →
//! aggregate → feedback. Every stage is a pure function of its inputs; the
//! evaluator itself only holds its immutable configuration, so one instance
//! can serve any number of threads.

use tracing::{debug, error, instrument, warn};

use crate::config::EvaluatorConfig;
use crate::edge::{edge_correlation, edge_map};
use crate::error::EvalError;
use crate::feedback::{empty_drawing_feedback, feedback};
use crate::model::{
    CharacterMeta, EvaluationOutcome, EvaluationRequest, EvaluationResult, MetricBreakdown,
};
use crate::preprocess::{binarize, normalize, BinaryMask, CanonicalImage};
use crate::score::{aggregate, confidence};
use crate::shape::shape_accuracy;
use crate::spatial::{
    alignment_accuracy, bounds, center_of_mass, ink_count, ink_density, proportion_accuracy,
};

/// Scores drawings against reference glyphs.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: EvaluatorConfig,
}

impl Evaluator {
    /// Build an evaluator from a trusted configuration.
    ///
    /// The configuration is not validated; weights that do not sum to 1.0 or
    /// out-of-range penalties produce clamped scores. Use [`Evaluator::try_new`]
    /// for configuration that comes from outside the program.
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    /// Build an evaluator, rejecting an invalid configuration.
    pub fn try_new(config: EvaluatorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Evaluate a drawing against its reference.
    ///
    /// Returns `Err` only for unusable input or internal inconsistencies. An
    /// empty drawing is a normal result with a zero score.
    #[instrument(skip_all, fields(character_id = ?request.meta.character_id))]
    pub fn evaluate(&self, request: EvaluationRequest) -> Result<EvaluationResult, EvalError> {
        let EvaluationRequest {
            user,
            reference,
            meta,
            passing_score,
        } = request;

        let user = normalize(user)?;
        let reference = normalize(reference)?;
        self.evaluate_canonical(&user, &reference, &meta, passing_score)
    }

    /// Evaluate images that are already in canonical form.
    pub fn evaluate_canonical(
        &self,
        user: &CanonicalImage,
        reference: &CanonicalImage,
        meta: &CharacterMeta,
        passing_score: Option<u32>,
    ) -> Result<EvaluationResult, EvalError> {
        let threshold = self.config.ink_threshold;
        let user_mask = binarize(user, threshold);
        let reference_mask = binarize(reference, threshold);

        let user_ink = ink_count(&user_mask);
        if user_ink <= self.config.min_ink_pixels {
            debug!(
                user_ink,
                floor = self.config.min_ink_pixels,
                "drawing below validity floor"
            );
            return Ok(empty_drawing_result());
        }

        let breakdown = self
            .compute_breakdown(user, reference, &user_mask, &reference_mask)
            .inspect_err(|e| error!("metric computation failed: {e}"))?
            .rounded();

        let density = ink_density(&user_mask);
        let aggregate = aggregate(&breakdown, density, &self.config);
        let passing = passing_score.unwrap_or(self.config.passing_score);
        let feedback = feedback(
            aggregate.overall_score,
            &breakdown,
            density,
            &self.config,
            meta,
        );

        debug!(
            score = aggregate.overall_score,
            shape = breakdown.shape_accuracy,
            edge = breakdown.edge_match,
            alignment = breakdown.alignment_accuracy,
            proportion = breakdown.proportion_accuracy,
            density,
            penalty = aggregate.penalty,
            "evaluation scored"
        );

        Ok(EvaluationResult {
            overall_score: aggregate.overall_score,
            breakdown,
            confidence: aggregate.confidence,
            is_correct: aggregate.overall_score >= passing,
            feedback_message: feedback.message,
            improvement_tips: feedback.tips,
            encouragement: feedback.encouragement,
            outcome: EvaluationOutcome::Scored,
        })
    }

    fn compute_breakdown(
        &self,
        user: &CanonicalImage,
        reference: &CanonicalImage,
        user_mask: &BinaryMask,
        reference_mask: &BinaryMask,
    ) -> Result<MetricBreakdown, EvalError> {
        if ink_count(reference_mask) == 0 {
            warn!("reference glyph has no ink; shape and proportion will score 0");
        }

        let shape_accuracy = shape_accuracy(user_mask, reference_mask, self.config.min_overlap)?;
        let edge_match = edge_correlation(&edge_map(user), &edge_map(reference))?;
        let alignment_accuracy =
            alignment_accuracy(&center_of_mass(user_mask), &center_of_mass(reference_mask));
        let proportion_accuracy = proportion_accuracy(&bounds(user_mask), &bounds(reference_mask));

        Ok(MetricBreakdown {
            shape_accuracy,
            edge_match,
            proportion_accuracy,
            alignment_accuracy,
        })
    }
}

/// The zero-score result for a drawing that failed the validity gate.
fn empty_drawing_result() -> EvaluationResult {
    let breakdown = MetricBreakdown::default();
    let feedback = empty_drawing_feedback();
    EvaluationResult {
        overall_score: 0,
        breakdown,
        confidence: confidence(&breakdown.values()),
        is_correct: false,
        feedback_message: feedback.message,
        improvement_tips: feedback.tips,
        encouragement: feedback.encouragement,
        outcome: EvaluationOutcome::EmptyDrawing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::EMPTY_DRAWING_MESSAGE;
    use crate::preprocess::{PixelFormat, RawImage, CANONICAL_SIZE};

    type Segment = ((f64, f64), (f64, f64));

    /// A "田"-like glyph: outer square plus a cross.
    const GRID_GLYPH: &[Segment] = &[
        ((28.0, 28.0), (100.0, 28.0)),
        ((100.0, 28.0), (100.0, 100.0)),
        ((100.0, 100.0), (28.0, 100.0)),
        ((28.0, 100.0), (28.0, 28.0)),
        ((28.0, 64.0), (100.0, 64.0)),
        ((64.0, 28.0), (64.0, 100.0)),
    ];

    /// A large square outline close to the canvas border.
    const FRAME_GLYPH: &[Segment] = &[
        ((8.0, 8.0), (119.0, 8.0)),
        ((119.0, 8.0), (119.0, 119.0)),
        ((119.0, 119.0), (8.0, 119.0)),
        ((8.0, 119.0), (8.0, 8.0)),
    ];

    const PEN_RADIUS: f64 = 5.0;

    fn segment_distance((x, y): (f64, f64), ((x0, y0), (x1, y1)): Segment) -> f64 {
        let (dx, dy) = (x1 - x0, y1 - y0);
        let len2 = dx * dx + dy * dy;
        let t = if len2 == 0.0 {
            0.0
        } else {
            (((x - x0) * dx + (y - y0) * dy) / len2).clamp(0.0, 1.0)
        };
        (x - (x0 + t * dx)).hypot(y - (y0 + t * dy))
    }

    fn raster(mut ink: impl FnMut(f64, f64) -> bool) -> RawImage {
        let mut data = Vec::with_capacity((CANONICAL_SIZE * CANONICAL_SIZE * 4) as usize);
        for y in 0..CANONICAL_SIZE {
            for x in 0..CANONICAL_SIZE {
                let v = if ink(x as f64, y as f64) { 0 } else { 255 };
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        RawImage::new(CANONICAL_SIZE, CANONICAL_SIZE, data, PixelFormat::Rgba8)
    }

    /// Draw `segments` with the pen, scaled about the canvas center and
    /// shifted horizontally by `dx`.
    fn draw(segments: &[Segment], scale: f64, dx: f64) -> RawImage {
        let c = 64.0;
        let map = |(x, y): (f64, f64)| (c + (x - c) * scale + dx, c + (y - c) * scale);
        let placed: Vec<Segment> = segments.iter().map(|(a, b)| (map(*a), map(*b))).collect();
        raster(|x, y| {
            placed
                .iter()
                .any(|s| segment_distance((x, y), *s) <= PEN_RADIUS)
        })
    }

    fn white_canvas() -> RawImage {
        raster(|_, _| false)
    }

    fn evaluate(user: RawImage, reference: RawImage) -> EvaluationResult {
        Evaluator::default()
            .evaluate(EvaluationRequest::new(user, reference))
            .unwrap()
    }

    #[test]
    fn blank_canvas_scores_zero() {
        let result = evaluate(white_canvas(), draw(GRID_GLYPH, 1.0, 0.0));
        assert_eq!(result.overall_score, 0);
        assert!(!result.is_correct);
        assert_eq!(result.outcome, EvaluationOutcome::EmptyDrawing);
        assert_eq!(result.feedback_message, EMPTY_DRAWING_MESSAGE);
        assert!(result
            .feedback_message
            .to_lowercase()
            .contains("please draw before submitting"));
        assert_eq!(result.breakdown, MetricBreakdown::default());
    }

    #[test]
    fn sparse_scribble_is_below_validity_floor() {
        // 5x5 dot: 25 ink pixels.
        let dot = raster(|x, y| (60.0..65.0).contains(&x) && (60.0..65.0).contains(&y));
        let result = evaluate(dot, draw(GRID_GLYPH, 1.0, 0.0));
        assert!(result.is_empty_drawing());
        assert_eq!(result.overall_score, 0);
    }

    #[test]
    fn validity_floor_is_exclusive() {
        // A block of exactly `n` ink pixels, ten per row.
        let block = |n: usize| {
            raster(|x, y| {
                let (col, row) = (x as usize, y as usize);
                (60..70).contains(&col) && row >= 60 && (row - 60) * 10 + (col - 60) < n
            })
        };
        let reference = draw(GRID_GLYPH, 1.0, 0.0);

        for n in [99, 100] {
            let result = evaluate(block(n), reference.clone());
            assert!(result.is_empty_drawing(), "{n} ink pixels should be empty");
            assert_eq!(result.overall_score, 0);
        }
        let result = evaluate(block(101), reference);
        assert_eq!(result.outcome, EvaluationOutcome::Scored);
    }

    #[test]
    fn try_new_rejects_invalid_config() {
        let unbalanced = EvaluatorConfig {
            weights: crate::config::MetricWeights {
                shape: 0.9,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = Evaluator::try_new(unbalanced).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));

        let nan_penalty = EvaluatorConfig {
            faint_penalty: f64::NAN,
            ..Default::default()
        };
        assert!(Evaluator::try_new(nan_penalty).is_err());
        assert!(Evaluator::try_new(EvaluatorConfig::default()).is_ok());
    }

    #[test]
    fn empty_drawing_is_never_correct_even_with_zero_passing_score() {
        let request = EvaluationRequest::new(white_canvas(), draw(GRID_GLYPH, 1.0, 0.0))
            .with_passing_score(0);
        let result = Evaluator::default().evaluate(request).unwrap();
        assert!(!result.is_correct);
    }

    #[test]
    fn identical_copy_scores_at_maximum() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let result = evaluate(reference.clone(), reference);
        assert_eq!(result.breakdown.shape_accuracy, 100.0);
        assert_eq!(result.breakdown.edge_match, 100.0);
        assert_eq!(result.breakdown.alignment_accuracy, 100.0);
        assert_eq!(result.breakdown.proportion_accuracy, 100.0);
        assert!(result.overall_score >= 85, "got {}", result.overall_score);
        assert!(result.is_correct);
        assert_eq!(result.outcome, EvaluationOutcome::Scored);
        assert!(result.feedback_message.starts_with("Excellent"));
        assert!(result.improvement_tips.len() <= 5);
    }

    #[test]
    fn off_center_drawing_loses_alignment() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let centered = evaluate(reference.clone(), reference.clone());
        let shift = CANONICAL_SIZE as f64 * 0.4;
        let shifted = evaluate(draw(GRID_GLYPH, 1.0, shift), reference);

        assert!(
            shifted.breakdown.alignment_accuracy < centered.breakdown.alignment_accuracy - 30.0,
            "alignment {} vs {}",
            shifted.breakdown.alignment_accuracy,
            centered.breakdown.alignment_accuracy
        );
        assert!(shifted.overall_score < centered.overall_score);
        assert!(shifted
            .improvement_tips
            .iter()
            .any(|t| t.contains("Center your drawing")));
    }

    #[test]
    fn tiny_drawing_loses_proportion() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let full = evaluate(reference.clone(), reference.clone());
        let tiny = evaluate(draw(GRID_GLYPH, 0.1, 0.0), reference);

        assert_eq!(tiny.outcome, EvaluationOutcome::Scored);
        assert!(
            tiny.breakdown.proportion_accuracy < full.breakdown.proportion_accuracy - 50.0,
            "proportion {}",
            tiny.breakdown.proportion_accuracy
        );
        assert!(tiny.overall_score < full.overall_score);
        // Same center, so alignment stays high.
        assert!(tiny.breakdown.alignment_accuracy > 90.0);
    }

    #[test]
    fn filled_drawing_is_penalized_for_saturation() {
        let reference = draw(FRAME_GLYPH, 1.0, 0.0);
        let filled = raster(|x, y| (3.0..=124.0).contains(&x) && (3.0..=124.0).contains(&y));

        let outline = evaluate(reference.clone(), reference.clone());
        let penalized = evaluate(filled.clone(), reference.clone());
        assert!(penalized.overall_score < outline.overall_score);
        assert!(penalized
            .improvement_tips
            .iter()
            .any(|t| t.contains("instead of filling")));

        let lenient = Evaluator::new(EvaluatorConfig {
            saturated_penalty: 1.0,
            ..Default::default()
        })
        .evaluate(EvaluationRequest::new(filled, reference))
        .unwrap();
        let expected = lenient.overall_score as f64 * 0.7;
        assert!(
            (penalized.overall_score as f64 - expected).abs() <= 1.0,
            "penalized {} vs 0.7 x {}",
            penalized.overall_score,
            lenient.overall_score
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let user = draw(GRID_GLYPH, 0.9, 6.0);
        let meta = CharacterMeta::new("田", "kanji-1");
        let evaluator = Evaluator::default();

        let run = || {
            evaluator
                .evaluate(
                    EvaluationRequest::new(user.clone(), reference.clone()).with_meta(meta.clone()),
                )
                .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert!(first.encouragement.is_some());
    }

    #[test]
    fn more_correct_ink_never_lowers_shape() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        // Keep only reference ink left of a cut line.
        let partial = |cut: f64| {
            let full = draw(GRID_GLYPH, 1.0, 0.0);
            let mut data = full.data;
            for y in 0..CANONICAL_SIZE {
                for x in 0..CANONICAL_SIZE {
                    if x as f64 >= cut {
                        let i = ((y * CANONICAL_SIZE + x) * 4) as usize;
                        data[i..i + 3].copy_from_slice(&[255, 255, 255]);
                    }
                }
            }
            RawImage::new(CANONICAL_SIZE, CANONICAL_SIZE, data, PixelFormat::Rgba8)
        };

        let a = evaluate(partial(60.0), reference.clone());
        let b = evaluate(partial(90.0), reference);
        assert!(b.breakdown.shape_accuracy >= a.breakdown.shape_accuracy);
    }

    #[test]
    fn passing_score_override() {
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let user = draw(GRID_GLYPH, 0.8, 4.0);
        let evaluator = Evaluator::default();

        let strict_request =
            EvaluationRequest::new(user.clone(), reference.clone()).with_passing_score(100);
        let strict = evaluator.evaluate(strict_request).unwrap();
        let lenient = evaluator
            .evaluate(EvaluationRequest::new(user, reference).with_passing_score(0))
            .unwrap();
        assert_eq!(strict.overall_score, lenient.overall_score);
        assert!(strict.overall_score < 100);
        assert!(!strict.is_correct);
        assert!(lenient.is_correct);
    }

    #[test]
    fn blank_reference_is_scored_not_failed() {
        let result = evaluate(draw(GRID_GLYPH, 1.0, 0.0), white_canvas());
        assert_eq!(result.outcome, EvaluationOutcome::Scored);
        assert_eq!(result.breakdown.shape_accuracy, 0.0);
        assert_eq!(result.breakdown.proportion_accuracy, 0.0);
    }

    #[test]
    fn invalid_image_fails_fast() {
        let broken = RawImage::new(0, 0, vec![], PixelFormat::Rgba8);
        let err = Evaluator::default()
            .evaluate(EvaluationRequest::new(broken, draw(GRID_GLYPH, 1.0, 0.0)))
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidImage(_)));
    }

    #[test]
    fn differently_sized_inputs_share_the_canonical_space() {
        // Reference rendered at 2x, user at canonical size.
        let reference = draw(GRID_GLYPH, 1.0, 0.0);
        let mut big = Vec::with_capacity(reference.data.len() * 4);
        for y in 0..CANONICAL_SIZE * 2 {
            for x in 0..CANONICAL_SIZE * 2 {
                let i = (((y / 2) * CANONICAL_SIZE + x / 2) * 4) as usize;
                big.extend_from_slice(&reference.data[i..i + 4]);
            }
        }
        let big = RawImage::new(CANONICAL_SIZE * 2, CANONICAL_SIZE * 2, big, PixelFormat::Rgba8);

        let result = evaluate(reference, big);
        assert_eq!(result.outcome, EvaluationOutcome::Scored);
        assert!(result.overall_score >= 85, "got {}", result.overall_score);
    }
}
