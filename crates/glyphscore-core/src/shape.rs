//! Mask overlap scoring.

use crate::error::EvalError;
use crate::preprocess::BinaryMask;

/// Intersection over union of the user and reference masks, scaled to 0–100.
///
/// Scores 0 when the reference has no ink, or when the IoU is below
/// `min_overlap` (a stray accidental overlap should not earn points).
pub fn shape_accuracy(
    user: &BinaryMask,
    reference: &BinaryMask,
    min_overlap: f64,
) -> Result<f64, EvalError> {
    ensure_same_dimensions(user, reference)?;

    let (mut intersection, mut union, mut reference_ink) = (0usize, 0usize, 0usize);
    for (&u, &r) in user.cells().iter().zip(reference.cells()) {
        if u && r {
            intersection += 1;
        }
        if u || r {
            union += 1;
        }
        if r {
            reference_ink += 1;
        }
    }

    if reference_ink == 0 || union == 0 {
        return Ok(0.0);
    }

    let iou = intersection as f64 / union as f64;
    if iou < min_overlap {
        return Ok(0.0);
    }

    Ok((iou * 100.0).clamp(0.0, 100.0))
}

pub(crate) fn ensure_same_dimensions(a: &BinaryMask, b: &BinaryMask) -> Result<(), EvalError> {
    if a.dimensions() != b.dimensions() {
        return Err(EvalError::MetricComputation(format!(
            "mask dimensions differ: {}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLOOR: f64 = 0.05;

    fn rect(x0: u32, y0: u32, x1: u32, y1: u32) -> BinaryMask {
        BinaryMask::from_fn(|x, y| x >= x0 && x <= x1 && y >= y0 && y <= y1)
    }

    #[test]
    fn identical_masks_score_100() {
        let mask = rect(20, 20, 90, 100);
        assert_eq!(shape_accuracy(&mask, &mask, FLOOR).unwrap(), 100.0);
    }

    #[test]
    fn half_overlap() {
        // 40x40 reference, user covers its left half exactly.
        let reference = rect(0, 0, 39, 39);
        let user = rect(0, 0, 19, 39);
        let score = shape_accuracy(&user, &reference, FLOOR).unwrap();
        assert!((score - 50.0).abs() < 1e-9, "got {score}");
    }

    #[test]
    fn empty_reference_scores_zero() {
        let empty = BinaryMask::from_fn(|_, _| false);
        let user = rect(0, 0, 10, 10);
        assert_eq!(shape_accuracy(&user, &empty, FLOOR).unwrap(), 0.0);
        assert_eq!(shape_accuracy(&empty, &empty, FLOOR).unwrap(), 0.0);
    }

    #[test]
    fn tiny_overlap_is_floored_to_zero() {
        // 100x100 reference, user is a 10x10 patch inside it: IoU = 0.01.
        let reference = rect(0, 0, 99, 99);
        let user = rect(0, 0, 9, 9);
        assert_eq!(shape_accuracy(&user, &reference, FLOOR).unwrap(), 0.0);
        // Without the floor the same pair scores 1.
        let raw = shape_accuracy(&user, &reference, 0.0).unwrap();
        assert!((raw - 1.0).abs() < 1e-9);
    }

    #[test]
    fn superset_of_correct_pixels_never_scores_lower() {
        let reference = rect(10, 10, 109, 109);
        let a = rect(10, 10, 59, 109);
        let b = rect(10, 10, 89, 109);
        let score_a = shape_accuracy(&a, &reference, FLOOR).unwrap();
        let score_b = shape_accuracy(&b, &reference, FLOOR).unwrap();
        assert!(score_b >= score_a, "{score_b} < {score_a}");
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a = BinaryMask::with_size(2, 2, vec![true; 4]);
        let b = BinaryMask::with_size(4, 1, vec![true; 4]);
        let err = shape_accuracy(&a, &b, FLOOR).unwrap_err();
        assert!(matches!(err, EvalError::MetricComputation(_)));
    }
}
