//! Stroke contour comparison through Sobel gradient magnitude maps.
//!
//! Working on edges rather than filled area means a drawing with the right
//! outline but heavier or lighter fill still correlates well.

use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::error::EvalError;
use crate::preprocess::CanonicalImage;

/// Variance below this is treated as a flat map.
const FLAT_VARIANCE: f64 = 1e-12;

/// Per-pixel gradient magnitude of a canonical image.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientMap {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl GradientMap {
    #[cfg(test)]
    pub(crate) fn with_size(width: u32, height: u32, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), (width * height) as usize);
        Self {
            width,
            height,
            values,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Strongest gradient in the map.
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Scale into `[0, 1]` by the map's own maximum. A flat map stays zero.
    fn normalized(&self) -> Vec<f64> {
        let max = self.max();
        if max <= 0.0 {
            return vec![0.0; self.values.len()];
        }
        self.values.iter().map(|v| v / max).collect()
    }
}

/// Apply 3x3 Sobel kernels in both directions and take `sqrt(gx² + gy²)`.
///
/// Border pixels are handled by clamping to the nearest in-bounds sample.
pub fn edge_map(img: &CanonicalImage) -> GradientMap {
    let gx = horizontal_sobel(img.as_gray());
    let gy = vertical_sobel(img.as_gray());

    let values = gx
        .pixels()
        .zip(gy.pixels())
        .map(|(x, y)| {
            let (x, y) = (f64::from(x.0[0]), f64::from(y.0[0]));
            (x * x + y * y).sqrt()
        })
        .collect();

    GradientMap {
        width: img.width(),
        height: img.height(),
        values,
    }
}

/// Pearson correlation of two normalized edge maps, scaled to 0–100.
///
/// Negative correlation clamps to 0, as does a map with no variance.
pub fn edge_correlation(a: &GradientMap, b: &GradientMap) -> Result<f64, EvalError> {
    if a.dimensions() != b.dimensions() {
        return Err(EvalError::MetricComputation(format!(
            "edge map dimensions differ: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }

    let a = a.normalized();
    let b = b.normalized();
    if a.is_empty() {
        return Ok(0.0);
    }

    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let (mut covariance, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(&b) {
        let (da, db) = (x - mean_a, y - mean_b);
        covariance += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a < FLAT_VARIANCE || var_b < FLAT_VARIANCE {
        return Ok(0.0);
    }

    let r = covariance / (var_a * var_b).sqrt();
    Ok((r * 100.0).clamp(0.0, 100.0))
}
