//! Geometry of a binary mask: extent, centroid and ink density, plus the
//! alignment and proportion metrics built on them.

use serde::{Deserialize, Serialize};

use crate::preprocess::{BinaryMask, CANONICAL_SIZE};

/// Axis-aligned rectangle in canonical pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }
}

/// A point in canonical pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Center of the canonical canvas.
    pub fn canvas_center() -> Self {
        let c = (CANONICAL_SIZE - 1) as f64 / 2.0;
        Self { x: c, y: c }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    fn clamped(self) -> Self {
        let max = (CANONICAL_SIZE - 1) as f64;
        Self {
            x: self.x.clamp(0.0, max),
            y: self.y.clamp(0.0, max),
        }
    }
}

/// Smallest rectangle containing every ink pixel; an empty mask yields a
/// zero-size box at the origin.
pub fn bounds(mask: &BinaryMask) -> BoundingBox {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y) in mask.ink_pixels() {
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }

    match extent {
        Some((min_x, min_y, max_x, max_y)) => BoundingBox {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        },
        None => BoundingBox::default(),
    }
}

/// Ink-weighted centroid. Falls back to the canvas center for an empty mask.
pub fn center_of_mass(mask: &BinaryMask) -> Point {
    let (mut sum_x, mut sum_y, mut count) = (0u64, 0u64, 0u64);
    for (x, y) in mask.ink_pixels() {
        sum_x += u64::from(x);
        sum_y += u64::from(y);
        count += 1;
    }

    if count == 0 {
        return Point::canvas_center();
    }

    Point {
        x: sum_x as f64 / count as f64,
        y: sum_y as f64 / count as f64,
    }
    .clamped()
}

pub fn ink_count(mask: &BinaryMask) -> usize {
    mask.cells().iter().filter(|ink| **ink).count()
}

/// Fraction of cells that hold ink, in `[0.0, 1.0]`.
pub fn ink_density(mask: &BinaryMask) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    ink_count(mask) as f64 / mask.len() as f64
}

/// How close two centroids are, 0–100.
///
/// Falls linearly from 100 at zero offset to 0 at an offset of half the
/// canvas width.
pub fn alignment_accuracy(user: &Point, reference: &Point) -> f64 {
    let max_offset = CANONICAL_SIZE as f64 / 2.0;
    (100.0 * (1.0 - user.distance(reference) / max_offset)).clamp(0.0, 100.0)
}

/// How similar two extents are in size, 0–100.
///
/// Mean of the width ratio and height ratio (smaller over larger). An empty
/// box on either side scores 0.
pub fn proportion_accuracy(user: &BoundingBox, reference: &BoundingBox) -> f64 {
    if user.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let ratio = |a: u32, b: u32| f64::from(a.min(b)) / f64::from(a.max(b));
    let width_ratio = ratio(user.width, reference.width);
    let height_ratio = ratio(user.height, reference.height);
    (100.0 * (width_ratio + height_ratio) / 2.0).clamp(0.0, 100.0)
}
