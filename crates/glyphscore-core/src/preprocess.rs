//! Image preprocessing: raw buffers to canonical grayscale and binary masks.
//!
//! Every later stage only accepts [`CanonicalImage`] or [`BinaryMask`], both
//! of which are always `CANONICAL_SIZE` x `CANONICAL_SIZE`, so a user drawing
//! and a reference glyph can never be compared at different resolutions.

use std::io::Cursor;
use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageReader, Luma, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::EvalError;

/// Side length of the canonical comparison raster.
pub const CANONICAL_SIZE: u32 = 128;

/// Default luminance cut-off: values strictly below it are ink.
pub const DEFAULT_INK_THRESHOLD: u8 = 200;

/// Layout of a [`RawImage`] byte buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 4 bytes per pixel, straight (non-premultiplied) alpha.
    Rgba8,
    /// 1 byte per pixel.
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// An undecoded-size pixel buffer as handed over by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub width: u32,
    pub height: u32,
    /// Row-major pixel bytes in `format` layout.
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl RawImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            data,
            format,
        }
    }

    /// Decode an encoded image (PNG, JPEG, ...) into an RGBA buffer.
    #[instrument(skip(bytes), fields(data_len = bytes.len()))]
    pub fn decode(bytes: &[u8]) -> Result<Self, EvalError> {
        let decoded = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|err| EvalError::InvalidImage(format!("unreadable image data: {err}")))?
            .decode()
            .map_err(|err| EvalError::InvalidImage(format!("failed to decode image: {err}")))?;
        Ok(Self::from_dynamic(decoded))
    }

    /// Read and decode an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EvalError> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|err| {
            EvalError::InvalidImage(format!("failed to open {}: {err}", path.display()))
        })?;
        Ok(Self::from_dynamic(decoded))
    }

    fn from_dynamic(image: DynamicImage) -> Self {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        debug!(width, height, "raw image decoded");
        Self {
            width,
            height,
            data: rgba.into_raw(),
            format: PixelFormat::Rgba8,
        }
    }
}

/// Fixed-size grayscale raster shared by every comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalImage {
    image: GrayImage,
}

impl CanonicalImage {
    /// Build a canonical image directly from a per-pixel gray function.
    pub fn from_fn(mut f: impl FnMut(u32, u32) -> u8) -> Self {
        Self {
            image: GrayImage::from_fn(CANONICAL_SIZE, CANONICAL_SIZE, |x, y| Luma([f(x, y)])),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Gray value at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }
}

/// Ink / no-ink classification of a canonical image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    ink: Vec<bool>,
}

impl BinaryMask {
    /// Build a canonical-size mask from a per-pixel predicate.
    pub fn from_fn(mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut ink = Vec::with_capacity((CANONICAL_SIZE * CANONICAL_SIZE) as usize);
        for y in 0..CANONICAL_SIZE {
            for x in 0..CANONICAL_SIZE {
                ink.push(f(x, y));
            }
        }
        Self {
            width: CANONICAL_SIZE,
            height: CANONICAL_SIZE,
            ink,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_size(width: u32, height: u32, ink: Vec<bool>) -> Self {
        assert_eq!(ink.len(), (width * height) as usize);
        Self { width, height, ink }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.ink.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ink.is_empty()
    }

    pub fn is_ink(&self, x: u32, y: u32) -> bool {
        self.ink[(y * self.width + x) as usize]
    }

    /// Row-major ink flags.
    pub fn cells(&self) -> &[bool] {
        &self.ink
    }

    /// Coordinates of every ink pixel, row by row.
    pub fn ink_pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width;
        self.ink
            .iter()
            .enumerate()
            .filter(|(_, ink)| **ink)
            .map(move |(i, _)| (i as u32 % width, i as u32 / width))
    }
}

/// Normalize a caller-supplied buffer into the canonical raster.
///
/// The buffer is resized (bilinear, aspect ratio not preserved) to
/// `CANONICAL_SIZE` x `CANONICAL_SIZE` unless it already has that size,
/// composited over white, then reduced to luminance with
/// `round(0.299 R + 0.587 G + 0.114 B)`.
#[instrument(skip(raw), fields(width = raw.width, height = raw.height, format = ?raw.format))]
pub fn normalize(raw: RawImage) -> Result<CanonicalImage, EvalError> {
    let RawImage {
        width,
        height,
        data,
        format,
    } = raw;

    if width == 0 || height == 0 {
        return Err(EvalError::InvalidImage(format!(
            "image has a zero dimension ({width}x{height})"
        )));
    }

    let expected = (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(format.channels()))
        .ok_or_else(|| EvalError::InvalidImage(format!("image too large ({width}x{height})")))?;
    if data.len() != expected {
        return Err(EvalError::InvalidImage(format!(
            "buffer holds {} bytes, expected {expected} for {width}x{height} {format:?}",
            data.len()
        )));
    }

    let rgba = match format {
        PixelFormat::Rgba8 => RgbaImage::from_raw(width, height, data),
        PixelFormat::Gray8 => GrayImage::from_raw(width, height, data)
            .map(|gray| DynamicImage::ImageLuma8(gray).to_rgba8()),
    }
    .ok_or_else(|| EvalError::InvalidImage("buffer does not match its dimensions".into()))?;

    let rgba = if rgba.dimensions() == (CANONICAL_SIZE, CANONICAL_SIZE) {
        rgba
    } else {
        debug!(
            from_w = width,
            from_h = height,
            to = CANONICAL_SIZE,
            "resizing to canonical resolution"
        );
        imageops::resize(&rgba, CANONICAL_SIZE, CANONICAL_SIZE, FilterType::Triangle)
    };

    let image = GrayImage::from_fn(CANONICAL_SIZE, CANONICAL_SIZE, |x, y| {
        Luma([luminance(rgba.get_pixel(x, y).0)])
    });

    Ok(CanonicalImage { image })
}

/// Classify each pixel as ink when its gray value is below `threshold`.
pub fn binarize(img: &CanonicalImage, threshold: u8) -> BinaryMask {
    let ink = img.image.pixels().map(|p| p.0[0] < threshold).collect();
    BinaryMask {
        width: img.width(),
        height: img.height(),
        ink,
    }
}

/// Luminance of a straight-alpha RGBA pixel composited over white.
fn luminance([r, g, b, a]: [u8; 4]) -> u8 {
    let alpha = f64::from(a) / 255.0;
    let over_white = |c: u8| f64::from(c) * alpha + 255.0 * (1.0 - alpha);
    let y = 0.299 * over_white(r) + 0.587 * over_white(g) + 0.114 * over_white(b);
    y.round().clamp(0.0, 255.0) as u8
}
