//! Fixture images and calibration sets shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};

/// A thick plus sign on a white 128x128 canvas, shifted right by `dx`.
pub fn cross(dx: i64) -> GrayImage {
    GrayImage::from_fn(128, 128, |x, y| {
        let (x, y) = (x as i64 - dx, y as i64);
        let vertical = (59..69).contains(&x) && (24..104).contains(&y);
        let horizontal = (24..104).contains(&x) && (59..69).contains(&y);
        Luma([if vertical || horizontal { 0 } else { 255 }])
    })
}

pub fn blank() -> GrayImage {
    GrayImage::from_pixel(128, 128, Luma([255]))
}

pub fn write_png(dir: &Path, name: &str, img: &GrayImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

/// Write the fixture images plus a three-case calibration set; returns the set path.
pub fn write_calibration_set(dir: &Path) -> PathBuf {
    let images = dir.join("images");
    std::fs::create_dir_all(&images).unwrap();
    write_png(&images, "reference.png", &cross(0));
    write_png(&images, "exact.png", &cross(0));
    write_png(&images, "shifted.png", &cross(30));
    write_png(&images, "blank.png", &blank());

    let path = dir.join("fixtures.toml");
    std::fs::write(&path, CALIBRATION_SET).unwrap();
    path
}

const CALIBRATION_SET: &str = r#"
[calibration_set]
id = "fixtures"
name = "Fixture Glyphs"

[[cases]]
id = "exact"
name = "Exact copy"
user_image = "images/exact.png"
reference_image = "images/reference.png"
character_id = "十"
tags = ["identity"]

[cases.expectations]
min_score = 95
expect_correct = true

[[cases]]
id = "shifted"
name = "Shifted right"
user_image = "images/shifted.png"
reference_image = "images/reference.png"
tags = ["alignment"]

[cases.expectations]
max_score = 80
expect_correct = false

[[cases]]
id = "blank"
name = "Blank canvas"
user_image = "images/blank.png"
reference_image = "images/reference.png"
tags = ["empty"]

[cases.expectations]
expect_empty = true
"#;
