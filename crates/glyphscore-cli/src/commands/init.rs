//! The `glyphscore init` command.

use std::path::Path;

use anyhow::{Context, Result};
use image::{GrayImage, Luma};

pub fn execute() -> Result<()> {
    if Path::new("glyphscore.toml").exists() {
        println!("glyphscore.toml already exists, skipping.");
    } else {
        std::fs::write("glyphscore.toml", SAMPLE_CONFIG)?;
        println!("Created glyphscore.toml");
    }

    std::fs::create_dir_all("calibration/images")?;
    let example_path = Path::new("calibration/example.toml");
    if example_path.exists() {
        println!("calibration/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_CALIBRATION_SET)?;
        write_example_images(Path::new("calibration/images"))?;
        println!("Created calibration/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Tune glyphscore.toml (defaults are listed there)");
    println!("  2. Run: glyphscore validate --calibration-set calibration/example.toml");
    println!("  3. Run: glyphscore run --calibration-set calibration/example.toml");

    Ok(())
}

/// Render the plus-shaped glyph the example set refers to.
fn write_example_images(dir: &Path) -> Result<()> {
    let cross = |dx: i64| {
        GrayImage::from_fn(256, 256, move |x, y| {
            let (x, y) = (x as i64 - dx, y as i64);
            let vertical = (118..138).contains(&x) && (48..208).contains(&y);
            let horizontal = (48..208).contains(&x) && (118..138).contains(&y);
            Luma([if vertical || horizontal { 0 } else { 255 }])
        })
    };

    let images = [
        ("reference.png", cross(0)),
        ("exact.png", cross(0)),
        ("shifted.png", cross(48)),
        ("blank.png", GrayImage::from_pixel(256, 256, Luma([255]))),
    ];
    for (name, img) in images {
        let path = dir.join(name);
        img.save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# glyphscore configuration
# Every value below is the built-in default.

# Pixels with luminance below this count as ink.
ink_threshold = 200
# Scores at or above this are correct.
passing_score = 70
# Drawings with this many ink pixels or fewer are treated as empty.
min_ink_pixels = 100
# Shape accuracy is zero when mask IoU falls below this ratio.
min_overlap = 0.05

faint_density = 0.02
faint_penalty = 0.3
saturated_density = 0.80
saturated_penalty = 0.7

# Metrics below this add a targeted improvement tip.
tip_threshold = 60.0

[weights]
shape = 0.40
edge = 0.25
alignment = 0.20
proportion = 0.15
"#;

const EXAMPLE_CALIBRATION_SET: &str = r#"[calibration_set]
id = "example"
name = "Example Calibration Set"
description = "A plus-shaped glyph drawn exactly, shifted, and not at all"

[[cases]]
id = "exact_copy"
name = "Exact copy"
user_image = "images/exact.png"
reference_image = "images/reference.png"
character_id = "十"
lesson_id = "kanji-1"
tags = ["identity"]

[cases.expectations]
min_score = 95
expect_correct = true

[[cases]]
id = "shifted_right"
name = "Shifted right"
description = "Same glyph moved a fifth of the canvas to the right"
user_image = "images/shifted.png"
reference_image = "images/reference.png"
character_id = "十"
lesson_id = "kanji-1"
tags = ["alignment"]

[cases.expectations]
max_score = 80

[[cases]]
id = "blank_canvas"
name = "Blank canvas"
user_image = "images/blank.png"
reference_image = "images/reference.png"
tags = ["empty"]

[cases.expectations]
expect_empty = true
expect_correct = false
"#;
