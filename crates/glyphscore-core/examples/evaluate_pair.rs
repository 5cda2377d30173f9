//! Evaluate a drawing against a reference glyph from code.
//!
//! ```bash
//! # Score two image files:
//! cargo run -p glyphscore-core --example evaluate_pair -- drawing.png glyph.png
//!
//! # Or score a built-in pair of crosses:
//! cargo run -p glyphscore-core --example evaluate_pair
//! ```

use glyphscore_core::config::load_config;
use glyphscore_core::{CharacterMeta, EvaluationRequest, Evaluator, PixelFormat, RawImage};

/// A plus sign on a white 256x256 canvas, shifted right by `dx` pixels.
fn cross(dx: i64) -> RawImage {
    let img = image::GrayImage::from_fn(256, 256, |x, y| {
        let (x, y) = (x as i64 - dx, y as i64);
        let vertical = (118..138).contains(&x) && (48..208).contains(&y);
        let horizontal = (48..208).contains(&x) && (118..138).contains(&y);
        image::Luma([if vertical || horizontal { 0 } else { 255 }])
    });
    RawImage::new(256, 256, img.into_raw(), PixelFormat::Gray8)
}

fn main() -> anyhow::Result<()> {
    // glyphscore.toml if present, otherwise the built-in calibration.
    let evaluator = Evaluator::try_new(load_config()?)?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (user, reference) = match args.as_slice() {
        [user, reference] => (RawImage::open(user)?, RawImage::open(reference)?),
        _ => (cross(24), cross(0)),
    };

    let request =
        EvaluationRequest::new(user, reference).with_meta(CharacterMeta::new("十", "kanji-1"));
    let result = evaluator.evaluate(request)?;

    println!(
        "Score: {}/100 ({}, confidence {:.2})",
        result.overall_score,
        if result.is_correct { "correct" } else { "not yet" },
        result.confidence
    );
    println!("  shape       {:6.2}", result.breakdown.shape_accuracy);
    println!("  edge        {:6.2}", result.breakdown.edge_match);
    println!("  alignment   {:6.2}", result.breakdown.alignment_accuracy);
    println!("  proportion  {:6.2}", result.breakdown.proportion_accuracy);
    println!("\n{}", result.feedback_message);
    for tip in &result.improvement_tips {
        println!("  - {tip}");
    }
    if let Some(line) = &result.encouragement {
        println!("{line}");
    }

    Ok(())
}
