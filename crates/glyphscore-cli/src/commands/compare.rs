//! The `glyphscore compare` command.

use std::path::PathBuf;

use anyhow::Result;

use glyphscore_core::report::CalibrationReport;

use crate::CompareFormat;

pub fn execute(
    baseline_path: PathBuf,
    current_path: PathBuf,
    threshold: f64,
    fail_on_regression: bool,
    format: CompareFormat,
) -> Result<()> {
    anyhow::ensure!(threshold >= 0.0, "threshold must not be negative");

    let baseline = CalibrationReport::load_json(&baseline_path)?;
    let current = CalibrationReport::load_json(&current_path)?;

    if baseline.calibration_set.id != current.calibration_set.id {
        tracing::warn!(
            baseline = %baseline.calibration_set.id,
            current = %current.calibration_set.id,
            "comparing reports from different calibration sets"
        );
    }

    let report = current.compare(&baseline, threshold);

    match format {
        CompareFormat::Markdown => {
            println!("{}", report.to_markdown());
        }
        CompareFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        CompareFormat::Text => {
            println!(
                "Comparison: {} regressions, {} improvements, {} unchanged",
                report.regressions.len(),
                report.improvements.len(),
                report.unchanged
            );

            if !report.regressions.is_empty() {
                println!("\nRegressions:");
                for r in &report.regressions {
                    println!(
                        "  {} {:.0} -> {:.0} ({:+.0})",
                        r.case_id, r.baseline_score, r.current_score, r.delta
                    );
                }
            }

            if !report.newly_failing.is_empty() {
                println!("\nNewly failing expectations:");
                for case_id in &report.newly_failing {
                    println!("  {case_id}");
                }
            }

            if !report.improvements.is_empty() {
                println!("\nImprovements:");
                for i in &report.improvements {
                    println!(
                        "  {} {:.0} -> {:.0} ({:+.0})",
                        i.case_id, i.baseline_score, i.current_score, i.delta
                    );
                }
            }

            if report.new_cases > 0 {
                println!("\n{} new case(s)", report.new_cases);
            }
            if report.removed_cases > 0 {
                println!("{} removed case(s)", report.removed_cases);
            }
        }
    }

    if fail_on_regression && report.has_regressions() {
        std::process::exit(1);
    }

    Ok(())
}
