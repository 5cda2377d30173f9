//! The `glyphscore validate` command.

use std::path::PathBuf;

use anyhow::Result;

use glyphscore_core::parser;

pub fn execute(calibration_path: PathBuf) -> Result<()> {
    let sets = parser::load_calibration_path(&calibration_path)?;

    let mut total_warnings = 0;

    for set in &sets {
        println!("Calibration set: {} ({} cases)", set.name, set.cases.len());

        let warnings = parser::validate_calibration_set(set);
        for w in &warnings {
            let prefix = w
                .case_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All calibration sets valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
