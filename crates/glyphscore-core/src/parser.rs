//! TOML calibration set parser.
//!
//! Loads calibration sets from TOML files and directories, and validates them.
//! Image paths in a set are resolved against the directory of the file that
//! names them.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{CalibrationCase, CalibrationSet, CharacterMeta, Expectations};

/// Intermediate TOML structure for parsing calibration set files.
#[derive(Debug, Deserialize)]
struct TomlCalibrationFile {
    calibration_set: TomlCalibrationSetHeader,
    #[serde(default)]
    cases: Vec<TomlCalibrationCase>,
}

#[derive(Debug, Deserialize)]
struct TomlCalibrationSetHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct TomlCalibrationCase {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
    user_image: PathBuf,
    reference_image: PathBuf,
    #[serde(default)]
    character_id: Option<String>,
    #[serde(default)]
    lesson_id: Option<String>,
    #[serde(default)]
    passing_score: Option<u32>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    expectations: Option<Expectations>,
}

/// Parse a single TOML file into a `CalibrationSet`.
pub fn parse_calibration_set(path: &Path) -> Result<CalibrationSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read calibration set file: {}", path.display()))?;

    parse_calibration_set_str(&content, path)
}

/// Parse a TOML string into a `CalibrationSet` (useful for testing).
///
/// Relative image paths are joined onto `source_path`'s parent directory.
pub fn parse_calibration_set_str(content: &str, source_path: &Path) -> Result<CalibrationSet> {
    let parsed: TomlCalibrationFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let base_dir = source_path.parent().unwrap_or_else(|| Path::new(""));

    let cases = parsed
        .cases
        .into_iter()
        .map(|c| CalibrationCase {
            id: c.id,
            name: c.name,
            description: c.description,
            user_image: resolve(base_dir, c.user_image),
            reference_image: resolve(base_dir, c.reference_image),
            meta: CharacterMeta {
                character_id: c.character_id,
                lesson_id: c.lesson_id,
            },
            passing_score: c.passing_score,
            tags: c.tags,
            expectations: c.expectations.unwrap_or_default(),
        })
        .collect();

    Ok(CalibrationSet {
        id: parsed.calibration_set.id,
        name: parsed.calibration_set.name,
        description: parsed.calibration_set.description,
        cases,
    })
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

/// Recursively load all `.toml` calibration set files from a directory.
pub fn load_calibration_directory(dir: &Path) -> Result<Vec<CalibrationSet>> {
    let mut sets = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            sets.extend(load_calibration_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_calibration_set(&path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("skipping {}: {e:#}", path.display());
                }
            }
        }
    }

    Ok(sets)
}

/// Load a single file or every set under a directory.
pub fn load_calibration_path(path: &Path) -> Result<Vec<CalibrationSet>> {
    if path.is_dir() {
        load_calibration_directory(path)
    } else {
        Ok(vec![parse_calibration_set(path)?])
    }
}

/// A warning from calibration set validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The case ID (if applicable).
    pub case_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a calibration set for common issues.
pub fn validate_calibration_set(set: &CalibrationSet) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if set.cases.is_empty() {
        warnings.push(ValidationWarning {
            case_id: None,
            message: "calibration set has no cases".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for case in &set.cases {
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                case_id: Some(case.id.clone()),
                message,
            })
        };

        if !seen_ids.insert(&case.id) {
            warn(format!("duplicate case ID: {}", case.id));
        }

        let exp = &case.expectations;
        if exp.is_empty() {
            warn("case has no expectations and can never regress".into());
        }
        if let (Some(min), Some(max)) = (exp.min_score, exp.max_score) {
            if min > max {
                warn(format!("min_score {min} is greater than max_score {max}"));
            }
        }
        for (field, value) in [
            ("min_score", exp.min_score),
            ("max_score", exp.max_score),
            ("passing_score", case.passing_score),
        ] {
            if let Some(v) = value.filter(|v| *v > 100) {
                warn(format!("{field} {v} is outside 0-100"));
            }
        }

        for (field, path) in [
            ("user_image", &case.user_image),
            ("reference_image", &case.reference_image),
        ] {
            if !path.exists() {
                warn(format!("{field} not found: {}", path.display()));
            }
        }
    }

    warnings
}
