//! Evaluator configuration and loading.
//!
//! Every tunable the scorer uses lives in [`EvaluatorConfig`]. The defaults
//! are the canonical calibration; a config file only needs to name the
//! fields it changes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::preprocess::DEFAULT_INK_THRESHOLD;

/// Weight of each sub-metric in the overall score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    /// Mask overlap (IoU).
    #[serde(default = "default_shape_weight")]
    pub shape: f64,
    /// Edge-map correlation (stroke contours).
    #[serde(default = "default_edge_weight")]
    pub edge: f64,
    /// Center-of-mass alignment.
    #[serde(default = "default_alignment_weight")]
    pub alignment: f64,
    /// Bounding-box proportions.
    #[serde(default = "default_proportion_weight")]
    pub proportion: f64,
}

fn default_shape_weight() -> f64 {
    0.40
}
fn default_edge_weight() -> f64 {
    0.25
}
fn default_alignment_weight() -> f64 {
    0.20
}
fn default_proportion_weight() -> f64 {
    0.15
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            shape: default_shape_weight(),
            edge: default_edge_weight(),
            alignment: default_alignment_weight(),
            proportion: default_proportion_weight(),
        }
    }
}

impl MetricWeights {
    pub fn sum(&self) -> f64 {
        self.shape + self.edge + self.alignment + self.proportion
    }
}

/// Configuration for the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Grayscale values strictly below this are ink. Applied to both images.
    #[serde(default = "default_ink_threshold")]
    pub ink_threshold: u8,
    /// Minimum score counted as correct.
    #[serde(default = "default_passing_score")]
    pub passing_score: u32,
    /// Drawings with this many ink pixels or fewer are treated as empty.
    #[serde(default = "default_min_ink_pixels")]
    pub min_ink_pixels: usize,
    /// IoU below this ratio scores a flat zero for shape.
    #[serde(default = "default_min_overlap")]
    pub min_overlap: f64,
    /// Ink density below this is "too faint".
    #[serde(default = "default_faint_density")]
    pub faint_density: f64,
    /// Multiplier applied to faint drawings.
    #[serde(default = "default_faint_penalty")]
    pub faint_penalty: f64,
    /// Ink density above this is "oversaturated".
    #[serde(default = "default_saturated_density")]
    pub saturated_density: f64,
    /// Multiplier applied to oversaturated drawings.
    #[serde(default = "default_saturated_penalty")]
    pub saturated_penalty: f64,
    /// Sub-metrics below this value produce a targeted tip.
    #[serde(default = "default_tip_threshold")]
    pub tip_threshold: f64,
    #[serde(default)]
    pub weights: MetricWeights,
}

fn default_ink_threshold() -> u8 {
    DEFAULT_INK_THRESHOLD
}
fn default_passing_score() -> u32 {
    70
}
fn default_min_ink_pixels() -> usize {
    100
}
fn default_min_overlap() -> f64 {
    0.05
}
fn default_faint_density() -> f64 {
    0.02
}
fn default_faint_penalty() -> f64 {
    0.3
}
fn default_saturated_density() -> f64 {
    0.80
}
fn default_saturated_penalty() -> f64 {
    0.7
}
fn default_tip_threshold() -> f64 {
    60.0
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            ink_threshold: default_ink_threshold(),
            passing_score: default_passing_score(),
            min_ink_pixels: default_min_ink_pixels(),
            min_overlap: default_min_overlap(),
            faint_density: default_faint_density(),
            faint_penalty: default_faint_penalty(),
            saturated_density: default_saturated_density(),
            saturated_penalty: default_saturated_penalty(),
            tip_threshold: default_tip_threshold(),
            weights: MetricWeights::default(),
        }
    }
}

impl EvaluatorConfig {
    /// Reject configurations that would make scores meaningless.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.ink_threshold > 0, "ink_threshold must be above 0");
        anyhow::ensure!(
            self.passing_score <= 100,
            "passing_score must be between 0 and 100, got {}",
            self.passing_score
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.min_overlap),
            "min_overlap must be between 0.0 and 1.0"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.faint_density)
                && (0.0..=1.0).contains(&self.saturated_density),
            "density bounds must be between 0.0 and 1.0"
        );
        anyhow::ensure!(
            self.faint_density < self.saturated_density,
            "faint_density must be below saturated_density"
        );
        for (name, penalty) in [
            ("faint_penalty", self.faint_penalty),
            ("saturated_penalty", self.saturated_penalty),
        ] {
            anyhow::ensure!(
                penalty > 0.0 && penalty <= 1.0,
                "{name} must be in (0.0, 1.0], got {penalty}"
            );
        }
        let w = &self.weights;
        anyhow::ensure!(
            [w.shape, w.edge, w.alignment, w.proportion]
                .iter()
                .all(|v| *v >= 0.0),
            "metric weights must not be negative"
        );
        anyhow::ensure!(
            (w.sum() - 1.0).abs() < 1e-6,
            "metric weights must sum to 1.0, got {:.4}",
            w.sum()
        );
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `glyphscore.toml` in the current directory
/// 2. `~/.config/glyphscore/config.toml`
///
/// Environment variable overrides: `GLYPHSCORE_PASSING_SCORE`,
/// `GLYPHSCORE_INK_THRESHOLD`.
pub fn load_config() -> Result<EvaluatorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<EvaluatorConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("glyphscore.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = parse_config_str(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!("loaded evaluator config from {}", path.display());
            config
        }
        None => EvaluatorConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;

    Ok(config)
}

/// Parse a TOML string into an `EvaluatorConfig` (useful for testing).
pub fn parse_config_str(content: &str) -> Result<EvaluatorConfig> {
    let config: EvaluatorConfig = toml::from_str(content)?;
    Ok(config)
}

fn apply_env_overrides(config: &mut EvaluatorConfig) -> Result<()> {
    if let Ok(value) = std::env::var("GLYPHSCORE_PASSING_SCORE") {
        config.passing_score = value
            .trim()
            .parse()
            .with_context(|| format!("invalid GLYPHSCORE_PASSING_SCORE: '{value}'"))?;
    }
    if let Ok(value) = std::env::var("GLYPHSCORE_INK_THRESHOLD") {
        config.ink_threshold = value
            .trim()
            .parse()
            .with_context(|| format!("invalid GLYPHSCORE_INK_THRESHOLD: '{value}'"))?;
    }
    Ok(())
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("glyphscore"))
}
