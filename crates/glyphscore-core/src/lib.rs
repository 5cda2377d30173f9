//! glyphscore-core — Deterministic handwriting evaluation.
//!
//! Compares a learner's drawing against a reference rendering of the same
//! character and produces a 0–100 score, a per-metric breakdown, a confidence
//! value and feedback text. The calibration modules (`parser`, `engine`,
//! `report`, `statistics`) run whole sets of drawings to audit scorer changes.

pub mod config;
pub mod edge;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod feedback;
pub mod model;
pub mod parser;
pub mod preprocess;
pub mod report;
pub mod score;
pub mod shape;
pub mod spatial;
pub mod statistics;

pub use config::EvaluatorConfig;
pub use error::EvalError;
pub use evaluator::Evaluator;
pub use model::{
    CharacterMeta, EvaluationOutcome, EvaluationRequest, EvaluationResult, MetricBreakdown,
};
pub use preprocess::{PixelFormat, RawImage};
