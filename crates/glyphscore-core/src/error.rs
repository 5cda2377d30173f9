//! Evaluation error types.
//!
//! Only genuine failures live here. An empty drawing is a normal business
//! outcome and is reported through [`crate::model::EvaluationOutcome`]
//! instead, so the caller can show its guiding message directly.

use thiserror::Error;

/// Generic message the calling layer shows for any engine failure.
pub const TRY_AGAIN_MESSAGE: &str =
    "Something went wrong while checking your drawing. Please try again.";

/// Errors that can occur while evaluating a drawing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The input buffer has zero dimensions, an inconsistent length, or
    /// could not be decoded.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Two stages disagreed about their inputs (e.g. mismatched canonical
    /// dimensions). No partial score is produced.
    #[error("metric computation failed: {0}")]
    MetricComputation(String),
}

impl EvalError {
    /// Returns `true` if retrying the same input cannot succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(self, EvalError::InvalidImage(_))
    }

    /// End-user text for this error.
    pub fn user_message(&self) -> &'static str {
        TRY_AGAIN_MESSAGE
    }
}
