//! Score and breakdown to human-readable feedback.
//!
//! Pure text generation: the same score and breakdown always produce the
//! same message and tips, in the same order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::EvaluatorConfig;
use crate::model::{CharacterMeta, MetricBreakdown};

/// Upper bound on `improvement_tips`.
pub const MAX_TIPS: usize = 5;

/// Message for drawings that fail the validity gate.
pub const EMPTY_DRAWING_MESSAGE: &str = "Please draw before submitting.";

const EMPTY_DRAWING_TIP: &str = "Draw the character on the canvas, then submit it for checking.";

const SHAPE_TIP: &str = "Match the overall shape of the character more closely.";
const EDGE_TIP: &str = "Follow the stroke outlines of the reference and check each stroke's length.";
const ALIGNMENT_TIP: &str = "Center your drawing on the canvas.";
const PROPORTION_TIP: &str = "Watch the size ratios: match the width and height of the reference.";
const FAINT_TIP: &str = "Draw larger or with bolder strokes; the drawing is too faint to read.";
const SATURATED_TIP: &str = "Draw clean strokes instead of filling or shading the canvas.";

/// Score band, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Acceptable,
    NeedsWork,
    KeepPracticing,
}

impl ScoreBand {
    pub fn from_score(score: u32) -> Self {
        match score {
            85..=u32::MAX => ScoreBand::Excellent,
            70..=84 => ScoreBand::Good,
            55..=69 => ScoreBand::Acceptable,
            35..=54 => ScoreBand::NeedsWork,
            _ => ScoreBand::KeepPracticing,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Excellent! Your character closely matches the reference.",
            ScoreBand::Good => "Good job! Your character is recognizable and well formed.",
            ScoreBand::Acceptable => "Acceptable. The basic shape is there but needs refinement.",
            ScoreBand::NeedsWork => "Needs work. Several parts differ from the reference.",
            ScoreBand::KeepPracticing => {
                "Keep practicing! Your drawing does not match the reference yet."
            }
        }
    }

    fn tip(self) -> &'static str {
        match self {
            ScoreBand::Excellent => "Great form. Try writing it again from memory.",
            ScoreBand::Good => "Compare your strokes with the reference to polish the details.",
            ScoreBand::Acceptable => "Trace over the reference a few times, then try again.",
            ScoreBand::NeedsWork => "Study the reference closely and draw each stroke slowly.",
            ScoreBand::KeepPracticing => "Start by tracing the reference, then draw it on your own.",
        }
    }

    fn encouragements(self) -> &'static [&'static str] {
        match self {
            ScoreBand::Excellent => &[
                "A calligrapher would nod at that one.",
                "Your brush hand is getting steady.",
                "That is a character worth framing.",
            ],
            ScoreBand::Good => &[
                "Each clean stroke builds muscle memory.",
                "You are close. A few more repetitions will lock it in.",
                "Steady progress is how every script is mastered.",
            ],
            ScoreBand::Acceptable => &[
                "Every master was once a beginner at this same character.",
                "The shape is emerging. Keep your strokes deliberate.",
                "Slow strokes now make fast, neat writing later.",
            ],
            ScoreBand::NeedsWork | ScoreBand::KeepPracticing => &[
                "Practice a little every day and the strokes will come.",
                "Even the most elegant hand started with wobbly lines.",
                "Patience with each stroke is part of learning a script.",
            ],
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreBand::Excellent => write!(f, "excellent"),
            ScoreBand::Good => write!(f, "good"),
            ScoreBand::Acceptable => write!(f, "acceptable"),
            ScoreBand::NeedsWork => write!(f, "needs work"),
            ScoreBand::KeepPracticing => write!(f, "keep practicing"),
        }
    }
}

/// Rendered feedback for one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub message: String,
    /// Band tip first, then metric tips in a fixed order. At most [`MAX_TIPS`].
    pub tips: Vec<String>,
    pub encouragement: Option<String>,
}

/// Build the message and tips for a scored evaluation.
pub fn feedback(
    score: u32,
    breakdown: &MetricBreakdown,
    ink_density: f64,
    config: &EvaluatorConfig,
    meta: &CharacterMeta,
) -> Feedback {
    let band = ScoreBand::from_score(score);
    let below = |value: f64| value < config.tip_threshold;

    let candidates = [
        (true, band.tip()),
        (below(breakdown.shape_accuracy), SHAPE_TIP),
        (below(breakdown.edge_match), EDGE_TIP),
        (below(breakdown.alignment_accuracy), ALIGNMENT_TIP),
        (below(breakdown.proportion_accuracy), PROPORTION_TIP),
        (ink_density < config.faint_density, FAINT_TIP),
        (ink_density > config.saturated_density, SATURATED_TIP),
    ];

    let tips = candidates
        .iter()
        .filter(|(applies, _)| *applies)
        .map(|(_, tip)| tip.to_string())
        .take(MAX_TIPS)
        .collect();

    Feedback {
        message: band.message().to_string(),
        tips,
        encouragement: encouragement(band, meta),
    }
}

/// Feedback for a drawing that failed the validity gate.
pub fn empty_drawing_feedback() -> Feedback {
    Feedback {
        message: EMPTY_DRAWING_MESSAGE.to_string(),
        tips: vec![EMPTY_DRAWING_TIP.to_string()],
        encouragement: None,
    }
}

/// Pick a flavor line keyed on the character, so the same character always
/// gets the same line for the same band.
fn encouragement(band: ScoreBand, meta: &CharacterMeta) -> Option<String> {
    let character_id = meta.character_id.as_deref()?;
    let pool = band.encouragements();
    let index = (fnv1a(character_id.as_bytes()) % pool.len() as u64) as usize;
    Some(pool[index].to_string())
}

/// 64-bit FNV-1a; stable across platforms and releases, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}
