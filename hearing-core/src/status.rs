//! # Hearing Status Module
//!
//! Classifies a recorded threshold into one of six degrees of hearing loss.
//!
//! ## Breakpoints (inclusive upper bounds, first match wins)
//! | Threshold (dB) | Status |
//! |---|---|
//! | ≤ 25 | Normal |
//! | ≤ 40 | Mild Loss |
//! | ≤ 55 | Moderate Loss |
//! | ≤ 70 | Moderately Severe Loss |
//! | ≤ 90 | Severe Loss |
//! | > 90 | Profound Loss |

use serde::{Deserialize, Serialize};
use std::fmt;

/// Degree of hearing loss derived from a threshold in dB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HearingStatus {
    #[serde(rename = "Normal")]
    Normal,
    #[serde(rename = "Mild Loss")]
    MildLoss,
    #[serde(rename = "Moderate Loss")]
    ModerateLoss,
    #[serde(rename = "Moderately Severe Loss")]
    ModeratelySevereLoss,
    #[serde(rename = "Severe Loss")]
    SevereLoss,
    #[serde(rename = "Profound Loss")]
    ProfoundLoss,
}

/// Upper bound (inclusive) of each status band, in ascending order.
const BREAKPOINTS: [(i32, HearingStatus); 5] = [
    (25, HearingStatus::Normal),
    (40, HearingStatus::MildLoss),
    (55, HearingStatus::ModerateLoss),
    (70, HearingStatus::ModeratelySevereLoss),
    (90, HearingStatus::SevereLoss),
];

/// Classifies a threshold.
///
/// Total over every integer; anything above the last breakpoint is
/// [`HearingStatus::ProfoundLoss`].
pub fn classify(db: i32) -> HearingStatus {
    BREAKPOINTS
        .iter()
        .find(|(upper, _)| db <= *upper)
        .map(|&(_, status)| status)
        .unwrap_or(HearingStatus::ProfoundLoss)
}

impl HearingStatus {
    /// Human-readable label, identical to the exported report value.
    pub fn label(self) -> &'static str {
        match self {
            HearingStatus::Normal => "Normal",
            HearingStatus::MildLoss => "Mild Loss",
            HearingStatus::ModerateLoss => "Moderate Loss",
            HearingStatus::ModeratelySevereLoss => "Moderately Severe Loss",
            HearingStatus::SevereLoss => "Severe Loss",
            HearingStatus::ProfoundLoss => "Profound Loss",
        }
    }
}

impl fmt::Display for HearingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
