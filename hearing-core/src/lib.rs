// hearing-core/src/lib.rs

//! The core logic for the pure-tone hearing screening.
//! This crate is responsible for the threshold search staircase, tone
//! playback, results bookkeeping and the audiogram rendering model.
//! It is completely headless and contains no GUI code.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod audio;
pub mod audiogram;
pub mod config;
pub mod engine;
pub mod error;
pub mod results;
pub mod session;
pub mod status;

pub use config::ScreeningConfig;
pub use error::{Result, ScreeningError};
pub use status::HearingStatus;

/// The ear a tone is routed to.
///
/// A screening run always completes every frequency on the left ear
/// before the first right-ear trial is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ear {
    Left,
    Right,
}

impl Ear {
    /// Both ears in test order.
    pub const ALL: [Ear; 2] = [Ear::Left, Ear::Right];

    /// Get the ear tested after this one
    ///
    /// # Returns
    /// * `Some(Ear)` - Next ear to test
    /// * `None` - Both ears are done
    pub fn next(self) -> Option<Ear> {
        match self {
            Ear::Left => Some(Ear::Right),
            Ear::Right => None,
        }
    }

    /// Lowercase name used in instructions and exported reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Ear::Left => "left",
            Ear::Right => "right",
        }
    }

    /// Legend label used on the audiogram.
    pub fn display_name(self) -> &'static str {
        match self {
            Ear::Left => "Left Ear",
            Ear::Right => "Right Ear",
        }
    }
}

impl fmt::Display for Ear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
