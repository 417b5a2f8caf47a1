//! # Screening Configuration
//!
//! Test parameters shared by the threshold search, the tone synthesizer and
//! the audiogram renderer. Every field has a default, so a configuration file
//! only needs to list the values it overrides.
//!
//! ## Defaults
//! - Frequencies: 250, 500, 1000, 2000, 4000, 8000 Hz (trial order)
//! - Levels: 90 dB down to -10 dB in 5 dB steps
//! - Response window: 3000 ms
//! - Calibration tone: 1000 Hz at -20 dB on both channels

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Result, ScreeningError};

/// Spacing of the horizontal audiogram grid lines.
pub const GRID_STEP_DB: i32 = 10;

/// Largest magnitude accepted for `min_db`, `max_db` and `step_db`.
pub const LEVEL_LIMIT_DB: i32 = 200;

/// Fixed tone played before the screening so the listener can set a comfortable volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationTone {
    pub frequency_hz: f32,
    pub level_db: f32,
}

impl Default for CalibrationTone {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            level_db: -20.0,
        }
    }
}

/// Parameters of a screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Test frequencies in Hz. The order is the trial order within an ear
    /// and the left-to-right order on the audiogram.
    pub frequencies: Vec<u32>,
    /// Starting (loudest) level of every staircase.
    pub max_db: i32,
    /// Quietest level ever presented.
    pub min_db: i32,
    /// Decrement applied after each not-heard response or timeout.
    pub step_db: i32,
    /// Time the listener has to respond before the trial counts as not heard.
    pub response_window_ms: u64,
    pub calibration: CalibrationTone,
    /// Level that maps to full-scale output. Gain is `10^((dB - reference_db) / 20)`, capped at 1.
    pub reference_db: f32,
    pub sample_rate: u32,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            frequencies: vec![250, 500, 1000, 2000, 4000, 8000],
            max_db: 90,
            min_db: -10,
            step_db: 5,
            response_window_ms: 3000,
            calibration: CalibrationTone::default(),
            reference_db: 0.0,
            sample_rate: 44100,
        }
    }
}

impl ScreeningConfig {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Arguments
    /// * `path` - Path of the JSON configuration file
    ///
    /// # Returns
    /// * `Ok(ScreeningConfig)` - Parsed and validated configuration
    /// * `Err(ScreeningError)` - I/O, JSON or validation error
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: ScreeningConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file, or returns the defaults when it does not exist.
    ///
    /// Any other failure (unreadable file, malformed JSON, invalid values) is
    /// still reported to the caller.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path.as_ref()) {
            Err(ScreeningError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.as_ref().display(), "No configuration file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Checks the invariants the engine and renderer rely on.
    pub fn validate(&self) -> Result<()> {
        if self.frequencies.len() < 2 {
            return Err(ScreeningError::Config(format!(
                "at least 2 test frequencies are required, got {}",
                self.frequencies.len()
            )));
        }
        if self.frequencies.contains(&0) {
            return Err(ScreeningError::Config("test frequencies must be non-zero".to_string()));
        }
        for (i, f) in self.frequencies.iter().enumerate() {
            if self.frequencies[..i].contains(f) {
                return Err(ScreeningError::Config(format!("duplicate test frequency {} Hz", f)));
            }
        }
        let levels = [
            ("min_db", self.min_db),
            ("max_db", self.max_db),
            ("step_db", self.step_db),
        ];
        for (name, value) in levels {
            if !(-LEVEL_LIMIT_DB..=LEVEL_LIMIT_DB).contains(&value) {
                return Err(ScreeningError::Config(format!(
                    "{} must be within ±{} dB, got {}",
                    name, LEVEL_LIMIT_DB, value
                )));
            }
        }
        if self.max_db <= self.min_db {
            return Err(ScreeningError::Config(format!(
                "max_db ({}) must be greater than min_db ({})",
                self.max_db, self.min_db
            )));
        }
        if self.step_db <= 0 {
            return Err(ScreeningError::Config(format!(
                "step_db must be positive, got {}",
                self.step_db
            )));
        }
        if self.response_window_ms == 0 {
            return Err(ScreeningError::Config("response_window_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Position of `frequency` in the test sequence.
    pub fn frequency_index(&self, frequency: u32) -> Option<usize> {
        self.frequencies.iter().position(|&f| f == frequency)
    }

    /// Levels that get a horizontal grid line: every 10 dB from `min_db` up to `max_db`.
    pub fn grid_levels(&self) -> Vec<i32> {
        (self.min_db..=self.max_db).step_by(GRID_STEP_DB as usize).collect()
    }

    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    /// Number of thresholds a complete run records (every frequency, both ears).
    pub fn total_trials_per_run(&self) -> usize {
        self.frequencies.len() * crate::Ear::ALL.len()
    }
}
