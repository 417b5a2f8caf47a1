//! # Threshold Search Engine
//!
//! Drives the descending-intensity staircase over every (ear, frequency) pair
//! and records one threshold per pair.
//!
//! ## Procedure
//! 1. Every frequency starts at `max_db`.
//! 2. A "heard" response records the current level as the threshold.
//! 3. A "not heard" response or a timeout lowers the level by `step_db`.
//! 4. Falling below `min_db` records `max_db` as a no-response marker.
//! 5. Frequencies are visited in sequence order, left ear before right ear.
//!
//! Responses are addressed to a [`TrialId`]. A response for any trial other
//! than the one currently awaited is stale and has no effect, which settles
//! the race between a response-window timeout and a late button press.

use std::fmt;
use tracing::{debug, info, warn};

use crate::Ear;
use crate::audio::ToneSynthesizer;
use crate::config::ScreeningConfig;
use crate::error::{Result, ScreeningError};
use crate::results::ResultsStore;

/// Identity of a single tone presentation. Never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrialId(u64);

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The tone currently sounding and awaiting a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trial {
    pub id: TrialId,
    pub ear: Ear,
    pub frequency: u32,
    pub db: i32,
}

/// Listener input (or its absence) for a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    Heard,
    NotHeard,
    /// The response window elapsed. Handled exactly like `NotHeard`.
    Timeout,
}

/// Engine phase.
///
/// `AdvancingFrequency` and `AdvancingEar` are held only while the next
/// trial is being set up; a failed presentation from them lands in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingResponse(Trial),
    AdvancingFrequency,
    AdvancingEar,
    Complete,
}

/// Outcome of a successful engine operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A new trial is sounding.
    Presented(Trial),
    /// Both ears have a threshold for every frequency.
    Complete,
    /// The response did not match the awaited trial and was discarded.
    Ignored,
}

/// Descending staircase over both ears and all configured frequencies.
pub struct ThresholdSearch<S: ToneSynthesizer> {
    config: ScreeningConfig,
    synth: S,
    results: ResultsStore,
    phase: Phase,
    ear: Ear,
    frequency_index: usize,
    current_db: i32,
    next_trial: u64,
    initialized: bool,
    sounding: bool,
}

impl<S: ToneSynthesizer> ThresholdSearch<S> {
    /// Creates an idle engine.
    ///
    /// # Arguments
    /// * `config` - Validated screening parameters
    /// * `synth` - Tone output used for every trial
    pub fn new(config: ScreeningConfig, synth: S) -> Result<Self> {
        config.validate()?;
        let current_db = config.max_db;
        Ok(Self {
            config,
            synth,
            results: ResultsStore::new(),
            phase: Phase::Idle,
            ear: Ear::Left,
            frequency_index: 0,
            current_db,
            next_trial: 0,
            initialized: false,
            sounding: false,
        })
    }

    pub fn config(&self) -> &ScreeningConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn results(&self) -> &ResultsStore {
        &self.results
    }

    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    /// The trial awaiting a response, if any.
    pub fn current_trial(&self) -> Option<Trial> {
        match self.phase {
            Phase::AwaitingResponse(trial) => Some(trial),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Fraction of (ear, frequency) pairs with a recorded threshold, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        let total = self.config.total_trials_per_run();
        (self.results.len() as f32 / total as f32).min(1.0)
    }

    /// Plays the calibration tone. Only allowed while idle.
    pub fn play_calibration_tone(&mut self) -> Result<()> {
        self.require_idle("play the calibration tone")?;
        self.ensure_initialized()?;
        self.silence();
        self.synth
            .play_calibration_tone()
            .map_err(|e| ScreeningError::PlaybackFailure(e.to_string()))?;
        self.sounding = true;
        Ok(())
    }

    /// Begins a fresh run at the left ear, first frequency, `max_db`.
    ///
    /// Results left over from an aborted or failed run are discarded.
    ///
    /// # Returns
    /// * `Ok(Step::Presented(trial))` - First tone is sounding
    /// * `Err(ScreeningError::InvalidState)` - Engine is not idle
    /// * `Err(ScreeningError::PlaybackFailure)` - Tone could not start; engine stays idle
    pub fn start(&mut self) -> Result<Step> {
        self.require_idle("start a screening")?;
        self.silence();
        self.ensure_initialized()?;

        self.results.clear();
        self.ear = Ear::Left;
        self.frequency_index = 0;
        info!(frequencies = ?self.config.frequencies, "Starting screening");
        self.present(self.config.max_db)
    }

    pub fn on_heard(&mut self, trial: TrialId) -> Result<Step> {
        self.respond(trial, Response::Heard)
    }

    pub fn on_not_heard(&mut self, trial: TrialId) -> Result<Step> {
        self.respond(trial, Response::NotHeard)
    }

    pub fn on_timeout(&mut self, trial: TrialId) -> Result<Step> {
        self.respond(trial, Response::Timeout)
    }

    /// Applies a response to the awaited trial.
    ///
    /// # Arguments
    /// * `trial` - Identity of the trial the response belongs to
    /// * `response` - What the listener did
    ///
    /// # Returns
    /// * `Ok(Step::Ignored)` - `trial` is not the awaited trial
    /// * `Ok(Step::Presented(next))` - Next trial is sounding
    /// * `Ok(Step::Complete)` - Last threshold recorded
    /// * `Err(ScreeningError::PlaybackFailure)` - Next tone could not start; engine is idle
    pub fn respond(&mut self, trial: TrialId, response: Response) -> Result<Step> {
        let current = match self.phase {
            Phase::AwaitingResponse(current) if current.id == trial => current,
            phase => {
                debug!(%trial, ?response, ?phase, "Stale event ignored");
                return Ok(Step::Ignored);
            }
        };

        self.silence();

        match response {
            Response::Heard => {
                info!(
                    ear = %current.ear,
                    frequency = current.frequency,
                    db = current.db,
                    "Tone heard"
                );
                self.results.record(current.ear, current.frequency, current.db);
                self.advance()
            }
            Response::NotHeard | Response::Timeout => {
                debug!(
                    ear = %current.ear,
                    frequency = current.frequency,
                    db = current.db,
                    ?response,
                    "Tone not heard"
                );
                let next_db = current.db - self.config.step_db;
                if next_db < self.config.min_db {
                    info!(
                        ear = %current.ear,
                        frequency = current.frequency,
                        "No response down to minimum level, recording ceiling"
                    );
                    self.results.record(current.ear, current.frequency, self.config.max_db);
                    self.advance()
                } else {
                    self.present(next_db)
                }
            }
        }
    }

    /// Cancels the run in progress.
    ///
    /// Stops any sounding tone before returning. Thresholds already recorded
    /// are kept; the outstanding trial is discarded.
    pub fn abort(&mut self) -> Result<()> {
        if self.phase == Phase::Complete {
            return Err(ScreeningError::InvalidState(
                "cannot abort a completed screening".to_string(),
            ));
        }
        self.silence();
        if let Some(trial) = self.current_trial() {
            info!(trial = %trial.id, "Screening aborted");
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Stops any tone, clears all results and returns to `Idle` from any phase.
    pub fn reset(&mut self) {
        self.silence();
        self.results.clear();
        self.ear = Ear::Left;
        self.frequency_index = 0;
        self.current_db = self.config.max_db;
        self.phase = Phase::Idle;
    }

    /// Moves to the next frequency, then the next ear, then completion.
    fn advance(&mut self) -> Result<Step> {
        if self.frequency_index + 1 < self.config.frequencies.len() {
            self.phase = Phase::AdvancingFrequency;
            self.frequency_index += 1;
        } else if let Some(next_ear) = self.ear.next() {
            self.phase = Phase::AdvancingEar;
            info!(from = %self.ear, to = %next_ear, "Switching ear");
            self.ear = next_ear;
            self.frequency_index = 0;
        } else {
            self.phase = Phase::Complete;
            info!(records = self.results.len(), "Screening complete");
            return Ok(Step::Complete);
        }
        self.present(self.config.max_db)
    }

    /// Starts a tone at `db` for the current ear and frequency.
    fn present(&mut self, db: i32) -> Result<Step> {
        let frequency = self.config.frequencies[self.frequency_index];
        self.current_db = db;
        self.next_trial += 1;
        let trial = Trial {
            id: TrialId(self.next_trial),
            ear: self.ear,
            frequency,
            db,
        };

        self.synth.set_ear(trial.ear);
        if let Err(e) = self.synth.play_tone(frequency as f32, db as f32) {
            warn!(ear = %trial.ear, frequency, db, "Failed to play test tone: {}", e);
            self.phase = Phase::Idle;
            return Err(ScreeningError::PlaybackFailure(e.to_string()));
        }
        self.sounding = true;
        self.phase = Phase::AwaitingResponse(trial);

        info!(trial = %trial.id, ear = %trial.ear, frequency, db, "Presenting tone");
        Ok(Step::Presented(trial))
    }

    fn ensure_initialized(&mut self) -> Result<()> {
        if !self.initialized {
            self.synth
                .initialize()
                .map_err(|e| ScreeningError::PlaybackFailure(e.to_string()))?;
            self.initialized = true;
        }
        Ok(())
    }

    fn silence(&mut self) {
        if self.sounding {
            self.synth.stop_tone();
            self.sounding = false;
        }
    }

    fn require_idle(&self, action: &str) -> Result<()> {
        if self.phase == Phase::Idle {
            Ok(())
        } else {
            Err(ScreeningError::InvalidState(format!(
                "cannot {} while {:?}",
                action, self.phase
            )))
        }
    }
}
