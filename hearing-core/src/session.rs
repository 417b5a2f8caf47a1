//! # Screening Session
//!
//! Runs a [`ThresholdSearch`] on a dedicated worker thread and feeds it from a
//! single mailbox. Two producers race into that mailbox:
//! - the front end, sending [`SessionCommand`]s (including listener responses)
//! - a per-trial response-window deadline, armed with `crossbeam_channel::after`
//!
//! Whichever arrives first for the awaited trial wins; the loser carries a
//! stale [`TrialId`] and the engine discards it.
//!
//! ## Architecture
//! - **Worker thread**: owns the engine and the tone synthesizer
//! - **Commands**: front end → worker (crossbeam channel)
//! - **Updates**: worker → front end (crossbeam channel, polled by the GUI)

use crossbeam_channel::{Receiver, Sender, after, never, select};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::ToneSynthesizer;
use crate::config::ScreeningConfig;
use crate::engine::{Response, Step, ThresholdSearch, Trial, TrialId};
use crate::error::{Result, ScreeningError};
use crate::results::ResultsSnapshot;

/// Requests from the front end to the session worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    PlayCalibration,
    Start,
    Respond { trial: TrialId, response: Response },
    Abort,
    /// Clear all results and return to idle.
    Reset,
    Shutdown,
}

/// Notifications from the session worker to the front end.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    CalibrationPlaying,
    CalibrationFailed(String),
    TrialPresented { trial: Trial, progress: f32 },
    Completed(ResultsSnapshot),
    /// A tone could not be played. The session is idle; the front end should
    /// send the listener back to calibration.
    PlaybackFailed(String),
    Idle,
}

/// Runs the session loop until `Shutdown` or until the command channel closes.
///
/// # Arguments
/// * `engine` - Idle threshold search to drive
/// * `commands` - Front-end mailbox
/// * `updates` - Channel for progress and results
pub fn run<S: ToneSynthesizer>(
    mut engine: ThresholdSearch<S>,
    commands: Receiver<SessionCommand>,
    updates: Sender<SessionUpdate>,
) {
    let window = engine.config().response_window();
    let mut deadline: Receiver<Instant> = never();
    let mut armed: Option<TrialId> = None;

    info!(window_ms = window.as_millis() as u64, "Session worker running");

    loop {
        let outcome = select! {
            recv(commands) -> msg => match msg {
                Ok(SessionCommand::Shutdown) | Err(_) => {
                    engine.reset();
                    break;
                }
                Ok(command) => handle_command(&mut engine, command),
            },
            recv(deadline) -> _ => match armed {
                Some(trial) => {
                    debug!(%trial, "Response window elapsed");
                    engine.on_timeout(trial).map(Outcome::Step)
                }
                None => Ok(Outcome::Nothing),
            },
        };

        let update = match outcome {
            Ok(Outcome::Step(Step::Presented(trial))) => {
                deadline = after(window);
                armed = Some(trial.id);
                Some(SessionUpdate::TrialPresented {
                    trial,
                    progress: engine.progress(),
                })
            }
            Ok(Outcome::Step(Step::Complete)) => {
                deadline = never();
                armed = None;
                Some(SessionUpdate::Completed(engine.results().snapshot()))
            }
            Ok(Outcome::Step(Step::Ignored)) | Ok(Outcome::Nothing) => None,
            Ok(Outcome::Calibrating) => Some(SessionUpdate::CalibrationPlaying),
            Ok(Outcome::CalibrationFailed(message)) => {
                Some(SessionUpdate::CalibrationFailed(message))
            }
            Ok(Outcome::Idle) => {
                deadline = never();
                armed = None;
                Some(SessionUpdate::Idle)
            }
            Err(ScreeningError::PlaybackFailure(message)) => {
                deadline = never();
                armed = None;
                Some(SessionUpdate::PlaybackFailed(message))
            }
            Err(e) => {
                warn!("Session command rejected: {}", e);
                None
            }
        };

        if let Some(update) = update {
            if updates.send(update).is_err() {
                error!("Update channel closed, stopping session");
                engine.reset();
                break;
            }
        }
    }

    info!("Session worker finished");
}

/// What a mailbox event did to the engine.
enum Outcome {
    Step(Step),
    Calibrating,
    CalibrationFailed(String),
    Idle,
    Nothing,
}

fn handle_command<S: ToneSynthesizer>(
    engine: &mut ThresholdSearch<S>,
    command: SessionCommand,
) -> Result<Outcome> {
    match command {
        SessionCommand::PlayCalibration => match engine.play_calibration_tone() {
            Ok(()) => Ok(Outcome::Calibrating),
            Err(ScreeningError::PlaybackFailure(message)) => {
                warn!("Failed to play calibration tone: {}", message);
                Ok(Outcome::CalibrationFailed(message))
            }
            Err(e) => Err(e),
        },
        SessionCommand::Start => engine.start().map(Outcome::Step),
        SessionCommand::Respond { trial, response } => {
            engine.respond(trial, response).map(Outcome::Step)
        }
        SessionCommand::Abort => engine.abort().map(|_| Outcome::Idle),
        SessionCommand::Reset => {
            engine.reset();
            Ok(Outcome::Idle)
        }
        // Handled by the loop before dispatch.
        SessionCommand::Shutdown => Ok(Outcome::Nothing),
    }
}

/// Handle to a session running on its own thread.
///
/// Dropping the handle shuts the session down and waits for the worker.
pub struct SessionHandle {
    commands: Sender<SessionCommand>,
    updates: Receiver<SessionUpdate>,
    thread_handle: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Spawns the session worker.
    ///
    /// The synthesizer is built on the worker thread by `factory`, since audio
    /// streams generally cannot move between threads.
    ///
    /// # Arguments
    /// * `config` - Screening parameters, validated before the thread starts
    /// * `factory` - Builds the tone synthesizer from the configuration
    pub fn spawn<S, F>(config: ScreeningConfig, factory: F) -> Result<Self>
    where
        S: ToneSynthesizer + 'static,
        F: FnOnce(&ScreeningConfig) -> S + Send + 'static,
    {
        config.validate()?;
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (update_tx, update_rx) = crossbeam_channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("screening-session".to_string())
            .spawn(move || {
                let synth = factory(&config);
                match ThresholdSearch::new(config, synth) {
                    Ok(engine) => run(engine, command_rx, update_tx),
                    Err(e) => error!("Could not create threshold search: {}", e),
                }
            })?;

        Ok(Self {
            commands: command_tx,
            updates: update_rx,
            thread_handle: Some(thread_handle),
        })
    }

    /// Queues a command for the worker.
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ScreeningError::InvalidState("session worker has stopped".to_string()))
    }

    pub fn respond(&self, trial: TrialId, response: Response) -> Result<()> {
        self.send(SessionCommand::Respond { trial, response })
    }

    /// Returns every update received since the last call, without blocking.
    pub fn drain_updates(&self) -> Vec<SessionUpdate> {
        self.updates.try_iter().collect()
    }

    pub fn updates(&self) -> &Receiver<SessionUpdate> {
        &self.updates
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                error!("Session worker panicked");
            }
        }
    }
}
