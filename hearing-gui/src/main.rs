//! # Hearing Screening GUI
//!
//! Desktop front end for the pure-tone hearing screening. It walks the
//! listener through calibration and the test, then shows the audiogram and
//! lets them save the results.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Session Thread**: Threshold search and tone output (`hearing_core::session`)
//! - **Communication**: `SessionHandle` mailbox, drained every 16 ms via subscription

mod ui;

use hearing_core::audio::CpalToneSynth;
use hearing_core::engine::{Response, Trial};
use hearing_core::results::{ResultsSnapshot, save_report};
use hearing_core::session::{SessionCommand, SessionHandle, SessionUpdate};
use hearing_core::ScreeningConfig;
use iced::{Element, Subscription, Theme};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Optional configuration file, read from the working directory.
const CONFIG_FILE: &str = "screening_config.json";

/// How long the calibration tone plays before the test can be started.
const CALIBRATION_LEAD_TIME: Duration = Duration::from_secs(5);

const TICK_INTERVAL: Duration = Duration::from_millis(16);

const RETRY_HINT: &str = "Please check your audio settings and try again.";

pub fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting hearing screening");
    let result = iced::application("Hearing Screening", ScreeningApp::update, ScreeningApp::view)
        .subscription(ScreeningApp::subscription)
        .theme(ScreeningApp::theme)
        .run();
    info!("Application finished");
    result
}

#[derive(Debug, Clone)]
pub enum Message {
    OpenCalibration,
    PlayCalibration,
    StartTest,
    Heard,
    NotHeard,
    DownloadResults,
    Restart,
    /// Timer tick: poll the session for updates
    Tick,
}

/// The screen currently shown.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Welcome,
    Calibration {
        /// When the calibration tone started, once it is playing.
        tone_started: Option<Instant>,
    },
    Test {
        /// `None` until the first tone is confirmed by the session.
        trial: Option<Trial>,
        progress: f32,
    },
    Results(ResultsSnapshot),
}

/// Main application state.
pub struct ScreeningApp {
    config: ScreeningConfig,
    screen: Screen,
    session: Option<SessionHandle>,
    /// Status or error line shown under the current screen.
    notice: Option<String>,
}

impl Default for ScreeningApp {
    fn default() -> Self {
        let (config, mut notice) = match ScreeningConfig::load_or_default(CONFIG_FILE) {
            Ok(config) => (config, None),
            Err(e) => {
                warn!("Ignoring {}: {}", CONFIG_FILE, e);
                (
                    ScreeningConfig::default(),
                    Some(format!("Could not read {}, using default settings.", CONFIG_FILE)),
                )
            }
        };

        let session = match SessionHandle::spawn(config.clone(), CpalToneSynth::new) {
            Ok(session) => Some(session),
            Err(e) => {
                error!("Failed to start screening session: {}", e);
                notice = Some("Audio is unavailable. Please restart the application.".to_string());
                None
            }
        };

        Self {
            config,
            screen: Screen::Welcome,
            session,
            notice,
        }
    }
}

impl ScreeningApp {
    fn update(&mut self, message: Message) {
        match message {
            Message::OpenCalibration => {
                self.notice = None;
                self.screen = Screen::Calibration { tone_started: None };
            }
            Message::PlayCalibration => {
                self.notice = None;
                self.send(SessionCommand::PlayCalibration);
            }
            Message::StartTest => {
                if matches!(self.screen, Screen::Calibration { tone_started: Some(_) }) {
                    self.notice = None;
                    self.screen = Screen::Test {
                        trial: None,
                        progress: 0.0,
                    };
                    self.send(SessionCommand::Start);
                }
            }
            Message::Heard => self.respond(Response::Heard),
            Message::NotHeard => self.respond(Response::NotHeard),
            Message::DownloadResults => {
                if let Screen::Results(snapshot) = &self.screen {
                    self.notice = Some(match save_report(&snapshot.report(), ".") {
                        Ok(path) => format!("Results saved to {}", path.display()),
                        Err(e) => {
                            error!("Failed to save results: {}", e);
                            format!("Could not save results: {}", e)
                        }
                    });
                }
            }
            Message::Restart => {
                info!("Restarting screening");
                self.send(SessionCommand::Reset);
                self.notice = None;
                self.screen = Screen::Welcome;
            }
            Message::Tick => {
                let updates = self
                    .session
                    .as_ref()
                    .map(SessionHandle::drain_updates)
                    .unwrap_or_default();
                for update in updates {
                    self.apply(update);
                }
            }
        }
    }

    /// Folds one session update into the screen state.
    fn apply(&mut self, update: SessionUpdate) {
        match update {
            SessionUpdate::CalibrationPlaying => {
                if let Screen::Calibration { tone_started } = &mut self.screen {
                    tone_started.get_or_insert_with(Instant::now);
                }
            }
            SessionUpdate::CalibrationFailed(reason) => {
                warn!("Calibration tone failed: {}", reason);
                self.notice = Some(format!("Failed to play calibration tone. {}", RETRY_HINT));
            }
            SessionUpdate::TrialPresented { trial, progress } => {
                if matches!(self.screen, Screen::Test { .. }) {
                    self.screen = Screen::Test {
                        trial: Some(trial),
                        progress,
                    };
                }
            }
            SessionUpdate::Completed(snapshot) => {
                info!(left = snapshot.left.len(), right = snapshot.right.len(), "Showing results");
                self.screen = Screen::Results(snapshot);
            }
            SessionUpdate::PlaybackFailed(reason) => {
                warn!("Test tone failed: {}", reason);
                self.notice = Some(format!("Failed to play test tone. {}", RETRY_HINT));
                self.screen = Screen::Calibration { tone_started: None };
            }
            SessionUpdate::Idle => {}
        }
    }

    fn respond(&self, response: Response) {
        if let Screen::Test { trial: Some(trial), .. } = &self.screen {
            if let Some(session) = &self.session {
                if let Err(e) = session.respond(trial.id, response) {
                    error!("Failed to send response: {}", e);
                }
            }
        }
    }

    fn send(&self, command: SessionCommand) {
        match &self.session {
            Some(session) => {
                if let Err(e) = session.send(command) {
                    error!("Failed to send {:?}: {}", command, e);
                }
            }
            None => warn!(?command, "No screening session"),
        }
    }

    /// Whether the listener has heard the calibration tone long enough to continue.
    fn calibration_ready(&self) -> bool {
        match self.screen {
            Screen::Calibration {
                tone_started: Some(started),
            } => started.elapsed() >= CALIBRATION_LEAD_TIME,
            _ => false,
        }
    }

    fn view(&self) -> Element<'_, Message> {
        let notice = self.notice.as_deref();
        match &self.screen {
            Screen::Welcome => ui::screens::welcome(notice),
            Screen::Calibration { tone_started } => {
                ui::screens::calibration(tone_started.is_some(), self.calibration_ready(), notice)
            }
            Screen::Test { trial, progress } => {
                ui::screens::listening_test(trial.as_ref(), *progress, notice)
            }
            Screen::Results(snapshot) => ui::screens::results(snapshot, &self.config, notice),
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        iced::time::every(TICK_INTERVAL).map(|_| Message::Tick)
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
