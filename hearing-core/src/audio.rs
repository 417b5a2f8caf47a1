//! # Tone Output Module
//!
//! This module handles pure-tone playback using CPAL (Cross-Platform Audio Library).
//! The screening engine talks to it only through the [`ToneSynthesizer`] trait,
//! so the staircase logic never touches an audio device directly.
//!
//! ## Features
//! - Automatic output device selection
//! - Sine oscillator rendered in the audio callback
//! - Left / right / both channel routing
//! - Short gain glide on start and stop to avoid clicks
//! - Fixed calibration mapping from dB to output gain

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};
use tracing::{debug, error, info, warn};

use crate::Ear;
use crate::config::{CalibrationTone, ScreeningConfig};

/// Per-sample smoothing factor applied to the output gain.
/// At 44.1 kHz this settles within a few milliseconds.
const GAIN_GLIDE: f32 = 0.005;

/// Capability the threshold search needs from an audio backend.
///
/// Implementations must tolerate `stop_tone` being called when nothing is
/// sounding. The engine guarantees `play_tone` and `stop_tone` alternate.
pub trait ToneSynthesizer {
    /// Prepares the output device. Called once before the first tone.
    fn initialize(&mut self) -> Result<()>;

    /// Routes subsequent tones to the given ear.
    fn set_ear(&mut self, ear: Ear);

    /// Starts a continuous tone, replacing any tone already sounding.
    fn play_tone(&mut self, frequency_hz: f32, db: f32) -> Result<()>;

    fn stop_tone(&mut self);

    /// Plays the fixed calibration tone on both channels.
    fn play_calibration_tone(&mut self) -> Result<()>;
}

/// Output channel selection for a tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routing {
    Left,
    Right,
    Both,
}

impl Routing {
    fn to_u8(self) -> u8 {
        match self {
            Routing::Left => 0,
            Routing::Right => 1,
            Routing::Both => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Routing::Left,
            1 => Routing::Right,
            _ => Routing::Both,
        }
    }

    /// Whether output channel `channel` of a `channels`-wide frame carries the tone.
    /// Mono devices always carry it.
    pub fn includes_channel(self, channel: usize, channels: usize) -> bool {
        if channels == 1 {
            return true;
        }
        match self {
            Routing::Left => channel == 0,
            Routing::Right => channel == 1,
            Routing::Both => channel < 2,
        }
    }
}

impl From<Ear> for Routing {
    fn from(ear: Ear) -> Self {
        match ear {
            Ear::Left => Routing::Left,
            Ear::Right => Routing::Right,
        }
    }
}

/// Converts a presentation level to a linear output gain.
///
/// `reference_db` is the level that reaches full scale; louder levels are
/// capped at a gain of 1.0.
///
/// # Arguments
/// * `db` - Presentation level in dB
/// * `reference_db` - Calibrated full-scale level in dB
pub fn db_to_gain(db: f32, reference_db: f32) -> f32 {
    10.0_f32.powf((db - reference_db) / 20.0).min(1.0)
}

/// Tone parameters shared with the audio callback.
#[derive(Debug)]
struct ToneParams {
    frequency_bits: AtomicU32,
    gain_bits: AtomicU32,
    routing: AtomicU8,
    sounding: AtomicBool,
}

impl Default for ToneParams {
    fn default() -> Self {
        Self {
            frequency_bits: AtomicU32::new(1000.0_f32.to_bits()),
            gain_bits: AtomicU32::new(0.0_f32.to_bits()),
            routing: AtomicU8::new(Routing::Left.to_u8()),
            sounding: AtomicBool::new(false),
        }
    }
}

/// [`ToneSynthesizer`] backed by the default CPAL output device.
///
/// The stream is opened lazily and kept running for the lifetime of the
/// synthesizer; stopping a tone only ramps the gain to zero.
/// `cpal::Stream` is not `Send`, so create this on the thread that drives it.
pub struct CpalToneSynth {
    params: Arc<ToneParams>,
    stream: Option<cpal::Stream>,
    calibration: CalibrationTone,
    reference_db: f32,
    target_sample_rate: u32,
}

impl CpalToneSynth {
    pub fn new(config: &ScreeningConfig) -> Self {
        Self {
            params: Arc::new(ToneParams::default()),
            stream: None,
            calibration: config.calibration,
            reference_db: config.reference_db,
            target_sample_rate: config.sample_rate,
        }
    }

    fn set_routing(&mut self, routing: Routing) {
        self.params.routing.store(routing.to_u8(), Ordering::Relaxed);
    }

    /// Opens the default output device and starts the oscillator stream.
    ///
    /// # Returns
    /// * `Ok(stream)` - Running output stream
    /// * `Err(e)` - No device, no usable format, or stream creation failed
    fn open_stream(&self) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;

        info!(device = %device.name()?, "Using audio output device");

        let configs = device.supported_output_configs()?.collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, self.target_sample_rate)
            .ok_or_else(|| anyhow!("No suitable f32 output format found"))?;

        let rate = self.target_sample_rate.clamp(
            supported_config.min_sample_rate().0,
            supported_config.max_sample_rate().0,
        );
        let config: cpal::StreamConfig = supported_config
            .with_sample_rate(cpal::SampleRate(rate))
            .into();

        info!(sample_rate = rate, channels = config.channels, "Selected output format");

        let channels = config.channels as usize;
        let sample_rate = rate as f32;
        let params = Arc::clone(&self.params);
        let mut phase = 0.0_f32;
        let mut current_gain = 0.0_f32;

        let err_fn = |err| error!("An error occurred on the audio stream: {}", err);

        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frequency = f32::from_bits(params.frequency_bits.load(Ordering::Relaxed));
                let target_gain = if params.sounding.load(Ordering::Relaxed) {
                    f32::from_bits(params.gain_bits.load(Ordering::Relaxed))
                } else {
                    0.0
                };
                let routing = Routing::from_u8(params.routing.load(Ordering::Relaxed));
                let phase_step = TAU * frequency / sample_rate;

                for frame in data.chunks_mut(channels) {
                    current_gain += (target_gain - current_gain) * GAIN_GLIDE;
                    let sample = phase.sin() * current_gain;
                    phase = (phase + phase_step) % TAU;

                    for (channel, out) in frame.iter_mut().enumerate() {
                        *out = if routing.includes_channel(channel, channels) {
                            sample
                        } else {
                            0.0
                        };
                    }
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;
        Ok(stream)
    }
}

impl ToneSynthesizer for CpalToneSynth {
    fn initialize(&mut self) -> Result<()> {
        if self.stream.is_none() {
            self.stream = Some(self.open_stream()?);
            info!("Audio output initialized");
        }
        Ok(())
    }

    fn set_ear(&mut self, ear: Ear) {
        self.set_routing(ear.into());
        debug!(%ear, "Switched output ear");
    }

    fn play_tone(&mut self, frequency_hz: f32, db: f32) -> Result<()> {
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return Err(anyhow!("Invalid tone frequency: {} Hz", frequency_hz));
        }
        self.initialize()?;

        let gain = db_to_gain(db, self.reference_db);
        self.params.frequency_bits.store(frequency_hz.to_bits(), Ordering::Relaxed);
        self.params.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
        self.params.sounding.store(true, Ordering::Release);

        debug!(frequency_hz, db, gain, "Playing tone");
        Ok(())
    }

    fn stop_tone(&mut self) {
        if self.params.sounding.swap(false, Ordering::AcqRel) {
            debug!("Tone stopped");
        }
    }

    fn play_calibration_tone(&mut self) -> Result<()> {
        self.set_routing(Routing::Both);
        info!("Playing calibration tone in both ears");
        let CalibrationTone { frequency_hz, level_db } = self.calibration;
        self.play_tone(frequency_hz, level_db)
    }
}

impl Drop for CpalToneSynth {
    fn drop(&mut self) {
        self.params.sounding.store(false, Ordering::Release);
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Error pausing output stream: {}", e);
            }
        }
    }
}

/// Finds the best supported output configuration for the target sample rate.
///
/// Requirements, in order of preference:
/// - 32-bit float format (required)
/// - Stereo, so left and right can be addressed separately
/// - Sample rate range closest to the target
///
/// # Returns
/// * `Some(config)` - Best matching configuration
/// * `None` - No f32 configuration available
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
            let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
            let in_range =
                c.min_sample_rate().0 <= target_rate && target_rate <= c.max_sample_rate().0;
            let rate_penalty = if in_range { 0 } else { min_diff.min(max_diff) };
            (c.channels() != 2, rate_penalty)
        })
}

/// Recording synthesizer used by the engine and session tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum SynthCall {
        Initialize,
        SetEar(Ear),
        Play { frequency: f32, db: f32 },
        Stop,
        Calibration,
    }

    #[derive(Debug, Default)]
    pub struct SynthLog {
        pub calls: Vec<SynthCall>,
        pub sounding: bool,
        /// Number of times a tone was started while another was sounding.
        pub overlapping_starts: usize,
    }

    impl SynthLog {
        pub fn plays(&self) -> Vec<(f32, f32)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    SynthCall::Play { frequency, db } => Some((*frequency, *db)),
                    _ => None,
                })
                .collect()
        }
    }

    #[derive(Debug, Default, Clone)]
    pub struct RecordingSynth {
        pub log: Arc<Mutex<SynthLog>>,
        /// Fail every `play_tone` once this many tones have been played.
        pub fail_after_plays: Option<usize>,
        pub fail_initialize: bool,
    }

    impl RecordingSynth {
        pub fn snapshot(&self) -> Vec<SynthCall> {
            self.log.lock().unwrap().calls.clone()
        }

        pub fn plays(&self) -> Vec<(f32, f32)> {
            self.log.lock().unwrap().plays()
        }

        fn start(&mut self, call: SynthCall) -> Result<()> {
            let mut log = self.log.lock().unwrap();
            let played = log.plays().len();
            if self.fail_after_plays.is_some_and(|limit| played >= limit) {
                return Err(anyhow!("device lost"));
            }
            if log.sounding {
                log.overlapping_starts += 1;
            }
            log.sounding = true;
            log.calls.push(call);
            Ok(())
        }
    }

    impl ToneSynthesizer for RecordingSynth {
        fn initialize(&mut self) -> Result<()> {
            if self.fail_initialize {
                return Err(anyhow!("no output device"));
            }
            self.log.lock().unwrap().calls.push(SynthCall::Initialize);
            Ok(())
        }

        fn set_ear(&mut self, ear: Ear) {
            self.log.lock().unwrap().calls.push(SynthCall::SetEar(ear));
        }

        fn play_tone(&mut self, frequency_hz: f32, db: f32) -> Result<()> {
            self.start(SynthCall::Play { frequency: frequency_hz, db })
        }

        fn stop_tone(&mut self) {
            let mut log = self.log.lock().unwrap();
            log.sounding = false;
            log.calls.push(SynthCall::Stop);
        }

        fn play_calibration_tone(&mut self) -> Result<()> {
            self.start(SynthCall::Calibration)
        }
    }
}
