//! End-to-end screening through the public API: staircase run, audiogram
//! rendering and report export.

use hearing_core::audio::ToneSynthesizer;
use hearing_core::audiogram::{self, Shape, Surface, LEFT_EAR_COLOR, RIGHT_EAR_COLOR};
use hearing_core::engine::{Step, ThresholdSearch};
use hearing_core::results::{ResultsSnapshot, ResultsStore, save_report};
use hearing_core::{Ear, HearingStatus, ScreeningConfig};

use chrono::{TimeZone, Utc};

/// Synthesizer that accepts every call and produces no sound.
#[derive(Default)]
struct SilentSynth {
    tones: usize,
}

impl ToneSynthesizer for SilentSynth {
    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn set_ear(&mut self, _ear: Ear) {}

    fn play_tone(&mut self, _frequency_hz: f32, _db: f32) -> anyhow::Result<()> {
        self.tones += 1;
        Ok(())
    }

    fn stop_tone(&mut self) {}

    fn play_calibration_tone(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Runs a full screening for a listener with a fixed threshold per ear.
fn screen(left: i32, right: i32) -> ThresholdSearch<SilentSynth> {
    let mut engine =
        ThresholdSearch::new(ScreeningConfig::default(), SilentSynth::default()).unwrap();
    let mut step = engine.start().unwrap();
    while let Step::Presented(trial) = step {
        let threshold = match trial.ear {
            Ear::Left => left,
            Ear::Right => right,
        };
        step = if trial.db <= threshold {
            engine.on_heard(trial.id).unwrap()
        } else {
            engine.on_not_heard(trial.id).unwrap()
        };
    }
    engine
}

#[test]
fn full_run_classifies_each_ear() {
    let engine = screen(20, 45);
    let snapshot = engine.results().snapshot();

    assert!(engine.is_complete());
    assert!(snapshot.left.iter().all(|r| r.db == 20 && r.status == HearingStatus::Normal));
    assert!(snapshot.right.iter().all(|r| r.db == 45 && r.status == HearingStatus::ModerateLoss));

    // 15 tones per left frequency (90..=20), 10 per right frequency (90..=45).
    assert_eq!(engine.synthesizer().tones, 6 * 15 + 6 * 10);
}

#[test]
fn report_of_a_full_run_matches_export_format() {
    let engine = screen(20, 45);
    let timestamp = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
    let report = engine.results().snapshot().report_at(timestamp);

    let dir = tempfile::tempdir().unwrap();
    let path = save_report(&report, dir.path()).unwrap();
    assert!(path.ends_with("hearing-test-results-2025-01-02.json"));

    let data = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(value["timestamp"], "2025-01-02T03:04:05.000Z");
    assert_eq!(value["results"]["left"].as_array().unwrap().len(), 6);
    assert_eq!(
        value["results"]["right"][3],
        serde_json::json!({ "frequency": 2000, "dB": 45, "status": "Moderate Loss" })
    );
}

#[test]
fn audiogram_places_a_single_point_at_its_level() {
    let mut store = ResultsStore::new();
    store.record(Ear::Left, 1000, 20);
    let config = ScreeningConfig::default();

    let chart = audiogram::render(&store.snapshot(), &config, Surface::new(600.0, 440.0));

    let marker = chart
        .shapes
        .iter()
        .find_map(|s| match s {
            Shape::Marker { center, color, .. } if *color == LEFT_EAR_COLOR && center.y > 40.0 => {
                Some(*center)
            }
            _ => None,
        })
        .unwrap();

    // Plot spans y = 60..360; 20 dB is 30% of the way down from -10 dB.
    assert!(((marker.y - 60.0) / 300.0 - 0.30).abs() < 1e-4);
    assert!(chart.shapes.iter().all(|s| !matches!(s, Shape::Polyline { .. })));
    assert!(chart.skipped.is_empty());
}

#[test]
fn audiogram_of_a_full_run_draws_one_line_per_ear() {
    let engine = screen(20, 45);
    let config = ScreeningConfig::default();
    let surface = Surface::new(800.0, 500.0);

    let chart = audiogram::render(&engine.results().snapshot(), &config, surface);
    let lines: Vec<_> = chart
        .shapes
        .iter()
        .filter_map(|s| match s {
            Shape::Polyline { points, color, .. } => Some((points.len(), *color)),
            _ => None,
        })
        .collect();

    assert_eq!(lines, vec![(6, LEFT_EAR_COLOR), (6, RIGHT_EAR_COLOR)]);
    assert_eq!(chart, audiogram::render(&engine.results().snapshot(), &config, surface));
}

#[test]
fn empty_results_render_axes_only() {
    let chart = audiogram::render(
        &ResultsSnapshot::default(),
        &ScreeningConfig::default(),
        Surface::new(600.0, 440.0),
    );
    assert!(!chart.shapes.is_empty());
    assert!(chart.shapes.iter().all(|s| !matches!(s, Shape::Polyline { .. })));
}
