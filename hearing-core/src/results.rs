//! # Results Module
//!
//! Accumulates the thresholds recorded during a screening run and turns them
//! into the exported report.
//!
//! The exported document has this exact shape:
//!
//! ```json
//! {
//!   "timestamp": "2024-05-01T09:30:00.000Z",
//!   "results": {
//!     "left":  [{ "frequency": 250, "dB": 75, "status": "Severe Loss" }],
//!     "right": []
//!   }
//! }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::Ear;
use crate::error::Result;
use crate::status::{HearingStatus, classify};

/// A finalized threshold for one (ear, frequency) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdRecord {
    pub ear: Ear,
    pub frequency: u32,
    pub db: i32,
    pub status: HearingStatus,
}

impl ThresholdRecord {
    pub fn new(ear: Ear, frequency: u32, db: i32) -> Self {
        Self {
            ear,
            frequency,
            db,
            status: classify(db),
        }
    }
}

/// Append-only store of thresholds, grouped by ear in recording order.
///
/// No de-duplication is performed; the engine visits each pair once per run.
#[derive(Debug, Clone, Default)]
pub struct ResultsStore {
    left: Vec<ThresholdRecord>,
    right: Vec<ThresholdRecord>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a threshold and returns the stored record.
    pub fn record(&mut self, ear: Ear, frequency: u32, db: i32) -> ThresholdRecord {
        let record = ThresholdRecord::new(ear, frequency, db);
        info!(%ear, frequency, db, status = %record.status, "Recorded threshold");
        match ear {
            Ear::Left => self.left.push(record),
            Ear::Right => self.right.push(record),
        }
        record
    }

    pub fn records(&self, ear: Ear) -> &[ThresholdRecord] {
        match ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        }
    }

    /// Total number of records over both ears.
    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    /// Immutable copy for rendering and export.
    pub fn snapshot(&self) -> ResultsSnapshot {
        ResultsSnapshot {
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }

    /// Export report stamped with the current time.
    pub fn report(&self) -> Report {
        self.snapshot().report()
    }
}

/// Frozen view of a [`ResultsStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsSnapshot {
    pub left: Vec<ThresholdRecord>,
    pub right: Vec<ThresholdRecord>,
}

impl ResultsSnapshot {
    pub fn records(&self, ear: Ear) -> &[ThresholdRecord] {
        match ear {
            Ear::Left => &self.left,
            Ear::Right => &self.right,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    pub fn report(&self) -> Report {
        self.report_at(Utc::now())
    }

    /// Builds the export document with the given timestamp.
    pub fn report_at(&self, timestamp: DateTime<Utc>) -> Report {
        let entries = |records: &[ThresholdRecord]| -> Vec<ReportEntry> {
            records
                .iter()
                .map(|r| ReportEntry {
                    frequency: r.frequency,
                    db: r.db,
                    status: classify(r.db),
                })
                .collect()
        };

        Report {
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            results: ReportResults {
                left: entries(&self.left),
                right: entries(&self.right),
            },
        }
    }
}

/// The exported results document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    pub results: ReportResults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportResults {
    pub left: Vec<ReportEntry>,
    pub right: Vec<ReportEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub frequency: u32,
    #[serde(rename = "dB")]
    pub db: i32,
    pub status: HearingStatus,
}

impl Report {
    /// File name the report is saved under: `hearing-test-results-YYYY-MM-DD.json`.
    pub fn file_name(&self) -> String {
        let date = self.timestamp.split('T').next().unwrap_or(&self.timestamp);
        format!("hearing-test-results-{}.json", date)
    }
}

/// Saves a report as pretty-printed JSON.
///
/// # Arguments
/// * `report` - The report to save
/// * `dir` - Directory the file is written to
///
/// # Returns
/// * `Ok(PathBuf)` - Path of the written file
/// * `Err(ScreeningError)` - File I/O or JSON serialization error
pub fn save_report(report: &Report, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(report.file_name());
    let json_string = serde_json::to_string_pretty(report)?;
    let mut file = File::create(&path)?;
    file.write_all(json_string.as_bytes())?;
    info!(path = %path.display(), "Saved results report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn records_are_grouped_by_ear_in_insertion_order() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 1000, 20);
        store.record(Ear::Right, 250, 35);
        store.record(Ear::Left, 250, 45);

        let left: Vec<u32> = store.records(Ear::Left).iter().map(|r| r.frequency).collect();
        assert_eq!(left, vec![1000, 250]);
        assert_eq!(store.records(Ear::Right).len(), 1);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn duplicates_are_kept() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 500, 30);
        store.record(Ear::Left, 500, 40);
        assert_eq!(store.records(Ear::Left).len(), 2);
    }

    #[test]
    fn record_carries_classified_status() {
        let mut store = ResultsStore::new();
        let record = store.record(Ear::Right, 4000, 65);
        assert_eq!(record.status, HearingStatus::ModeratelySevereLoss);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 250, 10);
        let snapshot = store.snapshot();
        store.record(Ear::Left, 500, 15);
        assert_eq!(snapshot.left.len(), 1);
        assert_eq!(store.records(Ear::Left).len(), 2);
    }

    #[test]
    fn report_has_export_shape() {
        let mut store = ResultsStore::new();
        store.record(Ear::Left, 250, 75);
        store.record(Ear::Left, 500, 20);

        let report = store.snapshot().report_at(fixed_time());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["timestamp"], "2024-05-01T09:30:00.000Z");
        assert_eq!(value["results"]["left"][0]["frequency"], 250);
        assert_eq!(value["results"]["left"][0]["dB"], 75);
        assert_eq!(value["results"]["left"][0]["status"], "Severe Loss");
        assert_eq!(value["results"]["left"][1]["status"], "Normal");
        assert_eq!(value["results"]["right"], serde_json::json!([]));

        let entry = value["results"]["left"][0].as_object().unwrap();
        let mut keys: Vec<&String> = entry.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["dB", "frequency", "status"]);
    }

    #[test]
    fn report_file_is_named_after_its_date() {
        let report = ResultsSnapshot::default().report_at(fixed_time());
        assert_eq!(report.file_name(), "hearing-test-results-2024-05-01.json");
    }

    #[test]
    fn saved_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultsStore::new();
        store.record(Ear::Right, 8000, 95);
        let report = store.snapshot().report_at(fixed_time());

        let path = save_report(&report, dir.path()).unwrap();
        let data = std::fs::read_to_string(&path).unwrap();
        let loaded: Report = serde_json::from_str(&data).unwrap();

        assert_eq!(loaded, report);
        assert_eq!(loaded.results.right[0].status, HearingStatus::ProfoundLoss);
    }
}
