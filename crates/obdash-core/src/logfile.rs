//! Hourly telemetry log with two-hour retention.
//!
//! # Storage Format
//!
//! One file per local hour, `<dir>/sensor_data_<YYYY-MM-DD_HH>.json`. Despite
//! the extension each file is newline-delimited JSON, one record per line:
//!
//! ```text
//! {"timestamp":"2026-03-01T14:05:09.512345","sensors":{"turbo_pressure":1.2,...}}
//! ```
//!
//! On entering a new hour the previous file is closed, the new one opened in
//! append mode, and the file from exactly two hours earlier is deleted. That
//! single deletion keeps at most three files on disk; no directory sweep runs.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::channel::TelemetrySnapshot;

/// File name prefix of every hourly log.
pub const LOG_PREFIX: &str = "sensor_data_";

/// Hours of history kept behind the current file.
const RETENTION_HOURS: i64 = 2;

/// Hour bucket key, e.g. `2026-03-01_14`.
pub fn hour_bucket(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d_%H").to_string()
}

/// Path of the log file covering `now`.
pub fn log_path(dir: &Path, now: NaiveDateTime) -> PathBuf {
    dir.join(format!("{LOG_PREFIX}{}.json", hour_bucket(now)))
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// One persisted sampling pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO-8601 local time with microseconds.
    pub timestamp: String,
    pub sensors: TelemetrySnapshot,
}

impl LogEntry {
    pub fn new(now: NaiveDateTime, sensors: TelemetrySnapshot) -> Self {
        Self {
            timestamp: now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            sensors,
        }
    }
}

/// What a call to [`HourlyLog::rotate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rotation {
    /// Same hour as the open file; nothing touched.
    Unchanged,
    /// Entered a new hour.
    Rolled {
        opened: PathBuf,
        /// The two-hour-old file, if one existed and was removed.
        pruned: Option<PathBuf>,
    },
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct OpenLog {
    bucket: String,
    path: PathBuf,
    writer: BufWriter<File>,
}

/// Append-only writer for the hourly log files.
pub struct HourlyLog {
    dir: PathBuf,
    current: Option<OpenLog>,
    entries_written: u64,
}

impl HourlyLog {
    /// Create the log directory (and parents) if needed.
    ///
    /// Failure here means telemetry cannot be persisted at all, so callers
    /// treat it as fatal.
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            current: None,
            entries_written: 0,
        })
    }

    /// Make sure the file for `now`'s hour is the open one.
    ///
    /// Idempotent within an hour. When the hour changes, closes the old file,
    /// opens the new one in append mode, and deletes the file two hours back.
    pub fn rotate(&mut self, now: NaiveDateTime) -> std::io::Result<Rotation> {
        let bucket = hour_bucket(now);
        if self.current.as_ref().is_some_and(|c| c.bucket == bucket) {
            return Ok(Rotation::Unchanged);
        }

        if let Some(mut previous) = self.current.take() {
            if let Err(e) = previous.writer.flush() {
                log::warn!("flushing {}: {e}", previous.path.display());
            }
        }

        let path = log_path(&self.dir, now);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.current = Some(OpenLog {
            bucket,
            path: path.clone(),
            writer: BufWriter::new(file),
        });
        log::info!("logging telemetry to {}", path.display());

        let stale = log_path(&self.dir, now - TimeDelta::hours(RETENTION_HOURS));
        let pruned = match fs::remove_file(&stale) {
            Ok(()) => {
                log::info!("pruned {}", stale.display());
                Some(stale)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("could not prune {}: {e}", stale.display());
                None
            }
        };

        Ok(Rotation::Rolled {
            opened: path,
            pruned,
        })
    }

    /// Write one entry to the open file and flush it.
    pub fn append(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let Some(open) = self.current.as_mut() else {
            return Err(std::io::Error::other("no log file open; call rotate first"));
        };
        serde_json::to_writer(&mut open.writer, entry).map_err(std::io::Error::other)?;
        open.writer.write_all(b"\n")?;
        open.writer.flush()?;
        self.entries_written += 1;
        Ok(())
    }

    /// Rotate for `now`, then append a record of `sensors`.
    pub fn record(&mut self, now: NaiveDateTime, sensors: TelemetrySnapshot) -> std::io::Result<()> {
        self.rotate(now)?;
        self.append(&LogEntry::new(now, sensors))
    }

    /// Path of the currently open file.
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|c| c.path.as_path())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entries written since this writer was created.
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with(LOG_PREFIX))
            .collect();
        names.sort();
        names
    }

    // -----------------------------------------------------------------------
    // Naming tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_log_path_pattern() {
        let p = log_path(Path::new("logs"), at(9, 41));
        assert_eq!(p, PathBuf::from("logs/sensor_data_2026-03-01_09.json"));
    }

    #[test]
    fn test_entry_timestamp_is_iso8601() {
        let entry = LogEntry::new(at(14, 5), TelemetrySnapshot::fallback());
        assert_eq!(entry.timestamp, "2026-03-01T14:05:00.000000");
    }

    // -----------------------------------------------------------------------
    // Rotation tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_create_makes_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("a").join("b");
        let log = HourlyLog::create(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(log.current_path().is_none());
    }

    #[test]
    fn test_rotate_is_idempotent_within_hour() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = HourlyLog::create(tmp.path()).unwrap();

        let first = log.rotate(at(10, 0)).unwrap();
        assert!(matches!(first, Rotation::Rolled { pruned: None, .. }));

        // A file for 08:00 appearing now must not be touched by a same-hour call.
        let stale = log_path(tmp.path(), at(8, 0));
        fs::write(&stale, "").unwrap();

        assert_eq!(log.rotate(at(10, 59)).unwrap(), Rotation::Unchanged);
        assert!(stale.exists());
        assert_eq!(log_files(tmp.path()).len(), 2);
    }

    #[test]
    fn test_rotate_prunes_two_hours_back() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = log_path(tmp.path(), at(8, 0));
        fs::write(&stale, "{}\n").unwrap();

        let mut log = HourlyLog::create(tmp.path()).unwrap();
        match log.rotate(at(10, 15)).unwrap() {
            Rotation::Rolled { opened, pruned } => {
                assert_eq!(opened, log_path(tmp.path(), at(10, 0)));
                assert_eq!(pruned, Some(stale.clone()));
            }
            Rotation::Unchanged => panic!("expected a roll"),
        }
        assert!(!stale.exists());
    }

    #[test]
    fn test_retention_across_hour_boundaries() {
        let tmp = tempfile::tempdir().unwrap();
        // Fabricated files for now-1, now-2, now-3 (now = 12:xx).
        for hour in [9, 10, 11] {
            fs::write(log_path(tmp.path(), at(hour, 0)), "{}\n").unwrap();
        }

        let mut log = HourlyLog::create(tmp.path()).unwrap();
        for hour in [9, 10, 11, 12] {
            log.record(at(hour, 30), TelemetrySnapshot::fallback()).unwrap();
            assert!(log_files(tmp.path()).len() <= 3);
        }

        assert_eq!(
            log_files(tmp.path()),
            vec![
                "sensor_data_2026-03-01_11.json".to_string(),
                "sensor_data_2026-03-01_12.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_rotate_across_midnight() {
        let tmp = tempfile::tempdir().unwrap();
        let late = NaiveDate::from_ymd_opt(2026, 2, 28)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        let stale = log_path(tmp.path(), late);
        fs::write(&stale, "").unwrap();

        let mut log = HourlyLog::create(tmp.path()).unwrap();
        log.rotate(at(1, 0)).unwrap();
        assert!(!stale.exists());
    }

    // -----------------------------------------------------------------------
    // Append tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_append_without_rotate_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = HourlyLog::create(tmp.path()).unwrap();
        let entry = LogEntry::new(at(10, 0), TelemetrySnapshot::fallback());
        assert!(log.append(&entry).is_err());
    }

    #[test]
    fn test_record_writes_ndjson_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let mut log = HourlyLog::create(tmp.path()).unwrap();

        let mut snapshot = TelemetrySnapshot::fallback();
        snapshot.rpm = 2200;
        log.record(at(10, 0), snapshot).unwrap();
        log.record(at(10, 1), TelemetrySnapshot::fallback()).unwrap();
        assert_eq!(log.entries_written(), 2);

        // Flushed per entry, so readable while the writer is still open.
        let text = fs::read_to_string(log.current_path().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.sensors.rpm, 2200);
        assert_eq!(first.timestamp, "2026-03-01T10:00:00.000000");
        let raw: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(raw["sensors"]["air_fuel_ratio"], 14.7);
    }

    #[test]
    fn test_reopen_appends_to_existing_hour() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut log = HourlyLog::create(tmp.path()).unwrap();
            log.record(at(10, 0), TelemetrySnapshot::fallback()).unwrap();
        }
        let mut log = HourlyLog::create(tmp.path()).unwrap();
        log.record(at(10, 5), TelemetrySnapshot::fallback()).unwrap();

        let text = fs::read_to_string(log_path(tmp.path(), at(10, 0))).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
