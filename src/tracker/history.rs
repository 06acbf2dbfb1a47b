//! Per-session CSV history of accepted readings.
//!
//! Rows are appended one at a time so a crash loses at most the reading being
//! written.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// CSV header row.
const CSV_HEADER: &str = "timestamp,exp,percent,exp_gained,exp_per_10min";

/// One accepted reading with the metrics at that moment.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryRow {
    pub observed_at: DateTime<Local>,
    pub exp: u64,
    pub percent: Option<f64>,
    pub exp_gained: i64,
    pub exp_per_10min: f64,
}

/// The CSV file of one session.
#[derive(Debug)]
pub struct SessionHistory {
    path: PathBuf,
}

impl SessionHistory {
    /// Opens `<dir>/<YYYYMMDD_HHMMSS>.csv` for a session started at
    /// `started_at`, writing the header when the file is new.
    pub fn start(dir: &Path, started_at: DateTime<Local>) -> Result<Self> {
        let path = dir.join(format!("{}.csv", started_at.format("%Y%m%d_%H%M%S")));
        init_csv(&path)?;
        tracing::info!("Recording session history to {}", path.display());
        Ok(Self { path })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one row.
    pub fn append(&self, row: &HistoryRow) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("Failed to open history CSV for append")?;

        let percent = row.percent.map(|p| p.to_string()).unwrap_or_default();
        let line = format!(
            "{},{},{},{},{}",
            row.observed_at.format("%Y-%m-%dT%H:%M:%S"),
            row.exp,
            percent,
            row.exp_gained,
            row.exp_per_10min.round() as i64,
        );

        writeln!(file, "{}", line).context("Failed to write history row")?;
        Ok(())
    }
}

/// Creates the CSV with a header unless it already has content.
fn init_csv(path: &Path) -> Result<()> {
    if path.exists() {
        let file = File::open(path).context("Failed to open existing history CSV")?;
        let reader = BufReader::new(file);
        if reader.lines().next().is_some() {
            return Ok(());
        }
    }

    let mut file = File::create(path).context("Failed to create history CSV")?;
    writeln!(file, "{}", CSV_HEADER).context("Failed to write history header")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn started() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap()
    }

    #[test]
    fn test_start_names_file_and_writes_header() {
        let dir = tempdir().unwrap();
        let history = SessionHistory::start(dir.path(), started()).unwrap();

        assert_eq!(history.path().file_name().unwrap(), "20240501_093005.csv");
        let content = std::fs::read_to_string(history.path()).unwrap();
        assert_eq!(content, format!("{}\n", CSV_HEADER));
    }

    #[test]
    fn test_append_rows() {
        let dir = tempdir().unwrap();
        let history = SessionHistory::start(dir.path(), started()).unwrap();

        history
            .append(&HistoryRow {
                observed_at: started(),
                exp: 1000,
                percent: Some(10.5),
                exp_gained: 0,
                exp_per_10min: 0.0,
            })
            .unwrap();
        history
            .append(&HistoryRow {
                observed_at: started() + chrono::Duration::seconds(60),
                exp: 1600,
                percent: None,
                exp_gained: 600,
                exp_per_10min: 6000.4,
            })
            .unwrap();

        let content = std::fs::read_to_string(history.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "2024-05-01T09:30:05,1000,10.5,0,0");
        assert_eq!(lines[2], "2024-05-01T09:31:05,1600,,600,6000");
    }

    #[test]
    fn test_restart_in_same_second_keeps_rows() {
        let dir = tempdir().unwrap();
        let history = SessionHistory::start(dir.path(), started()).unwrap();
        history
            .append(&HistoryRow {
                observed_at: started(),
                exp: 1,
                percent: None,
                exp_gained: 0,
                exp_per_10min: 0.0,
            })
            .unwrap();

        let again = SessionHistory::start(dir.path(), started()).unwrap();
        let content = std::fs::read_to_string(again.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert_eq!(content.matches(CSV_HEADER).count(), 1);
    }
}
