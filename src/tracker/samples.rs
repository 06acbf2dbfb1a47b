//! Per-session EXP samples.

use chrono::{DateTime, Local};

use crate::ocr::ParsedReading;

/// One EXP value read from the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub value: u64,
    pub observed_at: DateTime<Local>,
}

/// What a reading changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The reading became the session baseline
    pub started: bool,
    /// The level percentage was captured with this reading
    pub percent_captured: bool,
}

/// Holds the baseline, the latest reading, and the session-start percentage.
///
/// `first` and `percent` are written once per session; `latest` follows every
/// accepted reading.
#[derive(Clone, Debug, Default)]
pub struct ExpSamples {
    first: Option<Sample>,
    latest: Option<Sample>,
    percent: Option<f64>,
    percent_text: Option<String>,
}

impl ExpSamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn first(&self) -> Option<Sample> {
        self.first
    }

    pub fn latest(&self) -> Option<Sample> {
        self.latest
    }

    pub fn percent(&self) -> Option<f64> {
        self.percent
    }

    /// The session-start percent as it was read.
    pub fn percent_text(&self) -> Option<&str> {
        self.percent_text.as_deref()
    }

    /// Applies a parsed reading observed at `at`.
    ///
    /// Returns `None` when the reading carries no EXP value; nothing changes then.
    pub fn record(&mut self, reading: &ParsedReading, at: DateTime<Local>) -> Option<RecordOutcome> {
        let value = reading.exp?;
        let sample = Sample { value, observed_at: at };
        let mut outcome = RecordOutcome::default();

        if self.first.is_none() {
            self.first = Some(sample);
            outcome.started = true;
            if let Some(percent) = reading.percent {
                self.percent = Some(percent);
                self.percent_text = reading.percent_text.clone();
                outcome.percent_captured = true;
            }
        }
        self.latest = Some(sample);

        Some(outcome)
    }

    /// Clears the session so the next reading becomes the new baseline.
    pub fn reset(&mut self) {
        self.first = None;
        self.latest = None;
        self.percent = None;
        self.percent_text = None;
    }
}
