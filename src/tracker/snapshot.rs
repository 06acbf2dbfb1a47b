//! Display snapshot and its delivery to telemetry sinks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use super::metrics::{format_duration, format_rate, format_time_to_level, number_with_commas, DerivedMetrics};
use super::samples::ExpSamples;

/// What the overlay and telemetry consumers display.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Latest EXP, comma-grouped
    pub exp: String,
    /// Session-start percent as read, "0" until known
    pub exp_percent: String,
    /// Session baseline EXP, comma-grouped
    pub started_from: String,
    /// Elapsed session time, "MM:SS"
    pub duration: String,
    #[serde(rename = "exp10min")]
    pub exp_10min: String,
    pub time_to_level: String,
}

impl Snapshot {
    pub fn build(samples: &ExpSamples, metrics: &DerivedMetrics) -> Self {
        let exp = samples.latest().map(|s| s.value).unwrap_or(0);
        let started_from = samples.first().map(|s| s.value).unwrap_or(0);

        Self {
            exp: number_with_commas(saturating_i64(exp)),
            exp_percent: samples.percent_text().unwrap_or("0").to_string(),
            started_from: number_with_commas(saturating_i64(started_from)),
            duration: format_duration(metrics.elapsed_seconds),
            exp_10min: format_rate(metrics.rate_per_10min),
            time_to_level: format_time_to_level(metrics.seconds_to_level),
        }
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Message envelope: `{"type": "EXP_UPDATE", "payload": {...}}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum TelemetryMessage {
    #[serde(rename = "EXP_UPDATE")]
    ExpUpdate(Snapshot),
}

/// A one-way consumer of telemetry messages.
pub trait TelemetrySink {
    /// False once the consumer has gone away.
    fn is_open(&self) -> bool;

    fn send(&mut self, message: &TelemetryMessage) -> Result<()>;
}

/// Sends snapshots to a sink, skipping ones identical to the last delivery.
#[derive(Debug, Default)]
pub struct Publisher {
    last_sent: Option<Snapshot>,
}

impl Publisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `snapshot` when it changed and the sink is open.
    ///
    /// Returns true when a message was sent. Sink errors are logged.
    pub fn publish(&mut self, snapshot: &Snapshot, sink: Option<&mut dyn TelemetrySink>) -> bool {
        let Some(sink) = sink else {
            return false;
        };
        if !sink.is_open() || self.last_sent.as_ref() == Some(snapshot) {
            return false;
        }

        match sink.send(&TelemetryMessage::ExpUpdate(snapshot.clone())) {
            Ok(()) => {
                self.last_sent = Some(snapshot.clone());
                true
            }
            Err(e) => {
                tracing::warn!("Failed to deliver snapshot: {:#}", e);
                false
            }
        }
    }

    /// Forgets the last delivery so the next publish always sends.
    ///
    /// Used when a new consumer attaches.
    pub fn forget(&mut self) {
        self.last_sent = None;
    }
}

/// Writes each message as one JSON line.
pub struct JsonLinesSink {
    writer: Box<dyn Write + Send>,
    open: bool,
}

impl JsonLinesSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { writer, open: true }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Appends to `path`, creating it if needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open telemetry file {}", path.display()))?;
        Ok(Self::new(Box::new(file)))
    }
}

impl TelemetrySink for JsonLinesSink {
    fn is_open(&self) -> bool {
        self.open
    }

    fn send(&mut self, message: &TelemetryMessage) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let result = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush());
        if let Err(e) = result {
            // A broken pipe will not recover
            if e.kind() == io::ErrorKind::BrokenPipe {
                self.open = false;
            }
            return Err(e).context("Failed to write telemetry line");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::ParsedReading;
    use chrono::{Duration, Local, TimeZone};
    use tempfile::tempdir;

    /// Records every message it receives.
    struct RecordingSink {
        open: bool,
        fail: bool,
        received: Vec<TelemetryMessage>,
    }

    impl RecordingSink {
        fn open() -> Self {
            Self { open: true, fail: false, received: Vec::new() }
        }
    }

    impl TelemetrySink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open
        }

        fn send(&mut self, message: &TelemetryMessage) -> Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("window went away"));
            }
            self.received.push(message.clone());
            Ok(())
        }
    }

    fn snapshot(exp: &str) -> Snapshot {
        Snapshot {
            exp: exp.to_string(),
            ..Snapshot::default()
        }
    }

    fn one_minute_samples() -> ExpSamples {
        let t0 = Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut samples = ExpSamples::new();
        let reading = |exp, percent| ParsedReading {
            normalized: String::new(),
            exp: Some(exp),
            percent,
            percent_text: percent.map(|_| "10.00".to_string()),
        };
        samples.record(&reading(1000, Some(10.0)), t0);
        samples.record(&reading(1600, None), t0 + Duration::seconds(60));
        samples
    }

    #[test]
    fn test_build_snapshot() {
        let samples = one_minute_samples();
        let metrics = DerivedMetrics::compute(samples.first(), samples.latest(), samples.percent());
        let snap = Snapshot::build(&samples, &metrics);

        assert_eq!(snap.exp, "1,600");
        assert_eq!(snap.exp_percent, "10.00");
        assert_eq!(snap.started_from, "1,000");
        assert_eq!(snap.duration, "01:00");
        assert_eq!(snap.exp_10min, "6,000");
        assert_eq!(snap.time_to_level, "00:14:00");
    }

    #[test]
    fn test_empty_snapshot() {
        let samples = ExpSamples::new();
        let snap = Snapshot::build(&samples, &DerivedMetrics::default());
        assert_eq!(snap.exp, "0");
        assert_eq!(snap.exp_percent, "0");
        assert_eq!(snap.started_from, "0");
        assert_eq!(snap.duration, "00:00");
        assert_eq!(snap.exp_10min, "0");
        assert_eq!(snap.time_to_level, "00:00:00");
    }

    #[test]
    fn test_message_envelope() {
        let samples = one_minute_samples();
        let metrics = DerivedMetrics::compute(samples.first(), samples.latest(), samples.percent());
        let message = TelemetryMessage::ExpUpdate(Snapshot::build(&samples, &metrics));

        let value: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "EXP_UPDATE");
        assert_eq!(value["payload"]["exp"], "1,600");
        assert_eq!(value["payload"]["expPercent"], "10.00");
        assert_eq!(value["payload"]["startedFrom"], "1,000");
        assert_eq!(value["payload"]["duration"], "01:00");
        assert_eq!(value["payload"]["exp10min"], "6,000");
        assert_eq!(value["payload"]["timeToLevel"], "00:14:00");
    }

    #[test]
    fn test_publish_skips_absent_and_closed_sinks() {
        let mut publisher = Publisher::new();
        assert!(!publisher.publish(&snapshot("1"), None));

        let mut sink = RecordingSink::open();
        sink.open = false;
        assert!(!publisher.publish(&snapshot("1"), Some(&mut sink)));
        assert!(sink.received.is_empty());
    }

    #[test]
    fn test_publish_only_on_change() {
        let mut publisher = Publisher::new();
        let mut sink = RecordingSink::open();

        assert!(publisher.publish(&snapshot("1"), Some(&mut sink)));
        assert!(!publisher.publish(&snapshot("1"), Some(&mut sink)));
        assert!(publisher.publish(&snapshot("2"), Some(&mut sink)));
        assert_eq!(sink.received.len(), 2);

        publisher.forget();
        assert!(publisher.publish(&snapshot("2"), Some(&mut sink)));
        assert_eq!(sink.received.len(), 3);
    }

    #[test]
    fn test_publish_swallows_sink_errors() {
        let mut publisher = Publisher::new();
        let mut sink = RecordingSink::open();
        sink.fail = true;
        assert!(!publisher.publish(&snapshot("1"), Some(&mut sink)));

        // Not remembered as delivered, so it goes out once the sink recovers
        sink.fail = false;
        assert!(publisher.publish(&snapshot("1"), Some(&mut sink)));
    }

    #[test]
    fn test_json_lines_sink_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");

        let mut sink = JsonLinesSink::append_to(&path).unwrap();
        sink.send(&TelemetryMessage::ExpUpdate(snapshot("1"))).unwrap();
        sink.send(&TelemetryMessage::ExpUpdate(snapshot("2"))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: TelemetryMessage = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, TelemetryMessage::ExpUpdate(snapshot("2")));
    }
}
