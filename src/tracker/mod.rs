//! EXP tracking: samples, derived metrics, snapshots, history, and the
//! capture session that ties them to the sampler and the OCR worker.

pub mod history;
pub mod metrics;
pub mod samples;
pub mod session;
pub mod snapshot;

pub use session::{CaptureSession, SessionSettings, TickOutcome};
pub use snapshot::{JsonLinesSink, Snapshot, TelemetryMessage, TelemetrySink};
