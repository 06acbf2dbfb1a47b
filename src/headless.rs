//! Headless runner.
//!
//! Runs the capture session without a window. The region comes from the
//! `selection` in config.json and snapshots are written as JSON lines to
//! `telemetry_path` or stdout.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use crate::config::TrackerConfig;
use crate::tracker::{CaptureSession, JsonLinesSink, TelemetrySink, TickOutcome};

/// Runs until the telemetry sink goes away.
pub fn run_headless(config: &TrackerConfig, mut session: CaptureSession) -> Result<()> {
    let selection = config
        .selection
        .ok_or_else(|| anyhow!("Headless mode needs a \"selection\" rectangle in config.json"))?;
    if !selection.is_valid(config.min_selection_px) {
        tracing::warn!(
            "Selection {}x{} is below the {} px minimum; nothing will be read",
            selection.width,
            selection.height,
            config.min_selection_px
        );
    }
    session.set_selection(selection);

    let mut sink = match &config.telemetry_path {
        Some(path) => {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                crate::paths::get_exe_dir().join(path)
            };
            tracing::info!("Writing telemetry to {}", path.display());
            JsonLinesSink::append_to(&path)?
        }
        None => JsonLinesSink::stdout(),
    };

    let interval = Duration::from_millis(config.sample_interval_ms.max(1));
    tracing::info!(
        "Headless: sampling {} every {} ms",
        session.source_description(),
        interval.as_millis()
    );
    run_loop(&mut session, &mut sink, interval, None)
}

/// Ticks every `interval`, applying results and publishing changes in
/// between. Stops after `max_ticks` when given, or when the sink closes.
pub fn run_loop(
    session: &mut CaptureSession,
    sink: &mut dyn TelemetrySink,
    interval: Duration,
    max_ticks: Option<u64>,
) -> Result<()> {
    let mut ticks = 0u64;

    while sink.is_open() {
        if max_ticks.is_some_and(|max| ticks >= max) {
            break;
        }
        let started = Instant::now();

        match session.on_tick() {
            Ok(TickOutcome::Submitted { .. }) | Ok(TickOutcome::Busy) => {}
            Ok(outcome) => tracing::debug!("Headless: tick skipped ({:?})", outcome),
            Err(e) => tracing::warn!("Headless: sampling tick failed: {:#}", e),
        }
        ticks += 1;

        // Wait out the rest of the interval, picking up results as they land
        let remaining = interval.saturating_sub(started.elapsed());
        session.wait_for_results(remaining);
        session.publish(Some(&mut *sink));

        let remaining = interval.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }

    if !sink.is_open() {
        tracing::info!("Headless: telemetry output closed, stopping");
    }
    Ok(())
}
