//! One capture session: selection, sampling, recognition results and the
//! samples they feed.
//!
//! The session is owned by a single thread (the GUI or the headless loop).
//! Only the OCR worker runs elsewhere, and it sees nothing but owned images.

use anyhow::Result;
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::PathBuf;
use std::time::Duration;

use super::history::{HistoryRow, SessionHistory};
use super::metrics::DerivedMetrics;
use super::samples::ExpSamples;
use super::snapshot::{Publisher, Snapshot, TelemetrySink};
use crate::capture::{FrameSampler, FrameSource};
use crate::config::TrackerConfig;
use crate::ocr::{
    prepare_for_ocr, OcrEngine, OcrJob, OcrOutcome, OcrWorker, ParsedReading, PreprocessOptions,
    RecognizeOptions, TextParser,
};
use crate::selection::{RegionSelector, SelectionRect, VideoPoint};

/// Session parameters taken from the config.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub preprocess: PreprocessOptions,
    pub recognize: RecognizeOptions,
    pub min_selection_px: u32,
    /// Directory for per-session CSV files; `None` disables history
    pub history_dir: Option<PathBuf>,
}

impl SessionSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            preprocess: PreprocessOptions {
                threshold: config.ocr_threshold,
                upscale: config.upscale_factor,
            },
            recognize: RecognizeOptions {
                whitelist: config.ocr_whitelist.clone(),
                layout: config.layout,
            },
            min_selection_px: config.min_selection_px,
            history_dir: config.record_history.then(crate::paths::get_sessions_dir),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            preprocess: PreprocessOptions::default(),
            recognize: RecognizeOptions::default(),
            min_selection_px: 8,
            history_dir: None,
        }
    }
}

/// What a sampling tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// No rectangle, or one below the minimum size
    NoSelection,
    /// The rectangle is being redrawn
    Dragging,
    /// The source has nothing buffered yet
    NoFrame,
    /// A previous recognition is still pending
    Busy,
    /// The selection lies outside the frame
    EmptyCrop,
    /// A crop was handed to the OCR worker
    Submitted { tick: u64 },
}

pub struct CaptureSession {
    source: Box<dyn FrameSource>,
    sampler: FrameSampler,
    selector: RegionSelector,
    worker: OcrWorker,
    parser: TextParser,
    settings: SessionSettings,
    samples: ExpSamples,
    publisher: Publisher,
    history: Option<SessionHistory>,
    /// Last tick number handed out
    tick: u64,
    /// Results of ticks before this one belong to a previous session
    session_start_tick: u64,
    last_reading: Option<ParsedReading>,
}

impl CaptureSession {
    pub fn new(
        source: Box<dyn FrameSource>,
        engine: Box<dyn OcrEngine>,
        settings: SessionSettings,
    ) -> Result<Self> {
        let parser = TextParser::new(&settings.recognize.whitelist)?;
        let worker = OcrWorker::spawn(engine)?;
        tracing::info!("Capture session on {}", source.describe());

        Ok(Self {
            source,
            sampler: FrameSampler::new(),
            selector: RegionSelector::new(),
            worker,
            parser,
            settings,
            samples: ExpSamples::new(),
            publisher: Publisher::new(),
            history: None,
            tick: 0,
            session_start_tick: 0,
            last_reading: None,
        })
    }

    // ----- selection -----

    pub fn on_pointer_down(&mut self, point: VideoPoint) {
        self.selector.pointer_down(point);
    }

    pub fn on_pointer_move(&mut self, point: VideoPoint) {
        self.selector.pointer_move(point);
    }

    /// Ends a drag. Returns true when a new session was started.
    pub fn on_pointer_up(&mut self) -> bool {
        if !self.selector.pointer_up() {
            return false;
        }
        match self.selector.rect() {
            Some(rect) => tracing::info!(
                "Selection set to {}x{} at ({}, {})",
                rect.width,
                rect.height,
                rect.left,
                rect.top
            ),
            None => tracing::info!("Selection cleared"),
        }
        self.reset();
        true
    }

    /// Replaces the selection outright and starts a new session.
    pub fn set_selection(&mut self, rect: SelectionRect) {
        self.selector = RegionSelector::with_selection(rect);
        self.reset();
    }

    /// The rectangle as drawn, even when too small to sample.
    pub fn selection_rect(&self) -> Option<SelectionRect> {
        self.selector.rect()
    }

    pub fn is_dragging(&self) -> bool {
        self.selector.is_dragging()
    }

    // ----- sampling -----

    /// Pulls the source's current frame into the frame buffer.
    pub fn refresh_frame(&mut self) -> Result<bool> {
        self.sampler.refresh(self.source.as_mut())
    }

    /// The last frame pulled from the source.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.sampler.frame()
    }

    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// Samples the selected region and queues it for recognition.
    pub fn on_tick(&mut self) -> Result<TickOutcome> {
        let outcome = self.sample()?;
        tracing::trace!("Tick: {:?}", outcome);
        Ok(outcome)
    }

    fn sample(&mut self) -> Result<TickOutcome> {
        let Some(rect) = self.selector.selection(self.settings.min_selection_px) else {
            return Ok(TickOutcome::NoSelection);
        };
        if self.selector.is_dragging() {
            return Ok(TickOutcome::Dragging);
        }
        if !self.sampler.refresh(self.source.as_mut())? {
            return Ok(TickOutcome::NoFrame);
        }
        if self.worker.is_busy() {
            return Ok(TickOutcome::Busy);
        }
        let Some(crop) = self.sampler.crop(rect) else {
            return Ok(TickOutcome::EmptyCrop);
        };

        let image = prepare_for_ocr(crop, &self.settings.preprocess);
        let tick = self.tick + 1;
        let job = OcrJob {
            tick,
            image,
            options: self.settings.recognize.clone(),
        };
        if !self.worker.submit(job)? {
            return Ok(TickOutcome::Busy);
        }
        self.tick = tick;
        Ok(TickOutcome::Submitted { tick })
    }

    // ----- results -----

    /// Applies every finished recognition. Returns how many readings were
    /// accepted.
    pub fn poll_results(&mut self) -> usize {
        let mut accepted = 0;
        while let Some(outcome) = self.worker.try_recv() {
            if self.apply(outcome) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Waits up to `timeout` for one recognition, then applies it and any
    /// others already finished.
    pub fn wait_for_results(&mut self, timeout: Duration) -> usize {
        let Some(first) = self.worker.recv_timeout(timeout) else {
            return 0;
        };
        let accepted = usize::from(self.apply(first));
        accepted + self.poll_results()
    }

    fn apply(&mut self, outcome: OcrOutcome) -> bool {
        if outcome.tick < self.session_start_tick {
            tracing::debug!("Discarding result of tick {} from a previous session", outcome.tick);
            return false;
        }
        // Failures were already logged by the worker
        let Ok(text) = outcome.text else {
            return false;
        };
        if text.trim().is_empty() {
            tracing::debug!("OCR returned no text for tick {}", outcome.tick);
            return false;
        }

        let reading = self.parser.parse(&text);
        let recorded = self.samples.record(&reading, outcome.completed_at);
        let exp = reading.exp;
        tracing::debug!("Tick {}: \"{}\" -> {:?}", outcome.tick, reading.normalized, exp);
        self.last_reading = Some(reading);

        let Some(recorded) = recorded else {
            return false;
        };
        if recorded.started {
            tracing::info!(
                "Session baseline: {} EXP{}",
                exp.unwrap_or_default(),
                self.samples
                    .percent()
                    .map(|p| format!(" at {}%", p))
                    .unwrap_or_default()
            );
            self.start_history(outcome.completed_at);
        }
        self.append_history();
        true
    }

    fn start_history(&mut self, started_at: DateTime<Local>) {
        let Some(dir) = &self.settings.history_dir else {
            return;
        };
        match SessionHistory::start(dir, started_at) {
            Ok(history) => self.history = Some(history),
            Err(e) => tracing::warn!("Session history disabled: {:#}", e),
        }
    }

    fn append_history(&mut self) {
        let (Some(history), Some(latest)) = (&self.history, self.samples.latest()) else {
            return;
        };
        let metrics = self.metrics();
        let row = HistoryRow {
            observed_at: latest.observed_at,
            exp: latest.value,
            percent: self.samples.percent(),
            exp_gained: metrics.exp_gained,
            exp_per_10min: metrics.rate_per_10min,
        };
        if let Err(e) = history.append(&row) {
            tracing::warn!("Failed to append session history: {:#}", e);
        }
    }

    /// Clears samples so the next accepted reading becomes the new baseline.
    /// Recognitions already in flight are discarded when they arrive.
    pub fn reset(&mut self) {
        self.samples.reset();
        self.history = None;
        self.last_reading = None;
        self.session_start_tick = self.tick + 1;
        tracing::info!("Session reset");
    }

    // ----- output -----

    pub fn samples(&self) -> &ExpSamples {
        &self.samples
    }

    pub fn last_reading(&self) -> Option<&ParsedReading> {
        self.last_reading.as_ref()
    }

    pub fn metrics(&self) -> DerivedMetrics {
        DerivedMetrics::compute(self.samples.first(), self.samples.latest(), self.samples.percent())
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::build(&self.samples, &self.metrics())
    }

    /// Sends the current snapshot to `sink` if it changed since the last delivery.
    pub fn publish(&mut self, sink: Option<&mut dyn TelemetrySink>) -> bool {
        let snapshot = self.snapshot();
        self.publisher.publish(&snapshot, sink)
    }

    /// Makes the next publish send even if nothing changed.
    pub fn republish(&mut self) {
        self.publisher.forget();
    }
}
