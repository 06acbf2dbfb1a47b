//! OCR worker thread.
//!
//! Recognition takes far longer than a sampling tick's synchronous part, so it
//! runs on its own thread. The queue holds at most one job and an in-flight
//! flag covers the job being processed: while a recognition is pending, new
//! submissions are refused and the caller skips that tick.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, sync_channel, Receiver, Sender, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::engine::{OcrEngine, RecognizeOptions};

/// A prepared image waiting for recognition.
#[derive(Debug, Clone)]
pub struct OcrJob {
    /// Tick number that produced the image
    pub tick: u64,
    pub image: RgbaImage,
    pub options: RecognizeOptions,
}

/// Result of one recognition.
#[derive(Debug)]
pub struct OcrOutcome {
    pub tick: u64,
    /// When recognition finished; readings are timestamped with this
    pub completed_at: DateTime<Local>,
    pub text: Result<String>,
}

/// Handle to the worker thread.
pub struct OcrWorker {
    jobs: Option<SyncSender<OcrJob>>,
    outcomes: Receiver<OcrOutcome>,
    in_flight: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl OcrWorker {
    /// Spawns the worker thread around `engine`.
    pub fn spawn(engine: Box<dyn OcrEngine>) -> Result<Self> {
        let (job_tx, job_rx) = sync_channel::<OcrJob>(1);
        let (outcome_tx, outcome_rx) = channel::<OcrOutcome>();
        let in_flight = Arc::new(AtomicBool::new(false));

        let flag = in_flight.clone();
        let handle = thread::Builder::new()
            .name("ocr-worker".to_string())
            .spawn(move || run_ocr_worker(engine, job_rx, outcome_tx, flag))?;

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            in_flight,
            handle: Some(handle),
        })
    }

    /// True while a submitted job has not produced an outcome yet.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Queues a job. Returns `Ok(false)` without queueing when a recognition
    /// is already pending.
    pub fn submit(&self, job: OcrJob) -> Result<bool> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("OCR worker is shut down"))?;

        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        match jobs.try_send(job) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                // The flag was clear but the slot is still occupied; treat as busy.
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.in_flight.store(false, Ordering::SeqCst);
                Err(anyhow!("OCR worker thread has exited"))
            }
        }
    }

    /// Returns a finished outcome without blocking.
    pub fn try_recv(&self) -> Option<OcrOutcome> {
        self.outcomes.try_recv().ok()
    }

    /// Waits up to `timeout` for a finished outcome.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<OcrOutcome> {
        self.outcomes.recv_timeout(timeout).ok()
    }
}

impl Drop for OcrWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("OCR worker thread panicked");
            }
        }
    }
}

/// Runs the OCR worker loop.
///
/// Processes jobs until the job channel is closed (sender dropped). Engine
/// failures are reported as failed outcomes; the loop keeps going.
fn run_ocr_worker(
    engine: Box<dyn OcrEngine>,
    jobs: Receiver<OcrJob>,
    outcomes: Sender<OcrOutcome>,
    in_flight: Arc<AtomicBool>,
) {
    tracing::debug!("OCR worker started");

    while let Ok(job) = jobs.recv() {
        tracing::trace!(
            "OCR worker: recognizing tick {} ({}x{})",
            job.tick,
            job.image.width(),
            job.image.height()
        );

        let text = engine.recognize(&job.image, &job.options);
        if let Err(e) = &text {
            tracing::warn!("OCR failed for tick {}: {:#}", job.tick, e);
        }

        let outcome = OcrOutcome {
            tick: job.tick,
            completed_at: Local::now(),
            text,
        };

        in_flight.store(false, Ordering::SeqCst);
        if outcomes.send(outcome).is_err() {
            // Session dropped its receiver
            break;
        }
    }

    tracing::debug!("OCR worker finished");
}
