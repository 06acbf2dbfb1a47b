//! EXP Tracker
//!
//! Reads a game's EXP bar from a live window capture (or a folder of
//! snapshots) with OCR and reports EXP gained, the 10-minute rate, and the
//! estimated time to the next level.

mod capture;
mod config;
mod gui;
mod headless;
mod ocr;
mod paths;
mod selection;
mod tracker;

use anyhow::{anyhow, Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use std::time::Duration;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use config::TrackerConfig;
use tracker::{CaptureSession, SessionSettings};

/// Sets up logging to the console and to `<exe_dir>/logs/exp_tracker.log`.
///
/// The console layer writes to stderr; stdout carries headless telemetry.
fn init_logging() -> Result<()> {
    let log_path = paths::get_logs_dir().join("exp_tracker.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("exp_tracker=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_thread_names(true),
        )
        .init();
    Ok(())
}

/// Locates Tesseract, opens the frame source and starts the OCR worker.
fn build_session(config: &TrackerConfig) -> Result<CaptureSession> {
    let tesseract = ocr::ensure_tesseract().context("Tesseract is not available")?;
    let engine = ocr::TesseractEngine::new(tesseract);
    let source = capture::open_source(&config.source).context("Failed to open frame source")?;
    CaptureSession::new(source, Box::new(engine), SessionSettings::from_config(config))
}

fn main() -> Result<()> {
    paths::ensure_directories().context("Failed to create output directories")?;
    init_logging()?;

    // Log panics before the process goes down
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = panic_info
            .location()
            .map(|loc| format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_default();
        tracing::error!("[PANIC]{} {}", location, msg);
    }));

    #[cfg(windows)]
    unsafe {
        windows::Win32::System::WinRT::RoInitialize(
            windows::Win32::System::WinRT::RO_INIT_MULTITHREADED,
        )?
    };

    let config = config::init_config();
    let session = build_session(config);

    if config.headless {
        tracing::info!("Starting headless mode...");
        return headless::run_headless(config, session?);
    }

    tracing::info!("Starting GUI application...");
    let interval = Duration::from_millis(config.sample_interval_ms.max(1));
    match gui::run_gui(session, interval) {
        Ok(()) => {
            tracing::info!("GUI application exited normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("GUI error: {}", e);
            Err(anyhow!("GUI error: {}", e))
        }
    }
}
