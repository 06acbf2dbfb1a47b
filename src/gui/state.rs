//! GUI application state management.
//!
//! Tracks the sampling timer and what to show in the status line.

use std::time::{Duration, Instant};

use eframe::egui::Color32;

use crate::tracker::{CaptureSession, TickOutcome};

/// Tracker status for display in the GUI.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerStatus {
    /// The capture session could not be started
    Error(String),
    /// No rectangle drawn, or one too small to read
    NoSelection,
    /// The user is drawing a rectangle
    Selecting,
    /// The source has not delivered a frame yet
    WaitingForFrame,
    /// The rectangle lies outside the frame
    OutsideFrame,
    /// Sampling, but nothing has been read yet
    Reading,
    /// A baseline exists and readings are coming in
    Tracking,
}

impl TrackerStatus {
    /// Derives the status from the session and the last tick.
    pub fn from_session(session: &CaptureSession, last_outcome: Option<TickOutcome>) -> Self {
        if session.is_dragging() {
            return Self::Selecting;
        }
        match last_outcome {
            Some(TickOutcome::NoSelection) | None if session.samples().first().is_none() => {
                Self::NoSelection
            }
            Some(TickOutcome::NoFrame) => Self::WaitingForFrame,
            Some(TickOutcome::EmptyCrop) => Self::OutsideFrame,
            _ if session.samples().first().is_some() => Self::Tracking,
            _ => Self::Reading,
        }
    }

    /// Get display text for current status.
    pub fn status_text(&self) -> String {
        match self {
            Self::Error(msg) => format!("Error: {}", msg),
            Self::NoSelection => "Drag over the EXP bar in the preview".to_string(),
            Self::Selecting => "Selecting...".to_string(),
            Self::WaitingForFrame => "Waiting for the first frame".to_string(),
            Self::OutsideFrame => "Selection is outside the frame".to_string(),
            Self::Reading => "Reading EXP...".to_string(),
            Self::Tracking => "Tracking".to_string(),
        }
    }

    pub fn color(&self) -> Color32 {
        match self {
            Self::Error(_) | Self::OutsideFrame => Color32::from_rgb(200, 0, 0),
            Self::NoSelection | Self::WaitingForFrame => Color32::GRAY,
            Self::Selecting | Self::Reading => Color32::from_rgb(0, 120, 200),
            Self::Tracking => Color32::from_rgb(0, 150, 0),
        }
    }
}

/// GUI application state.
#[derive(Debug)]
pub struct GuiState {
    pub sample_interval: Duration,
    /// When the next sampling tick is due.
    pub next_tick: Instant,
    /// Outcome of the most recent tick.
    pub last_outcome: Option<TickOutcome>,
    /// When the preview texture was last refreshed.
    pub last_preview: Option<Instant>,
}

impl GuiState {
    pub fn new(sample_interval: Duration) -> Self {
        Self {
            sample_interval,
            next_tick: Instant::now(),
            last_outcome: None,
            last_preview: None,
        }
    }

    /// True when a tick is due at `now`; schedules the next one.
    pub fn tick_due(&mut self, now: Instant) -> bool {
        if now < self.next_tick {
            return false;
        }
        self.next_tick += self.sample_interval;
        // Fell behind (window hidden, long frame): don't fire a burst of ticks
        if self.next_tick < now {
            self.next_tick = now + self.sample_interval;
        }
        true
    }

    /// Time until the next tick, for scheduling a repaint.
    pub fn until_next_tick(&self, now: Instant) -> Duration {
        self.next_tick.saturating_duration_since(now)
    }
}
