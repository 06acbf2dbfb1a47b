//! GUI module for the application.
//!
//! The main window shows the live preview, lets the user drag the EXP region,
//! and displays session statistics. The overlay is a second viewport fed over
//! a channel.

pub mod overlay;
pub mod render;
pub mod state;

use std::time::{Duration, Instant};

use eframe::egui::{self, TextureHandle, Vec2};

use crate::tracker::{CaptureSession, TelemetrySink};

use overlay::{OverlaySink, OverlayWindow};
use render::PreviewPointer;
use state::{GuiState, TrackerStatus};

pub const WINDOW_TITLE: &str = "EXP Tracker";

/// How often the preview texture follows the source.
const PREVIEW_INTERVAL: Duration = Duration::from_millis(100);

/// Main GUI application struct.
pub struct GuiApp {
    /// `None` when the capture session failed to start.
    session: Option<CaptureSession>,
    startup_error: Option<String>,
    state: GuiState,
    preview: Option<TextureHandle>,
    overlay: Option<(OverlaySink, OverlayWindow)>,
}

impl GuiApp {
    pub fn new(session: anyhow::Result<CaptureSession>, sample_interval: Duration) -> Self {
        let (session, startup_error) = match session {
            Ok(session) => (Some(session), None),
            Err(e) => {
                tracing::error!("GUI: Capture session unavailable: {:#}", e);
                (None, Some(format!("{:#}", e)))
            }
        };

        Self {
            session,
            startup_error,
            state: GuiState::new(sample_interval),
            preview: None,
            overlay: None,
        }
    }

    /// Pulls a fresh frame into the preview texture when one is due.
    fn refresh_preview(&mut self, ctx: &egui::Context, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Some(last) = self.state.last_preview {
            if now.duration_since(last) < PREVIEW_INTERVAL {
                return;
            }
        }
        self.state.last_preview = Some(now);

        if let Err(e) = session.refresh_frame() {
            tracing::debug!("GUI: Preview refresh failed: {:#}", e);
            return;
        }
        let Some(frame) = session.frame() else {
            return;
        };

        let size = [frame.width() as usize, frame.height() as usize];
        let image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match &mut self.preview {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.preview = Some(ctx.load_texture("preview", image, egui::TextureOptions::LINEAR))
            }
        }
    }

    /// Runs a sampling tick when due and applies finished recognitions.
    fn drive_session(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        session.poll_results();

        if self.state.tick_due(now) {
            match session.on_tick() {
                Ok(outcome) => self.state.last_outcome = Some(outcome),
                Err(e) => tracing::warn!("GUI: Sampling tick failed: {:#}", e),
            }
        }

        let sink = self
            .overlay
            .as_mut()
            .map(|(sink, _)| sink as &mut dyn TelemetrySink);
        session.publish(sink);
    }

    fn handle_pointer(&mut self, pointer: PreviewPointer) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match pointer {
            PreviewPointer::Down(p) => session.on_pointer_down(p),
            PreviewPointer::Move(p) => session.on_pointer_move(p),
            PreviewPointer::Up => {
                session.on_pointer_up();
            }
        }
    }

    /// Handle reset button click.
    fn handle_reset(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.reset();
            tracing::info!("GUI: Session reset by user");
        }
    }

    /// Handle open overlay button click: focus it when already open.
    fn handle_open_overlay(&mut self, ctx: &egui::Context) {
        if let Some((_, window)) = &self.overlay {
            ctx.send_viewport_cmd_to(window.id(), egui::ViewportCommand::Focus);
            return;
        }
        self.overlay = Some(overlay::open_overlay());
        if let Some(session) = self.session.as_mut() {
            session.republish();
        }
        tracing::info!("GUI: Overlay opened");
    }

    fn show_overlay(&mut self, ctx: &egui::Context) {
        let Some((_, window)) = self.overlay.as_mut() else {
            return;
        };
        if !window.show(ctx) {
            self.overlay = None;
            tracing::info!("GUI: Overlay closed");
        }
    }

    fn status(&self) -> TrackerStatus {
        match (&self.session, &self.startup_error) {
            (Some(session), _) => TrackerStatus::from_session(session, self.state.last_outcome),
            (None, Some(e)) => TrackerStatus::Error(e.clone()),
            (None, None) => TrackerStatus::Error("No capture session".to_string()),
        }
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.refresh_preview(ctx, now);
        self.drive_session(now);

        let mut pointer = None;
        let mut reset_clicked = false;
        let mut overlay_clicked = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading(WINDOW_TITLE);
            ui.add_space(8.0);

            egui::ScrollArea::vertical().show(ui, |ui| {
                let status = self.status();
                let source = self
                    .session
                    .as_ref()
                    .map(|s| s.source_description())
                    .unwrap_or_default();
                render::render_status(ui, &status, &source);
                ui.add_space(8.0);

                let native = self
                    .session
                    .as_ref()
                    .and_then(|s| s.frame())
                    .map(|f| f.dimensions());
                let selection = self.session.as_ref().and_then(|s| s.selection_rect());
                pointer = render::render_preview(ui, self.preview.as_ref(), native, selection);

                let snapshot = self
                    .session
                    .as_ref()
                    .map(|s| s.snapshot())
                    .unwrap_or_default();
                let recognized = self
                    .session
                    .as_ref()
                    .and_then(|s| s.last_reading())
                    .map(|r| r.normalized.as_str());
                render::render_stats(ui, &snapshot, recognized);

                (reset_clicked, overlay_clicked) = render::render_controls(ui);
                render::render_instructions(ui);
            });
        });

        if let Some(pointer) = pointer {
            self.handle_pointer(pointer);
        }
        if reset_clicked {
            self.handle_reset();
        }
        if overlay_clicked {
            self.handle_open_overlay(ctx);
        }

        self.show_overlay(ctx);

        let wait = self.state.until_next_tick(Instant::now()).min(PREVIEW_INTERVAL);
        ctx.request_repaint_after(wait);
    }
}

/// Run the GUI application.
/// This function blocks until the window is closed.
pub fn run_gui(session: anyhow::Result<CaptureSession>, sample_interval: Duration) -> eframe::Result<()> {
    tracing::info!("GUI: Creating native options...");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(720.0, 720.0))
            .with_min_inner_size(Vec2::new(420.0, 400.0))
            .with_title(WINDOW_TITLE)
            // Disable drag-and-drop to avoid COM conflict with RoInitialize (multithreaded)
            .with_drag_and_drop(false),
        ..Default::default()
    };

    eframe::run_native(
        WINDOW_TITLE,
        options,
        Box::new(move |_cc| {
            tracing::info!("GUI: Creating GuiApp instance...");
            Ok(Box::new(GuiApp::new(session, sample_interval)))
        }),
    )
}
