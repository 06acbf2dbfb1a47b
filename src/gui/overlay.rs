//! Secondary overlay window.
//!
//! The main window talks to the overlay only through an `mpsc` channel of
//! telemetry messages. The overlay keeps the last snapshot it received and
//! draws it.

use std::sync::mpsc::{channel, Receiver, Sender};

use anyhow::{anyhow, Result};
use eframe::egui::{self, RichText, Vec2};

use crate::tracker::{Snapshot, TelemetryMessage, TelemetrySink};

pub const OVERLAY_TITLE: &str = "EXP Tracker Overlay";

/// Main-window end of the overlay channel.
pub struct OverlaySink {
    tx: Option<Sender<TelemetryMessage>>,
}

impl TelemetrySink for OverlaySink {
    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn send(&mut self, message: &TelemetryMessage) -> Result<()> {
        let tx = self.tx.as_ref().ok_or_else(|| anyhow!("Overlay is closed"))?;
        if tx.send(message.clone()).is_err() {
            self.tx = None;
            return Err(anyhow!("Overlay is closed"));
        }
        Ok(())
    }
}

/// Overlay end of the channel plus what it displays.
pub struct OverlayWindow {
    id: egui::ViewportId,
    inbox: Receiver<TelemetryMessage>,
    latest: Option<Snapshot>,
    close_requested: bool,
}

/// Creates a connected sink/window pair.
pub fn open_overlay() -> (OverlaySink, OverlayWindow) {
    let (tx, rx) = channel();
    (
        OverlaySink { tx: Some(tx) },
        OverlayWindow {
            id: egui::ViewportId::from_hash_of("exp_overlay"),
            inbox: rx,
            latest: None,
            close_requested: false,
        },
    )
}

impl OverlayWindow {
    pub fn id(&self) -> egui::ViewportId {
        self.id
    }

    /// Applies every pending message.
    fn drain_inbox(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                TelemetryMessage::ExpUpdate(snapshot) => self.latest = Some(snapshot),
            }
        }
    }

    /// Draws the overlay viewport. Returns false once the user closed it.
    pub fn show(&mut self, ctx: &egui::Context) -> bool {
        self.drain_inbox();

        let builder = egui::ViewportBuilder::default()
            .with_title(OVERLAY_TITLE)
            .with_inner_size(Vec2::new(320.0, 200.0))
            .with_always_on_top();

        ctx.show_viewport_immediate(self.id, builder, |ctx, class| {
            if matches!(class, egui::ViewportClass::Embedded) {
                // Backend without multi-viewport support
                egui::Window::new(OVERLAY_TITLE)
                    .show(ctx, |ui| render_snapshot(ui, self.latest.as_ref()));
            } else {
                egui::CentralPanel::default()
                    .show(ctx, |ui| render_snapshot(ui, self.latest.as_ref()));
            }

            if ctx.input(|i| i.viewport().close_requested()) {
                self.close_requested = true;
            }
        });

        !self.close_requested
    }
}

fn render_snapshot(ui: &mut egui::Ui, snapshot: Option<&Snapshot>) {
    let Some(s) = snapshot else {
        ui.label("Waiting for data...");
        return;
    };

    egui::Grid::new("overlay_stats")
        .num_columns(2)
        .spacing([16.0, 6.0])
        .show(ui, |ui| {
            ui.label("EXP");
            ui.label(RichText::new(format!("{} ({}%)", s.exp, s.exp_percent)).strong());
            ui.end_row();

            ui.label("Started from");
            ui.label(&s.started_from);
            ui.end_row();

            ui.label("Duration");
            ui.label(&s.duration);
            ui.end_row();

            ui.label("10min EXP");
            ui.label(RichText::new(&s.exp_10min).strong().size(18.0));
            ui.end_row();

            ui.label("Time to level");
            ui.label(&s.time_to_level);
            ui.end_row();
        });
}
