//! GUI rendering functions.
//!
//! Contains UI layout and component rendering logic.

use eframe::egui::{self, Color32, RichText, Stroke, TextureHandle, Vec2};

use super::state::TrackerStatus;
use crate::selection::{DisplayRect, SelectionRect, VideoPoint};
use crate::tracker::Snapshot;

/// Tallest the preview is allowed to grow.
const MAX_PREVIEW_HEIGHT: f32 = 360.0;

/// Pointer gesture on the preview, already in video pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PreviewPointer {
    Down(VideoPoint),
    Move(VideoPoint),
    Up,
}

/// Size of the preview for a frame of `native` size in `available` space,
/// keeping the frame's aspect ratio.
pub fn fit_preview(available: Vec2, native: (u32, u32), max_height: f32) -> Vec2 {
    if native.0 == 0 || native.1 == 0 || available.x <= 0.0 {
        return Vec2::ZERO;
    }
    let aspect = native.1 as f32 / native.0 as f32;
    let width = available.x;
    let height = width * aspect;
    if height > max_height {
        Vec2::new(max_height / aspect, max_height)
    } else {
        Vec2::new(width, height)
    }
}

/// Render the live preview with the selection outline.
/// Returns the drag gesture performed on it this frame, if any.
pub fn render_preview(
    ui: &mut egui::Ui,
    texture: Option<&TextureHandle>,
    native: Option<(u32, u32)>,
    selection: Option<SelectionRect>,
) -> Option<PreviewPointer> {
    let (Some(texture), Some(native)) = (texture, native) else {
        let (rect, _response) =
            ui.allocate_exact_size(Vec2::new(ui.available_width(), 200.0), egui::Sense::hover());
        ui.painter().rect_filled(rect, 4.0, Color32::from_gray(40));
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "No frame yet",
            egui::FontId::proportional(16.0),
            Color32::from_gray(160),
        );
        return None;
    };

    let size = fit_preview(ui.available_size(), native, MAX_PREVIEW_HEIGHT);
    let (rect, response) = ui.allocate_exact_size(size, egui::Sense::drag());
    let display = DisplayRect {
        left: rect.min.x,
        top: rect.min.y,
        width: rect.width(),
        height: rect.height(),
    };

    let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
    ui.painter().image(texture.id(), rect, uv, Color32::WHITE);

    if let Some(sel) = selection {
        let min = display.to_display(
            VideoPoint { x: sel.left as f32, y: sel.top as f32 },
            native,
        );
        let max = display.to_display(
            VideoPoint {
                x: sel.left as f32 + sel.width as f32,
                y: sel.top as f32 + sel.height as f32,
            },
            native,
        );
        let outline = egui::Rect::from_min_max(egui::pos2(min.0, min.1), egui::pos2(max.0, max.1));
        ui.painter_at(rect)
            .rect_stroke(outline, 0.0, Stroke::new(2.0, Color32::from_rgb(255, 60, 60)));
    }

    let to_video = |pos: egui::Pos2| display.to_video(pos.x, pos.y, native);

    if response.drag_started() {
        return response.interact_pointer_pos().map(|p| PreviewPointer::Down(to_video(p)));
    }
    if response.drag_stopped() {
        return Some(PreviewPointer::Up);
    }
    if response.dragged() {
        return response.interact_pointer_pos().map(|p| PreviewPointer::Move(to_video(p)));
    }
    None
}

/// Render the status line.
pub fn render_status(ui: &mut egui::Ui, status: &TrackerStatus, source: &str) {
    ui.horizontal(|ui| {
        ui.label("Status:");
        ui.label(RichText::new(status.status_text()).color(status.color()));
    });
    ui.label(RichText::new(source).small().weak());
}

/// Render the session statistics.
pub fn render_stats(ui: &mut egui::Ui, snapshot: &Snapshot, recognized: Option<&str>) {
    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    egui::Grid::new("session_stats")
        .num_columns(2)
        .spacing([24.0, 6.0])
        .show(ui, |ui| {
            ui.label("Current Exp:");
            ui.label(RichText::new(format!("{} ({}%)", snapshot.exp, snapshot.exp_percent)).strong());
            ui.end_row();

            ui.label("Started from:");
            ui.label(&snapshot.started_from);
            ui.end_row();

            ui.label("Duration:");
            ui.label(&snapshot.duration);
            ui.end_row();

            ui.label("10min EXP:");
            ui.label(RichText::new(&snapshot.exp_10min).strong());
            ui.end_row();

            ui.label("Time to level:");
            ui.label(&snapshot.time_to_level);
            ui.end_row();

            ui.label("Last read:");
            ui.label(RichText::new(recognized.unwrap_or("-")).monospace());
            ui.end_row();
        });
}

/// Render the Reset and Open Overlay buttons.
/// Returns (reset_clicked, overlay_clicked).
pub fn render_controls(ui: &mut egui::Ui) -> (bool, bool) {
    let mut reset_clicked = false;
    let mut overlay_clicked = false;

    ui.add_space(8.0);
    ui.separator();
    ui.add_space(8.0);

    ui.horizontal(|ui| {
        if ui.button(RichText::new("Reset").size(16.0)).clicked() {
            reset_clicked = true;
        }

        ui.add_space(20.0);

        if ui.button(RichText::new("Open Overlay").size(16.0)).clicked() {
            overlay_clicked = true;
        }
    });

    (reset_clicked, overlay_clicked)
}

/// Render the usage notes.
pub fn render_instructions(ui: &mut egui::Ui) {
    ui.add_space(8.0);
    ui.collapsing("How to use", |ui| {
        ui.label("1. Start the game so its window (or snapshot folder) is visible in the preview.");
        ui.label("2. Drag over the EXP area, including the EXP number and percentage.");
        ui.label("3. Check the last read value. If it is wrong, drag again.");
        ui.label("4. Open Overlay shows the numbers in a small always-on-top window.");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_preview_uses_width() {
        let size = fit_preview(Vec2::new(640.0, 1000.0), (1920, 1080), 360.0);
        assert_eq!(size, Vec2::new(640.0, 360.0));
    }

    #[test]
    fn test_fit_preview_caps_height() {
        let size = fit_preview(Vec2::new(800.0, 1000.0), (1000, 1000), 360.0);
        assert_eq!(size, Vec2::new(360.0, 360.0));
    }

    #[test]
    fn test_fit_preview_degenerate() {
        assert_eq!(fit_preview(Vec2::new(800.0, 600.0), (0, 1080), 360.0), Vec2::ZERO);
        assert_eq!(fit_preview(Vec2::new(0.0, 600.0), (1920, 1080), 360.0), Vec2::ZERO);
    }
}
