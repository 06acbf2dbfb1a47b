//! Coordinate conversion utilities.
//!
//! Converts pointer positions in display space (where the preview is drawn)
//! to pixel positions in the source frame's native resolution.

/// A point in video-pixel space. Fractional; may lie outside the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VideoPoint {
    pub x: f32,
    pub y: f32,
}

/// The on-screen rectangle the frame is drawn into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    /// Horizontal and vertical native-to-display ratios.
    ///
    /// The two factors differ whenever the preview is stretched to an aspect
    /// ratio other than the frame's. A degenerate display axis yields 0.
    pub fn scale_to(&self, native: (u32, u32)) -> (f32, f32) {
        let sx = if self.width > 0.0 {
            native.0 as f32 / self.width
        } else {
            0.0
        };
        let sy = if self.height > 0.0 {
            native.1 as f32 / self.height
        } else {
            0.0
        };
        (sx, sy)
    }

    /// Maps a display-space position to video-pixel space.
    pub fn to_video(&self, x: f32, y: f32, native: (u32, u32)) -> VideoPoint {
        let (sx, sy) = self.scale_to(native);
        VideoPoint {
            x: (x - self.left) * sx,
            y: (y - self.top) * sy,
        }
    }

    /// Maps a video-pixel position back to display space, for drawing the
    /// selection outline over the preview.
    pub fn to_display(&self, point: VideoPoint, native: (u32, u32)) -> (f32, f32) {
        let (sx, sy) = self.scale_to(native);
        let x = if sx > 0.0 { point.x / sx } else { 0.0 };
        let y = if sy > 0.0 { point.y / sy } else { 0.0 };
        (self.left + x, self.top + y)
    }
}
