//! Frame sampler.
//!
//! Owns two buffers that live across ticks: the full frame at the source's
//! native resolution, and the crop of the selected region. Both are resized
//! only when the source resolution or the selection size changes.

use anyhow::Result;
use image::RgbaImage;

use super::FrameSource;
use crate::selection::SelectionRect;

/// A crop rectangle already clamped to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Clamps a selection against a frame of `native` size.
///
/// The origin is clamped to zero, then width and height are limited to what
/// remains of the frame past the origin. Returns `None` when nothing is left.
pub fn clamp_crop(rect: SelectionRect, native: (u32, u32)) -> Option<CropRect> {
    let sx = rect.left.max(0) as i64;
    let sy = rect.top.max(0) as i64;
    let sw = (native.0 as i64 - sx).min(rect.width as i64);
    let sh = (native.1 as i64 - sy).min(rect.height as i64);

    if sw <= 0 || sh <= 0 {
        return None;
    }

    Some(CropRect {
        x: sx as u32,
        y: sy as u32,
        width: sw as u32,
        height: sh as u32,
    })
}

/// Reusable frame and crop buffers.
pub struct FrameSampler {
    frame: RgbaImage,
    crop: RgbaImage,
}

impl Default for FrameSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSampler {
    pub fn new() -> Self {
        Self {
            frame: RgbaImage::new(0, 0),
            crop: RgbaImage::new(0, 0),
        }
    }

    /// Draws the source's current frame into the frame buffer.
    ///
    /// Returns `Ok(false)` when the source has nothing buffered yet.
    pub fn refresh(&mut self, source: &mut dyn FrameSource) -> Result<bool> {
        if !source.has_frame() {
            return Ok(false);
        }
        let Some((width, height)) = source.native_size() else {
            return Ok(false);
        };
        if width == 0 || height == 0 {
            return Ok(false);
        }

        if self.frame.dimensions() != (width, height) {
            tracing::info!(
                "Source resolution is now {}x{} (was {}x{})",
                width,
                height,
                self.frame.width(),
                self.frame.height()
            );
            self.frame = RgbaImage::new(width, height);
        }

        source.draw_into(&mut self.frame)?;
        Ok(true)
    }

    /// The last frame drawn, if any.
    pub fn frame(&self) -> Option<&RgbaImage> {
        if self.frame.width() == 0 || self.frame.height() == 0 {
            None
        } else {
            Some(&self.frame)
        }
    }

    /// Copies the selected region of the current frame into the crop buffer.
    ///
    /// Returns `None` when the clamped region is empty or no frame is loaded.
    pub fn crop(&mut self, rect: SelectionRect) -> Option<&mut RgbaImage> {
        let region = clamp_crop(rect, self.frame.dimensions())?;

        if self.crop.dimensions() != (region.width, region.height) {
            self.crop = RgbaImage::new(region.width, region.height);
        }

        let frame_stride = self.frame.width() as usize * 4;
        let row_len = region.width as usize * 4;
        let src: &[u8] = self.frame.as_raw();
        let dst: &mut [u8] = &mut self.crop;

        for row in 0..region.height as usize {
            let src_start = (region.y as usize + row) * frame_stride + region.x as usize * 4;
            let dst_start = row * row_len;
            dst[dst_start..dst_start + row_len]
                .copy_from_slice(&src[src_start..src_start + row_len]);
        }

        Some(&mut self.crop)
    }
}
