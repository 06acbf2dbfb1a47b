//! Frame sources and the per-tick frame sampler.
//!
//! This module provides:
//! - The `FrameSource` trait consumed by the sampler
//! - A folder source that follows the newest image in a directory
//! - A live window source using the Windows Graphics Capture API (Windows only)
//! - The sampler that copies the selected region out of each frame

pub mod folder;
pub mod sampler;
#[cfg(windows)]
pub mod wgc;
#[cfg(windows)]
pub mod window;

use anyhow::Result;
use image::RgbaImage;

use crate::config::SourceConfig;

pub use folder::FolderSource;
pub use sampler::FrameSampler;

/// A live source of video frames.
pub trait FrameSource {
    /// Polls for new data. True when a frame is available to draw.
    fn has_frame(&mut self) -> bool;

    /// Native resolution of the current frame, `None` before the first one.
    fn native_size(&self) -> Option<(u32, u32)>;

    /// Copies the current frame into `target`, which is already sized to
    /// `native_size()`.
    fn draw_into(&self, target: &mut RgbaImage) -> Result<()>;

    /// Human-readable name for logs and the status line.
    fn describe(&self) -> String;
}

/// Opens the source described by the config.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    match config {
        SourceConfig::Folder { path } => {
            let dir = if path.is_absolute() {
                path.clone()
            } else {
                crate::paths::get_exe_dir().join(path)
            };
            Ok(Box::new(FolderSource::new(dir)?))
        }
        #[cfg(windows)]
        SourceConfig::Window { title } => Ok(Box::new(wgc::WindowCaptureSource::open(title)?)),
        #[cfg(not(windows))]
        SourceConfig::Window { title } => Err(anyhow::anyhow!(
            "Window capture of \"{}\" is only supported on Windows; use a folder source",
            title
        )),
    }
}

/// Copies `frame` into `target` when the sizes agree.
pub(crate) fn copy_frame(frame: &RgbaImage, target: &mut RgbaImage) -> Result<()> {
    if frame.dimensions() != target.dimensions() {
        return Err(anyhow::anyhow!(
            "Frame is {:?} but target buffer is {:?}",
            frame.dimensions(),
            target.dimensions()
        ));
    }
    target.copy_from_slice(frame.as_raw());
    Ok(())
}
