//! Frame source that follows the newest image in a directory.
//!
//! Screen recorders and game clients can be set to drop a snapshot into a
//! folder every second or so; this source always serves the most recent one.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::{copy_frame, FrameSource};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct FolderSource {
    dir: PathBuf,
    /// File the current frame was loaded from, with its modification time
    loaded: Option<(PathBuf, SystemTime)>,
    frame: Option<RgbaImage>,
}

impl FolderSource {
    pub fn new(dir: PathBuf) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow!("Frame folder does not exist: {}", dir.display()));
        }
        tracing::info!("Following newest image in {}", dir.display());
        Ok(Self {
            dir,
            loaded: None,
            frame: None,
        })
    }

    /// Loads the newest image if it differs from the one already loaded.
    fn poll(&mut self) {
        let Some(newest) = newest_image(&self.dir) else {
            return;
        };
        if self.loaded.as_ref() == Some(&newest) {
            return;
        }

        match image::open(&newest.0) {
            Ok(img) => {
                self.frame = Some(img.to_rgba8());
                self.loaded = Some(newest);
            }
            Err(e) => {
                // Usually a file that is still being written; retry next tick
                tracing::debug!("Could not load {}: {}", newest.0.display(), e);
            }
        }
    }
}

/// Finds the most recently modified image file in `dir`.
fn newest_image(dir: &Path) -> Option<(PathBuf, SystemTime)> {
    let entries = fs::read_dir(dir).ok()?;

    entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !is_image {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((path, modified))
        })
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)))
}

impl FrameSource for FolderSource {
    fn has_frame(&mut self) -> bool {
        self.poll();
        self.frame.is_some()
    }

    fn native_size(&self) -> Option<(u32, u32)> {
        self.frame.as_ref().map(|f| f.dimensions())
    }

    fn draw_into(&self, target: &mut RgbaImage) -> Result<()> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| anyhow!("No frame loaded"))?;
        copy_frame(frame, target)
    }

    fn describe(&self) -> String {
        format!("[Folder] {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::time::Duration;
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32, shade: u8) {
        RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]))
            .save(path)
            .unwrap();
    }

    fn set_mtime(path: &Path, secs_after_epoch: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs_after_epoch))
            .unwrap();
    }

    #[test]
    fn test_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        assert!(FolderSource::new(dir.path().join("nope")).is_err());
    }

    #[test]
    fn test_empty_dir_has_no_frame() {
        let dir = tempdir().unwrap();
        let mut source = FolderSource::new(dir.path().to_path_buf()).unwrap();
        assert!(!source.has_frame());
        assert_eq!(source.native_size(), None);
    }

    #[test]
    fn test_serves_newest_image() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("a.png");
        let new = dir.path().join("b.png");
        write_png(&old, 4, 4, 10);
        write_png(&new, 6, 3, 200);
        set_mtime(&old, 1_000);
        set_mtime(&new, 2_000);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = FolderSource::new(dir.path().to_path_buf()).unwrap();
        assert!(source.has_frame());
        assert_eq!(source.native_size(), Some((6, 3)));

        let mut target = RgbaImage::new(6, 3);
        source.draw_into(&mut target).unwrap();
        assert_eq!(target.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));

        // A newer file replaces the frame
        let newer = dir.path().join("c.png");
        write_png(&newer, 2, 2, 50);
        set_mtime(&newer, 3_000);
        assert!(source.has_frame());
        assert_eq!(source.native_size(), Some((2, 2)));
    }

    #[test]
    fn test_draw_into_wrong_size_is_error() {
        let dir = tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 4, 4, 10);

        let mut source = FolderSource::new(dir.path().to_path_buf()).unwrap();
        assert!(source.has_frame());
        let mut target = RgbaImage::new(3, 3);
        assert!(source.draw_into(&mut target).is_err());
    }
}
