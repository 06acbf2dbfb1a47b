use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::TesseractPaths;

/// Page layout the engine should assume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutHint {
    /// The image holds one line of text.
    #[default]
    SingleLine,
    /// A single uniform block of text.
    SingleBlock,
}

impl LayoutHint {
    /// Tesseract page segmentation mode for this layout.
    pub fn psm(self) -> u8 {
        match self {
            Self::SingleLine => 7,
            Self::SingleBlock => 6,
        }
    }
}

/// Per-call recognition options.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognizeOptions {
    /// Characters the engine may emit. Empty means unrestricted.
    pub whitelist: String,
    pub layout: LayoutHint,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            whitelist: "0123456789.".to_string(),
            layout: LayoutHint::SingleLine,
        }
    }
}

/// An OCR backend: image in, text out.
pub trait OcrEngine: Send {
    fn recognize(&self, img: &RgbaImage, options: &RecognizeOptions) -> Result<String>;
}

/// Runs the Tesseract executable on each image.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata: PathBuf,
}

impl TesseractEngine {
    pub fn new(paths: TesseractPaths) -> Self {
        Self {
            executable: paths.executable,
            tessdata: paths.tessdata,
        }
    }

    /// Builds the argument list for one recognition call.
    fn args(&self, input: &str, options: &RecognizeOptions) -> Vec<String> {
        let mut args = vec![
            input.to_string(),
            "stdout".to_string(),
            "--tessdata-dir".to_string(),
            self.tessdata.to_string_lossy().to_string(),
            "-l".to_string(),
            "eng".to_string(),
            "--psm".to_string(),
            options.layout.psm().to_string(),
        ];
        if !options.whitelist.is_empty() {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", options.whitelist));
        }
        args
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, img: &RgbaImage, options: &RecognizeOptions) -> Result<String> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let input = temp_input.path().to_string_lossy().to_string();
        let output = Command::new(&self.executable)
            .args(self.args(&input, options))
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
