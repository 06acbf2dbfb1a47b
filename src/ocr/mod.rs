pub mod engine;
pub mod parse;
pub mod preprocess;
pub mod setup;
pub mod worker;

pub use engine::{OcrEngine, RecognizeOptions, TesseractEngine};
pub use parse::{ParsedReading, TextParser};
pub use preprocess::{threshold_luminance, upscale_nearest};
pub use setup::ensure_tesseract;
pub use worker::{OcrJob, OcrOutcome, OcrWorker};

use image::RgbaImage;

/// Preprocessing parameters applied to every crop before recognition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PreprocessOptions {
    pub threshold: u8,
    pub upscale: f32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            threshold: 180,
            upscale: 3.0,
        }
    }
}

/// Crop → OCR-ready image: threshold the crop in place, then return an
/// upscaled copy.
pub fn prepare_for_ocr(crop: &mut RgbaImage, options: &PreprocessOptions) -> RgbaImage {
    threshold_luminance(crop, options.threshold);
    upscale_nearest(crop, options.upscale)
}
