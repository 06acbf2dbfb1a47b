use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Converts the image to black and white in place by luminance.
///
/// Luminance is `0.299 R + 0.587 G + 0.114 B`. Pixels above `threshold` become
/// white, all others black; alpha is left untouched. HUD text is bright on a
/// darker, often gradient background, so this keeps the glyphs and drops the
/// rest.
///
/// The comparison is done on the luminance scaled by 1000 so the result is
/// exact, which keeps the transform idempotent.
pub fn threshold_luminance(img: &mut RgbaImage, threshold: u8) {
    let limit = threshold as u32 * 1000;

    for pixel in img.pixels_mut() {
        let Rgba([r, g, b, a]) = *pixel;
        let luma = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
        let value = if luma > limit { 255u8 } else { 0u8 };
        *pixel = Rgba([value, value, value, a]);
    }
}

/// Returns the output dimensions for upscaling by `scale`, never below 1x1.
pub fn upscaled_dimensions(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let w = (width as f32 * scale).round().max(1.0) as u32;
    let h = (height as f32 * scale).round().max(1.0) as u32;
    (w, h)
}

/// Upscales with nearest-neighbor sampling so character edges stay hard.
///
/// Recommended factors: 3 for typical HUD text, up to 5 for very small fonts.
pub fn upscale_nearest(img: &RgbaImage, scale: f32) -> RgbaImage {
    let (w, h) = upscaled_dimensions(img.width(), img.height(), scale);
    imageops::resize(img, w, h, FilterType::Nearest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_luminance() {
        let mut img = RgbaImage::new(4, 1);
        // Dark grey -> black
        img.put_pixel(0, 0, Rgba([100, 100, 100, 255]));
        // Bright white -> white
        img.put_pixel(1, 0, Rgba([250, 250, 250, 255]));
        // Bright red has low luminance (0.299 * 250 = 74.75) -> black
        img.put_pixel(2, 0, Rgba([250, 0, 0, 255]));
        // Alpha is preserved
        img.put_pixel(3, 0, Rgba([255, 255, 200, 40]));

        threshold_luminance(&mut img, 180);

        assert_eq!(img.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(1, 0), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(2, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(3, 0), &Rgba([255, 255, 255, 40]));
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        let mut img = RgbaImage::from_pixel(1, 1, Rgba([180, 180, 180, 255]));
        threshold_luminance(&mut img, 180);
        assert_eq!(img.get_pixel(0, 0)[0], 0, "equal to threshold stays black");
    }

    #[test]
    fn test_threshold_is_idempotent() {
        let original = RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8, 255])
        });

        for threshold in [0u8, 100, 180, 254, 255] {
            let mut once = original.clone();
            threshold_luminance(&mut once, threshold);
            let mut twice = once.clone();
            threshold_luminance(&mut twice, threshold);
            assert_eq!(once, twice, "threshold {}", threshold);
        }
    }

    #[test]
    fn test_upscale_dimensions_and_aspect() {
        let img = RgbaImage::new(40, 10);
        let up = upscale_nearest(&img, 3.0);
        assert_eq!(up.dimensions(), (120, 30));
        assert_eq!(up.width() * 10, up.height() * 40);
    }

    #[test]
    fn test_upscale_never_empty() {
        assert_eq!(upscaled_dimensions(1, 1, 0.1), (1, 1));
        assert_eq!(upscaled_dimensions(3, 7, 2.5), (8, 18));
    }

    #[test]
    fn test_upscale_keeps_hard_edges() {
        let mut img = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        img.put_pixel(1, 0, Rgba([255, 255, 255, 255]));

        let up = upscale_nearest(&img, 4.0);
        assert_eq!(up.dimensions(), (8, 4));
        for (_, _, p) in up.enumerate_pixels() {
            assert!(p[0] == 0 || p[0] == 255, "no interpolated values");
        }
        assert_eq!(up.get_pixel(0, 0)[0], 0);
        assert_eq!(up.get_pixel(7, 3)[0], 255);
    }
}
