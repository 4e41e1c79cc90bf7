use super::types::Hsv;
use image::{ImageBuffer, Rgb, RgbImage};

/// Frame whose three channels hold (hue, saturation, value)
///
/// Hue is in [0, 179] (half-degrees), saturation and value in [0, 255].
#[derive(Debug, Clone)]
pub struct HsvFrame {
    pixels: ImageBuffer<Rgb<u8>, Vec<u8>>,
}

impl HsvFrame {
    /// Convert an RGB frame to HSV
    ///
    /// Output dimensions always equal input dimensions; an empty frame
    /// converts to an empty frame.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let _span = tracing::debug_span!("rgb_to_hsv").entered();

        let (width, height) = image.dimensions();
        let mut pixels = ImageBuffer::new(width, height);

        for (src, dst) in image.pixels().zip(pixels.pixels_mut()) {
            let hsv = rgb_to_hsv(src[0], src[1], src[2]);
            *dst = Rgb([hsv.h, hsv.s, hsv.v]);
        }

        Self { pixels }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Pixel at (x, y), `None` outside the frame
    pub fn get(&self, x: u32, y: u32) -> Option<Hsv> {
        self.pixels
            .get_pixel_checked(x, y)
            .map(|p| Hsv::new(p[0], p[1], p[2]))
    }

    /// Iterate pixels in row-major order
    pub fn pixels(&self) -> impl Iterator<Item = Hsv> + '_ {
        self.pixels.pixels().map(|p| Hsv::new(p[0], p[1], p[2]))
    }
}

impl From<ImageBuffer<Rgb<u8>, Vec<u8>>> for HsvFrame {
    /// Wrap a buffer that already holds HSV triplets
    fn from(pixels: ImageBuffer<Rgb<u8>, Vec<u8>>) -> Self {
        Self { pixels }
    }
}

/// Convert one RGB pixel to 8-bit HSV
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 360° folded into one byte; 180 is the wrap point
    let mut h = (h / 2.0).round() as u16;
    if h >= 180 {
        h -= 180;
    }

    Hsv {
        h: h as u8,
        s: s.round().clamp(0.0, 255.0) as u8,
        v: max as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::types::MAX_HUE;

    #[test]
    fn test_primary_colors() {
        assert_eq!(rgb_to_hsv(255, 0, 0), Hsv::new(0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), Hsv::new(60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), Hsv::new(120, 255, 255));
    }

    #[test]
    fn test_grays_have_no_hue_or_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), Hsv::new(0, 0, 0));
        assert_eq!(rgb_to_hsv(125, 125, 125), Hsv::new(0, 0, 125));
        assert_eq!(rgb_to_hsv(255, 255, 255), Hsv::new(0, 0, 255));
    }

    #[test]
    fn test_hue_near_wrap_point_folds_to_zero() {
        // 359.x degrees would round to 180 half-degrees
        let hsv = rgb_to_hsv(255, 0, 1);
        assert_eq!(hsv.h, 0);
        // magenta-ish pink sits just below the wrap
        let pink = rgb_to_hsv(255, 0, 60);
        assert!(pink.h >= 170 && pink.h <= MAX_HUE);
    }

    #[test]
    fn test_frame_dimensions_preserved() {
        let image = RgbImage::from_pixel(7, 3, Rgb([0, 255, 0]));
        let hsv = HsvFrame::from_rgb(&image);
        assert_eq!(hsv.dimensions(), (7, 3));
        assert_eq!(hsv.get(6, 2), Some(Hsv::new(60, 255, 255)));
        assert_eq!(hsv.get(7, 0), None);
    }

    #[test]
    fn test_empty_frame() {
        let hsv = HsvFrame::from_rgb(&RgbImage::new(0, 0));
        assert_eq!(hsv.dimensions(), (0, 0));
        assert_eq!(hsv.pixels().count(), 0);
    }
}
