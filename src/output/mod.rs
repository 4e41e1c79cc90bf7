mod log_sink;
mod loopback;

pub use log_sink::LogSink;
pub use loopback::V4L2Output;

use crate::segmentation::{BoundingBox, Mask};
use anyhow::Result;
use image::{Luma, Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Geometric results to render on top of a frame
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    /// Status lines (HSV readouts, detection summary)
    pub text: Vec<String>,
    /// Rectangles to outline
    pub boxes: Vec<BoundingBox>,
    /// A single point of interest, e.g. the operator's pointer
    pub marker: Option<(u32, u32)>,
    /// Cleaned mask of the frame, for sinks that can show it
    pub mask: Option<Mask>,
}

/// Trait for display destinations
pub trait DisplaySink {
    /// Render a frame with its overlay
    fn show(&mut self, frame: &RgbImage, overlay: &Overlay) -> Result<()>;
}

const BOX_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: i32 = 4;
const MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw an overlay's boxes and marker onto a copy of the frame
///
/// With `show_mask` set and a mask present, the mask is drawn in place of the
/// frame. Text is left to sinks that can render it.
pub fn annotate(frame: &RgbImage, overlay: &Overlay, show_mask: bool) -> RgbImage {
    let _span = tracing::debug_span!("annotate").entered();

    let mut canvas = match (&overlay.mask, show_mask) {
        (Some(mask), true) => mask_to_rgb(mask),
        _ => frame.clone(),
    };

    for bbox in &overlay.boxes {
        for inset in 0..BOX_THICKNESS {
            let width = bbox.width as i32 - 2 * inset;
            let height = bbox.height as i32 - 2 * inset;
            if width <= 0 || height <= 0 {
                break;
            }
            let rect = Rect::at(bbox.x as i32 + inset, bbox.y as i32 + inset)
                .of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }
    }

    if let Some((x, y)) = overlay.marker {
        draw_cross_mut(&mut canvas, MARKER_COLOR, x as i32, y as i32);
    }

    canvas
}

/// Convert a mask to a grayscale RGB image for visualization
pub fn mask_to_rgb(mask: &Mask) -> RgbImage {
    RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let Luma([value]) = *mask.get_pixel(x, y);
        Rgb([value, value, value])
    })
}
