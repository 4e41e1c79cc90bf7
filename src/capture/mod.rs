mod still;
mod v4l_capture;

pub use still::StillImageSource;
pub use v4l_capture::WebcamCapture;

use anyhow::Result;
use image::RgbImage;

/// Trait for frame suppliers
pub trait FrameSource {
    /// Acquire the next frame
    ///
    /// * `Ok(Some(frame))` - a frame in RGB order
    /// * `Ok(None)` - the stream has ended
    /// * `Err(_)` - this read failed; the caller skips it and tries again
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;

    /// Get the resolution of supplied frames
    fn resolution(&self) -> (u32, u32);
}
