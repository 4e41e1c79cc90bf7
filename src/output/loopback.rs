use super::{annotate, DisplaySink, Overlay};
use anyhow::{Context, Result};
use image::RgbImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use v4l::video::Output;
use v4l::{Device, Format, FourCC};

/// Preview sink writing annotated frames to a v4l2loopback device
///
/// Any V4L2 viewer opened on the loopback device shows the tracker's view.
pub struct V4L2Output {
    file: File,
    width: u32,
    height: u32,
    show_mask: bool,
}

impl V4L2Output {
    pub fn new<P: AsRef<Path>>(device_path: P, width: u32, height: u32, show_mask: bool) -> Result<Self> {
        let path = device_path.as_ref();
        tracing::info!(
            "Opening v4l2loopback device at {} ({}x{})",
            path.display(),
            width,
            height
        );

        let device = Device::with_path(path)
            .with_context(|| format!("Failed to open v4l2 device at {}", path.display()))?;
        let format = Format::new(width, height, FourCC::new(b"YUYV"));
        let applied = Output::set_format(&device, &format)
            .context("Failed to set loopback output format")?;
        if applied.width != width || applied.height != height {
            tracing::warn!(
                "Loopback device accepted {}x{} instead of {}x{}",
                applied.width,
                applied.height,
                width,
                height
            );
        }

        // v4l2loopback accepts raw frame data written to the device file
        let file = File::options()
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open v4l2loopback device at {}", path.display()))?;

        tracing::info!("v4l2loopback device opened successfully");

        Ok(Self {
            file,
            width,
            height,
            show_mask,
        })
    }

    /// Convert RGB frame to YUV422 (YUYV) format
    fn rgb_to_yuyv(rgb_image: &RgbImage) -> Vec<u8> {
        let (width, height) = rgb_image.dimensions();
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);

        for y in 0..height {
            for x in (0..width).step_by(2) {
                let pixel1 = rgb_image.get_pixel(x, y);
                let pixel2 = if x + 1 < width {
                    rgb_image.get_pixel(x + 1, y)
                } else {
                    pixel1
                };

                let (y1, u1, v1) = rgb_to_yuv(pixel1[0], pixel1[1], pixel1[2]);
                let (y2, u2, v2) = rgb_to_yuv(pixel2[0], pixel2[1], pixel2[2]);

                // chroma is shared by each pixel pair
                let u = ((u1 as u16 + u2 as u16) / 2) as u8;
                let v = ((v1 as u16 + v2 as u16) / 2) as u8;

                // Y0 U Y1 V
                yuyv.extend_from_slice(&[y1, u, y2, v]);
            }
        }

        yuyv
    }
}

fn rgb_to_yuv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r = r as f32;
    let g = g as f32;
    let b = b as f32;

    let y = (0.299 * r + 0.587 * g + 0.114 * b).clamp(0.0, 255.0) as u8;
    let u = ((-0.147 * r - 0.289 * g + 0.436 * b) + 128.0).clamp(0.0, 255.0) as u8;
    let v = ((0.615 * r - 0.515 * g - 0.100 * b) + 128.0).clamp(0.0, 255.0) as u8;

    (y, u, v)
}

impl DisplaySink for V4L2Output {
    fn show(&mut self, frame: &RgbImage, overlay: &Overlay) -> Result<()> {
        for line in &overlay.text {
            tracing::debug!("{}", line);
        }

        let annotated = annotate(frame, overlay, self.show_mask);
        let annotated = if annotated.dimensions() != (self.width, self.height) {
            image::imageops::resize(
                &annotated,
                self.width,
                self.height,
                image::imageops::FilterType::Triangle,
            )
        } else {
            annotated
        };

        let yuyv_data = Self::rgb_to_yuyv(&annotated);

        self.file
            .write_all(&yuyv_data)
            .context("Failed to write frame to v4l2loopback device")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_yuyv_packs_two_pixels_in_four_bytes() {
        let image = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
        let yuyv = V4L2Output::rgb_to_yuyv(&image);
        assert_eq!(yuyv.len(), 4 * 2 * 2);
        assert!(yuyv[0] >= 254 && yuyv[2] >= 254);
        assert!(yuyv[1].abs_diff(128) <= 1 && yuyv[3].abs_diff(128) <= 1);
    }

    #[test]
    fn test_black_is_neutral_chroma() {
        assert_eq!(rgb_to_yuv(0, 0, 0), (0, 128, 128));
    }
}
