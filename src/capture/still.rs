use super::FrameSource;
use anyhow::{Context, Result};
use image::RgbImage;
use std::path::Path;

/// Frames from still images instead of a live camera
///
/// Plays its frames once, or cycles through them forever when `repeat` is
/// set (useful for calibrating against a saved snapshot).
pub struct StillImageSource {
    frames: Vec<RgbImage>,
    next: usize,
    repeat: bool,
}

impl StillImageSource {
    pub fn from_frames(frames: Vec<RgbImage>, repeat: bool) -> Self {
        Self {
            frames,
            next: 0,
            repeat,
        }
    }

    pub fn open<P: AsRef<Path>>(paths: &[P], repeat: bool) -> Result<Self> {
        let frames = paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                tracing::info!("Loading still image {}", path.display());
                image::open(path)
                    .with_context(|| format!("Failed to load image {}", path.display()))
                    .map(|img| img.to_rgb8())
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_frames(frames, repeat))
    }
}

impl FrameSource for StillImageSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        if self.next == self.frames.len() {
            if !self.repeat {
                return Ok(None);
            }
            self.next = 0;
        }

        let frame = self.frames[self.next].clone();
        self.next += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (u32, u32) {
        self.frames
            .first()
            .map(|f| f.dimensions())
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plays_once_then_ends() {
        let mut source = StillImageSource::from_frames(vec![RgbImage::new(4, 3), RgbImage::new(4, 3)], false);
        assert_eq!(source.resolution(), (4, 3));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_repeat_cycles() {
        let mut source = StillImageSource::from_frames(vec![RgbImage::new(2, 2)], true);
        for _ in 0..5 {
            assert!(source.next_frame().unwrap().is_some());
        }
    }

    #[test]
    fn test_empty_source_ends_immediately() {
        let mut source = StillImageSource::from_frames(Vec::new(), true);
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.resolution(), (0, 0));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(StillImageSource::open(&["/nonexistent/frame.png"], false).is_err());
    }
}
