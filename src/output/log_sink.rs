use super::{DisplaySink, Overlay};
use anyhow::Result;
use image::RgbImage;

/// Headless sink that reports overlays through the log
///
/// Text lines are logged when they change so a steady scene does not flood
/// the output.
#[derive(Default)]
pub struct LogSink {
    last_text: Vec<String>,
    frames: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames
    }
}

impl DisplaySink for LogSink {
    fn show(&mut self, frame: &RgbImage, overlay: &Overlay) -> Result<()> {
        self.frames += 1;

        if overlay.text != self.last_text {
            for line in &overlay.text {
                tracing::info!("{}", line);
            }
            self.last_text.clone_from(&overlay.text);
        }

        tracing::trace!(
            frame = self.frames,
            width = frame.width(),
            height = frame.height(),
            boxes = overlay.boxes.len(),
            "frame shown"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_frames_and_remembers_text() {
        let mut sink = LogSink::new();
        let overlay = Overlay {
            text: vec!["nothing detected".to_string()],
            ..Default::default()
        };
        let frame = RgbImage::new(2, 2);

        sink.show(&frame, &overlay).unwrap();
        sink.show(&frame, &overlay).unwrap();

        assert_eq!(sink.frames_shown(), 2);
        assert_eq!(sink.last_text, overlay.text);
    }
}
