use crate::capture::FrameSource;
use crate::input::{KeySource, QUIT_KEY};
use crate::output::{DisplaySink, Overlay};
use crate::segmentation::{ColorSegmenter, Detection, Segmentation};
use anyhow::{Context, Result};
use std::time::{Duration, Instant};

/// Counters reported when the tracking loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackingSummary {
    pub frames: u64,
    pub skipped: u64,
    pub detections: u64,
}

fn overlay_for(segmentation: Segmentation) -> Overlay {
    let text = match segmentation.selection {
        Some(Detection { bbox, center }) => format!(
            "Largest of {} regions: {} center {}/{}",
            segmentation.regions.len(),
            bbox,
            center.0,
            center.1
        ),
        None => "Nothing detected".to_string(),
    };

    Overlay {
        text: vec![text],
        boxes: segmentation.selection.map(|d| d.bbox).into_iter().collect(),
        marker: segmentation.selection.map(|d| d.center),
        mask: Some(segmentation.mask),
    }
}

/// Segment every frame and hand the largest region to the sink
///
/// Runs until the quit key, or until the source ends. Failed reads are
/// skipped. `target_fps` of `None` runs as fast as the source delivers.
pub fn run_tracking<C, O, K>(
    segmenter: &ColorSegmenter,
    capture: &mut C,
    output: &mut O,
    keys: &mut K,
    target_fps: Option<u32>,
) -> Result<TrackingSummary>
where
    C: FrameSource + ?Sized,
    O: DisplaySink + ?Sized,
    K: KeySource + ?Sized,
{
    let frame_duration = target_fps
        .filter(|fps| *fps > 0)
        .map(|fps| Duration::from_secs_f32(1.0 / fps as f32));
    let mut summary = TrackingSummary::default();
    let mut total_capture_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut last_detected: Option<bool> = None;

    tracing::info!("Starting tracking loop with {:?}", segmenter.ranges());
    tracing::info!("Press '{}' to stop", QUIT_KEY);

    loop {
        let loop_start = Instant::now();

        let capture_start = Instant::now();
        let acquired = capture.next_frame();
        total_capture_time += capture_start.elapsed();

        match acquired {
            Ok(Some(frame)) => {
                let segment_start = Instant::now();
                let segmentation = segmenter.segment(&frame);
                total_segment_time += segment_start.elapsed();

                let detected = segmentation.has_selection();
                if let Some(det) = segmentation.selection {
                    summary.detections += 1;
                    tracing::debug!(
                        "Feature at {}/{} in {}",
                        det.center.0,
                        det.center.1,
                        det.bbox
                    );
                }
                if last_detected != Some(detected) {
                    match segmentation.selection {
                        Some(det) => tracing::info!("Target acquired at {}", det.bbox),
                        None => tracing::info!("Nothing detected"),
                    }
                    last_detected = Some(detected);
                }

                let output_start = Instant::now();
                output
                    .show(&frame, &overlay_for(segmentation))
                    .context("Failed to show frame")?;
                total_output_time += output_start.elapsed();

                summary.frames += 1;

                // Log stats every 30 frames
                if summary.frames % 30 == 0 {
                    let n = summary.frames as f64;
                    let avg_capture_ms = total_capture_time.as_secs_f64() * 1000.0 / n;
                    let avg_segment_ms = total_segment_time.as_secs_f64() * 1000.0 / n;
                    let avg_output_ms = total_output_time.as_secs_f64() * 1000.0 / n;
                    let total_ms = avg_capture_ms + avg_segment_ms + avg_output_ms;

                    tracing::info!(
                        "Frame {}: capture={:.1}ms, segment={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
                        summary.frames,
                        avg_capture_ms,
                        avg_segment_ms,
                        avg_output_ms,
                        total_ms,
                        1000.0 / total_ms
                    );
                }
            }
            Ok(None) => {
                tracing::info!("Frame source ended");
                break;
            }
            Err(e) => {
                summary.skipped += 1;
                tracing::warn!("Skipping frame: {:#}", e);
            }
        }

        if keys.poll_key() == Some(QUIT_KEY) {
            tracing::info!("Tracking stopped by operator");
            break;
        }

        if let Some(frame_duration) = frame_duration {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    tracing::info!(
        "Tracked {} frames ({} skipped), target found in {}",
        summary.frames,
        summary.skipped,
        summary.detections
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::StillImageSource;
    use crate::config::{band_around, TrackerConfig};
    use crate::segmentation::{BoundingBox, Hsv};
    use anyhow::anyhow;
    use image::{Rgb, RgbImage};

    struct NoKeys;

    impl KeySource for NoKeys {
        fn poll_key(&mut self) -> Option<char> {
            None
        }
    }

    /// Fails every other read before delegating
    struct FlakySource {
        inner: StillImageSource,
        fail_next: bool,
    }

    impl FrameSource for FlakySource {
        fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            self.fail_next = !self.fail_next;
            if self.fail_next {
                return Err(anyhow!("device busy"));
            }
            self.inner.next_frame()
        }

        fn resolution(&self) -> (u32, u32) {
            self.inner.resolution()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        boxes: Vec<Vec<BoundingBox>>,
        text: Vec<String>,
    }

    impl DisplaySink for RecordingSink {
        fn show(&mut self, _frame: &RgbImage, overlay: &Overlay) -> Result<()> {
            self.boxes.push(overlay.boxes.clone());
            self.text.extend(overlay.text.iter().cloned());
            Ok(())
        }
    }

    fn green_segmenter() -> ColorSegmenter {
        let ranges = band_around(Hsv::new(60, 255, 255), 8, 50, 50).unwrap();
        ColorSegmenter::new(&TrackerConfig::new(ranges, 5, 3.0).unwrap())
    }

    fn frame_with_square(x0: u32, y0: u32, size: u32) -> RgbImage {
        let mut frame = RgbImage::new(80, 60);
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                frame.put_pixel(x, y, Rgb([0, 255, 0]));
            }
        }
        frame
    }

    #[test]
    fn test_tracks_until_source_ends_despite_failed_reads() {
        let frames = vec![frame_with_square(10, 10, 12), RgbImage::new(80, 60), frame_with_square(40, 20, 16)];
        let mut source = FlakySource {
            inner: StillImageSource::from_frames(frames, false),
            fail_next: false,
        };
        let mut sink = RecordingSink::default();

        let summary = run_tracking(&green_segmenter(), &mut source, &mut sink, &mut NoKeys, None).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.detections, 2);
        assert!(summary.skipped >= 3);

        assert_eq!(sink.boxes.len(), 3);
        assert_eq!(sink.boxes[0].len(), 1);
        assert!(sink.boxes[1].is_empty());
        assert_eq!(sink.text[1], "Nothing detected");
        let last = sink.boxes[2][0];
        assert!(last.x.abs_diff(40) <= 3 && last.width.abs_diff(16) <= 3);
    }

    #[test]
    fn test_quit_key_stops_endless_source() {
        let mut source = StillImageSource::from_frames(vec![frame_with_square(5, 5, 10)], true);
        let mut sink = RecordingSink::default();
        let (sender, mut keys) = crossbeam_channel::bounded(1);
        sender.send(QUIT_KEY).unwrap();

        let summary = run_tracking(&green_segmenter(), &mut source, &mut sink, &mut keys, Some(1000)).unwrap();

        assert_eq!(summary.frames, 1);
        assert_eq!(summary.detections, 1);
    }

    #[test]
    fn test_overlay_carries_mask_and_center() {
        let segmentation = green_segmenter().segment(&frame_with_square(20, 20, 10));
        let overlay = overlay_for(segmentation);

        assert_eq!(overlay.boxes.len(), 1);
        let (cx, cy) = overlay.marker.unwrap();
        assert!(cx.abs_diff(25) <= 3 && cy.abs_diff(25) <= 3);
        assert_eq!(overlay.mask.unwrap().dimensions(), (80, 60));
        assert!(overlay.text[0].starts_with("Largest of 1 regions"));
    }
}
