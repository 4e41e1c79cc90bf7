use super::sampler::{sample_at, sample_window_average, SampleError};
use crate::capture::FrameSource;
use crate::input::{KeySource, PointerEvent, QUIT_KEY};
use crate::output::{DisplaySink, Overlay};
use crate::segmentation::{Hsv, HsvFrame, SampleAverage};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// Which pointer event takes a sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    /// A click averages the window around the point and completes the session
    Click,
    /// Pointer moves update the live readout; the session runs until quit
    Hover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Sampling,
    Completed,
}

/// Handler-owned fields, read by the frame loop as a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    pub pointer: Option<(u32, u32)>,
    pub at: Option<Hsv>,
    pub average: SampleAverage,
    pub phase: Phase,
}

impl SessionState {
    fn overlay(&self) -> Overlay {
        let mut text = Vec::new();
        match (self.pointer, self.at) {
            (Some((x, y)), Some(at)) => {
                let mut line = format!("HSV at {}/{}: {}", x, y, at);
                if let Some(avg) = self.average.average() {
                    line.push_str(&format!(". Avg around: {}", avg));
                }
                text.push(line);
            }
            _ => text.push("Point at the target color".to_string()),
        }

        Overlay {
            text,
            marker: self.pointer,
            ..Default::default()
        }
    }
}

/// Interactive color pick over a live preview
///
/// The frame loop publishes each converted frame; pointer events may arrive
/// from another thread at any time and always see a complete frame.
pub struct CalibrationSession {
    mode: TriggerMode,
    radius: u32,
    frame: RwLock<Option<Arc<HsvFrame>>>,
    state: RwLock<SessionState>,
}

impl CalibrationSession {
    pub fn new(mode: TriggerMode, radius: u32) -> Self {
        Self {
            mode,
            radius,
            frame: RwLock::new(None),
            state: RwLock::new(SessionState::default()),
        }
    }

    /// Replace the current frame; readers holding the old one keep it intact
    pub fn publish_frame(&self, frame: Arc<HsvFrame>) {
        *self.frame.write() = Some(frame);
    }

    pub fn current_frame(&self) -> Option<Arc<HsvFrame>> {
        self.frame.read().clone()
    }

    pub fn snapshot(&self) -> SessionState {
        *self.state.read()
    }

    pub fn is_complete(&self) -> bool {
        self.state.read().phase == Phase::Completed
    }

    /// Forget any pointer and sample taken so far
    pub fn restart(&self) {
        *self.state.write() = SessionState::default();
    }

    /// Apply a pointer event
    ///
    /// Events before the first frame, events not matching the trigger mode,
    /// events after completion and out-of-bounds events are dropped.
    pub fn handle_event(&self, event: PointerEvent) {
        let Some(frame) = self.current_frame() else {
            tracing::debug!("Ignoring {:?}, no frame yet", event);
            return;
        };

        let result = match (self.mode, event) {
            (TriggerMode::Click, PointerEvent::Click { x, y }) => self.take_sample(&frame, x, y),
            (TriggerMode::Hover, PointerEvent::Move { x, y }) => self.track_pointer(&frame, x, y),
            _ => Ok(()),
        };

        if let Err(e) = result {
            tracing::debug!("Discarding {:?}: {}", event, e);
        }
    }

    fn take_sample(&self, frame: &HsvFrame, x: u32, y: u32) -> Result<(), SampleError> {
        if self.is_complete() {
            return Ok(());
        }

        let at = sample_at(frame, x, y)?;
        let average = sample_window_average(frame, x, y, self.radius)?;

        tracing::info!(
            "Sampled {} at {}/{}, average over {} pixels: {}",
            at,
            x,
            y,
            average.count,
            average.average().unwrap_or_default()
        );

        let mut state = self.state.write();
        if state.phase == Phase::Completed {
            return Ok(());
        }
        *state = SessionState {
            pointer: Some((x, y)),
            at: Some(at),
            average,
            phase: Phase::Completed,
        };
        Ok(())
    }

    fn track_pointer(&self, frame: &HsvFrame, x: u32, y: u32) -> Result<(), SampleError> {
        let at = sample_at(frame, x, y)?;

        let mut state = self.state.write();
        state.pointer = Some((x, y));
        state.at = Some(at);
        Ok(())
    }

    /// Drive the preview until a sample is taken, the quit key is pressed,
    /// or the source ends
    ///
    /// Returns the final average; `count == 0` if nothing was sampled.
    pub fn run<C, O, K>(&self, source: &mut C, sink: &mut O, keys: &mut K) -> Result<SampleAverage>
    where
        C: FrameSource + ?Sized,
        O: DisplaySink + ?Sized,
        K: KeySource + ?Sized,
    {
        tracing::info!(
            "Starting calibration ({:?} mode, window radius {})",
            self.mode,
            self.radius
        );
        if self.mode == TriggerMode::Click {
            tracing::info!("Click the target color to sample it");
        }

        let mut frame_count = 0u64;
        let mut skipped = 0u64;

        loop {
            match source.next_frame() {
                Ok(Some(frame)) => {
                    self.publish_frame(Arc::new(HsvFrame::from_rgb(&frame)));
                    let overlay = self.snapshot().overlay();
                    sink.show(&frame, &overlay)
                        .context("Failed to show calibration frame")?;
                    frame_count += 1;
                }
                Ok(None) => {
                    tracing::info!("Frame source ended after {} frames", frame_count);
                    break;
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!("Skipping frame: {:#}", e);
                }
            }

            if keys.poll_key() == Some(QUIT_KEY) {
                tracing::info!("Calibration stopped by operator");
                break;
            }
            if self.is_complete() {
                tracing::info!("Calibration complete after {} frames", frame_count);
                break;
            }
        }

        if skipped > 0 {
            tracing::info!("{} frame reads failed during calibration", skipped);
        }

        Ok(self.snapshot().average)
    }
}
