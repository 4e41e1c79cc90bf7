use crate::segmentation::{Hsv, HsvFrame, SampleAverage};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("point {x}/{y} is outside the {width}x{height} frame")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

fn out_of_bounds(frame: &HsvFrame, x: u32, y: u32) -> SampleError {
    let (width, height) = frame.dimensions();
    SampleError::OutOfBounds {
        x,
        y,
        width,
        height,
    }
}

/// HSV value at (x, y)
pub fn sample_at(frame: &HsvFrame, x: u32, y: u32) -> Result<Hsv, SampleError> {
    frame.get(x, y).ok_or_else(|| out_of_bounds(frame, x, y))
}

/// Channel sums over the square window of side `2 * radius + 1` centered on
/// (x, y), clipped to the frame
pub fn sample_window_average(
    frame: &HsvFrame,
    x: u32,
    y: u32,
    radius: u32,
) -> Result<SampleAverage, SampleError> {
    sample_at(frame, x, y)?;

    let (width, height) = frame.dimensions();
    let x_min = x.saturating_sub(radius);
    let x_max = x.saturating_add(radius).saturating_add(1).min(width);
    let y_min = y.saturating_sub(radius);
    let y_max = y.saturating_add(radius).saturating_add(1).min(height);

    let mut average = SampleAverage::default();
    for wy in y_min..y_max {
        for wx in x_min..x_max {
            // the window is clipped to the frame, so every lookup hits
            if let Some(p) = frame.get(wx, wy) {
                average.add(p);
            }
        }
    }

    Ok(average)
}
