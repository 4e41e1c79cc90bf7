use super::convert::HsvFrame;
use super::types::{Hsv, Mask, RangeSet, BACKGROUND, FOREGROUND};
use image::Luma;

/// Mark every pixel inside the range set as foreground
///
/// A `Wrapped` set is the union of its two ranges; a `Single` set runs one
/// test per pixel only.
pub fn range_mask(frame: &HsvFrame, ranges: &RangeSet) -> Mask {
    let _span = tracing::debug_span!("range_mask").entered();

    match ranges {
        RangeSet::Single(range) => mask_where(frame, |p| range.contains(p)),
        RangeSet::Wrapped(first, second) => {
            mask_where(frame, |p| first.contains(p) || second.contains(p))
        }
    }
}

fn mask_where<F>(frame: &HsvFrame, matches: F) -> Mask
where
    F: Fn(Hsv) -> bool,
{
    let (width, height) = frame.dimensions();
    let mut mask = Mask::new(width, height);

    for (p, out) in frame.pixels().zip(mask.pixels_mut()) {
        *out = Luma([if matches(p) { FOREGROUND } else { BACKGROUND }]);
    }

    mask
}
