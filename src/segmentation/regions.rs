use super::types::{BoundingBox, Mask};
use image::imageops;
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

/// Default polygon approximation distance, in pixels
pub const DEFAULT_EPSILON: f64 = 3.0;

/// Bounding boxes of all externally connected foreground regions
///
/// Only outer borders of top-level regions are traced; regions sitting in
/// another region's hole are not reported. Each border is simplified with
/// tolerance `epsilon` before its box is taken. Boxes come back in the order
/// the borders are found (raster order of their first pixel).
pub fn extract_regions(mask: &Mask, epsilon: f64) -> Vec<BoundingBox> {
    let _span = tracing::debug_span!("extract_regions").entered();

    // Border tracing needs a background frame around the mask, otherwise
    // regions touching the left edge come back as holes.
    let (width, height) = mask.dimensions();
    let mut padded = Mask::new(width + 2, height + 2);
    imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(|c| {
            let points: Vec<Point<i32>> = c
                .points
                .iter()
                .map(|p| Point::new(p.x - 1, p.y - 1))
                .collect();
            if points.len() < 3 {
                return bounding_box(&points);
            }
            bounding_box(&simplify_closed(&points, epsilon))
        })
        .collect()
}

/// Approximate a closed border, splitting it at the point farthest from its
/// start so both extremes survive even for degenerate (line-like) borders
fn simplify_closed(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by_key(|(_, p)| {
            let (dx, dy) = (i64::from(p.x - start.x), i64::from(p.y - start.y));
            dx * dx + dy * dy
        })
        .map_or(0, |(i, _)| i);
    if far == 0 {
        return vec![start];
    }

    let mut back: Vec<Point<i32>> = points[far..].to_vec();
    back.push(start);

    let mut simplified = approximate_polygon_dp(&points[..=far], epsilon, false);
    simplified.pop();
    simplified.extend(approximate_polygon_dp(&back, epsilon, false));
    simplified
}

/// Smallest rectangle enclosing every point
fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Some(BoundingBox {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// The box with the greatest area; the first one wins a tie
pub fn select_largest(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    let mut best: Option<BoundingBox> = None;
    for candidate in boxes {
        match best {
            Some(b) if b.area() >= candidate.area() => {}
            _ => best = Some(*candidate),
        }
    }
    best
}
