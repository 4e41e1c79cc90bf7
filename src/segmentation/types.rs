use crate::config::ConfigError;
use image::GrayImage;

/// Binary mask: 255 = foreground (matched), 0 = background
/// Dimensions match the source frame dimensions
pub type Mask = GrayImage;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// Largest hue value; hue is stored as half-degrees of the 360° circle
pub const MAX_HUE: u8 = 179;

/// A single HSV pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

impl std::fmt::Display for Hsv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.h, self.s, self.v)
    }
}

/// Inclusive box in HSV space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HueRange {
    low: Hsv,
    high: Hsv,
}

impl HueRange {
    /// Build a range, rejecting `low > high` on any channel
    pub fn new(low: Hsv, high: Hsv) -> Result<Self, ConfigError> {
        for (channel, lo, hi) in [
            ("hue", low.h, high.h),
            ("saturation", low.s, high.s),
            ("value", low.v, high.v),
        ] {
            if lo > hi {
                return Err(ConfigError::MalformedRange {
                    channel,
                    low: lo,
                    high: hi,
                });
            }
        }
        Ok(Self { low, high })
    }

    pub fn low(&self) -> Hsv {
        self.low
    }

    pub fn high(&self) -> Hsv {
        self.high
    }

    #[inline]
    pub fn contains(&self, p: Hsv) -> bool {
        p.h >= self.low.h
            && p.h <= self.high.h
            && p.s >= self.low.s
            && p.s <= self.high.s
            && p.v >= self.low.v
            && p.v <= self.high.v
    }
}

/// One mandatory range plus an optional second one.
///
/// The second range expresses a hue band that crosses the 0/179 wrap point,
/// e.g. red split into `[170,179]` and `[0,10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSet {
    Single(HueRange),
    Wrapped(HueRange, HueRange),
}

impl RangeSet {
    pub fn primary(&self) -> &HueRange {
        match self {
            RangeSet::Single(r) | RangeSet::Wrapped(r, _) => r,
        }
    }

    pub fn secondary(&self) -> Option<&HueRange> {
        match self {
            RangeSet::Single(_) => None,
            RangeSet::Wrapped(_, r) => Some(r),
        }
    }

    #[inline]
    pub fn contains(&self, p: Hsv) -> bool {
        match self {
            RangeSet::Single(r) => r.contains(p),
            RangeSet::Wrapped(a, b) => a.contains(p) || b.contains(p),
        }
    }
}

/// Smallest axis-aligned rectangle enclosing a region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Center point, integer-truncated
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}x{})", self.x, self.y, self.width, self.height)
    }
}

/// Accumulated channel sums over a sampled window.
///
/// `count == 0` means nothing has been sampled yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleAverage {
    pub sum_h: u64,
    pub sum_s: u64,
    pub sum_v: u64,
    pub count: u64,
}

impl SampleAverage {
    pub fn add(&mut self, p: Hsv) {
        self.sum_h += p.h as u64;
        self.sum_s += p.s as u64;
        self.sum_v += p.v as u64;
        self.count += 1;
    }

    /// Integer-truncated mean, or `None` if no sample was taken
    pub fn average(&self) -> Option<Hsv> {
        if self.count == 0 {
            return None;
        }
        Some(Hsv {
            h: (self.sum_h / self.count) as u8,
            s: (self.sum_s / self.count) as u8,
            v: (self.sum_v / self.count) as u8,
        })
    }
}

/// The selected region of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub center: (u32, u32),
}

impl From<BoundingBox> for Detection {
    fn from(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            center: bbox.center(),
        }
    }
}
