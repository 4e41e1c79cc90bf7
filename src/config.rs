use crate::segmentation::types::{Hsv, HueRange, RangeSet, MAX_HUE};
use crate::segmentation::StructuringElement;
use std::str::FromStr;
use thiserror::Error;

/// Lower saturation/value bounds that give good results on webcam footage
pub const DEFAULT_MIN_SATURATION: u8 = 50;
pub const DEFAULT_MIN_VALUE: u8 = 50;

/// Default hue half-width around a calibrated hue
pub const DEFAULT_HUE_WINDOW: u8 = 8;

/// Number of distinct hues on the folded circle
const HUE_STEPS: u16 = MAX_HUE as u16 + 1;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("malformed range: {channel} low {low} is greater than high {high}")]
    MalformedRange {
        channel: &'static str,
        low: u8,
        high: u8,
    },

    #[error("structuring element size must be odd and between 1 and 511, got {0}")]
    InvalidKernel(u32),

    #[error("polygon approximation distance must be positive, got {0}")]
    InvalidEpsilon(f64),

    #[error("hue must be in [0, 179], got {0}")]
    InvalidHue(u16),

    #[error("expected one or two ranges, got {0}")]
    RangeCount(usize),

    #[error("cannot parse range '{0}', expected H,S,V:H,S,V")]
    ParseRange(String),
}

/// Validated settings for the tracking pipeline
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub ranges: RangeSet,
    pub element: StructuringElement,
    pub epsilon: f64,
}

impl TrackerConfig {
    pub fn new(ranges: RangeSet, kernel_size: u32, epsilon: f64) -> Result<Self, ConfigError> {
        if epsilon.is_nan() || epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(epsilon));
        }
        Ok(Self {
            ranges,
            element: StructuringElement::new(kernel_size)?,
            epsilon,
        })
    }
}

/// Ranges matching hues within `window` of the calibrated color.
///
/// The band `[h - window, h + window]` is taken modulo 180; when it crosses
/// the wrap point it is split into `[low, 179]` and `[0, high]`. Saturation
/// and value must reach `min_saturation`/`min_value`, lowered to the
/// calibrated color's own S/V so the calibrated color always matches.
pub fn band_around(
    color: Hsv,
    window: u8,
    min_saturation: u8,
    min_value: u8,
) -> Result<RangeSet, ConfigError> {
    if color.h > MAX_HUE {
        return Err(ConfigError::InvalidHue(color.h as u16));
    }

    let s_low = min_saturation.min(color.s);
    let v_low = min_value.min(color.v);
    let range = |h_low: u8, h_high: u8| {
        HueRange::new(Hsv::new(h_low, s_low, v_low), Hsv::new(h_high, 255, 255))
    };

    let window = window as u16;
    if 2 * window + 1 >= HUE_STEPS {
        return Ok(RangeSet::Single(range(0, MAX_HUE)?));
    }

    let h = color.h as u16;
    let low = ((h + HUE_STEPS - window) % HUE_STEPS) as u8;
    let high = ((h + window) % HUE_STEPS) as u8;

    if low > high {
        Ok(RangeSet::Wrapped(range(low, MAX_HUE)?, range(0, high)?))
    } else {
        Ok(RangeSet::Single(range(low, high)?))
    }
}

/// Combine explicitly configured ranges into a set
pub fn explicit_ranges(ranges: &[HueRange]) -> Result<RangeSet, ConfigError> {
    match ranges {
        [single] => Ok(RangeSet::Single(*single)),
        [first, second] => Ok(RangeSet::Wrapped(*first, *second)),
        other => Err(ConfigError::RangeCount(other.len())),
    }
}

impl FromStr for HueRange {
    type Err = ConfigError;

    /// Parse `H,S,V:H,S,V`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || ConfigError::ParseRange(s.to_string());

        let (low, high) = s.split_once(':').ok_or_else(parse_err)?;
        let triplet = |part: &str| -> Result<Hsv, ConfigError> {
            let values: Vec<u8> = part
                .split(',')
                .map(|v| v.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .map_err(|_| parse_err())?;
            match values[..] {
                [h, s, v] => Ok(Hsv::new(h, s, v)),
                _ => Err(parse_err()),
            }
        };

        HueRange::new(triplet(low)?, triplet(high)?)
    }
}
