mod convert;
pub mod morphology;
pub mod regions;
mod threshold;
pub mod types;

pub use convert::HsvFrame;
pub use morphology::StructuringElement;
pub use threshold::range_mask;
pub use types::{BoundingBox, Detection, Hsv, HueRange, Mask, RangeSet, SampleAverage};

use crate::config::TrackerConfig;
use image::RgbImage;

/// Everything the pipeline produced for one frame
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Cleaned mask, same dimensions as the frame
    pub mask: Mask,
    /// One box per external region, in discovery order
    pub regions: Vec<BoundingBox>,
    /// Largest region, `None` when nothing matched this frame
    pub selection: Option<Detection>,
}

impl Segmentation {
    pub fn has_selection(&self) -> bool {
        self.selection.is_some()
    }
}

/// Per-frame color segmentation: convert, threshold, open, extract, select
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    ranges: RangeSet,
    element: StructuringElement,
    epsilon: f64,
}

impl ColorSegmenter {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            ranges: config.ranges,
            element: config.element,
            epsilon: config.epsilon,
        }
    }

    pub fn ranges(&self) -> &RangeSet {
        &self.ranges
    }

    pub fn segment(&self, frame: &RgbImage) -> Segmentation {
        let _span = tracing::debug_span!("segment").entered();

        let hsv = HsvFrame::from_rgb(frame);
        self.segment_hsv(&hsv)
    }

    /// Run the pipeline on an already converted frame
    pub fn segment_hsv(&self, hsv: &HsvFrame) -> Segmentation {
        let raw = range_mask(hsv, &self.ranges);
        let mask = morphology::open(&raw, self.element);
        let regions = regions::extract_regions(&mask, self.epsilon);
        let selection = regions::select_largest(&regions).map(Detection::from);

        Segmentation {
            mask,
            regions,
            selection,
        }
    }
}
