use super::types::Mask;
use crate::config::ConfigError;
use imageproc::distance_transform::Norm;

/// Square all-ones structuring element with an odd side length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    size: u32,
}

impl StructuringElement {
    /// Largest side the L∞ distance transform can express (radius fits in a u8)
    pub const MAX_SIZE: u32 = 2 * u8::MAX as u32 + 1;

    pub fn new(size: u32) -> Result<Self, ConfigError> {
        if size == 0 || size % 2 == 0 || size > Self::MAX_SIZE {
            return Err(ConfigError::InvalidKernel(size));
        }
        Ok(Self { size })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    fn radius(&self) -> u8 {
        (self.size / 2) as u8
    }
}

impl Default for StructuringElement {
    fn default() -> Self {
        Self { size: 5 }
    }
}

/// Morphological opening: erosion followed by dilation
///
/// Removes foreground specks smaller than the element and leaves larger
/// regions at roughly their original size and position. Returns a new mask.
pub fn open(mask: &Mask, element: StructuringElement) -> Mask {
    let _span = tracing::debug_span!("open", size = element.size()).entered();
    imageproc::morphology::open(mask, Norm::LInf, element.radius())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::types::{BACKGROUND, FOREGROUND};
    use image::Luma;

    fn fill(mask: &mut Mask, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([FOREGROUND]));
            }
        }
    }

    fn noisy_mask() -> Mask {
        let mut mask = Mask::new(64, 64);
        fill(&mut mask, 10, 10, 12, 8);
        fill(&mut mask, 40, 30, 15, 15);
        // specks smaller than 5x5
        fill(&mut mask, 30, 5, 1, 1);
        fill(&mut mask, 5, 50, 3, 2);
        fill(&mut mask, 50, 10, 4, 4);
        mask
    }

    #[test]
    fn test_rejects_even_or_zero_size() {
        assert!(StructuringElement::new(0).is_err());
        assert!(StructuringElement::new(4).is_err());
        assert!(StructuringElement::new(513).is_err());
        assert_eq!(StructuringElement::new(3).unwrap().size(), 3);
        assert_eq!(StructuringElement::default().size(), 5);
    }

    #[test]
    fn test_opening_removes_specks_and_keeps_blocks() {
        let mask = noisy_mask();
        let opened = open(&mask, StructuringElement::default());

        assert_eq!(opened.get_pixel(30, 5)[0], BACKGROUND);
        assert_eq!(opened.get_pixel(6, 50)[0], BACKGROUND);
        assert_eq!(opened.get_pixel(51, 11)[0], BACKGROUND);

        for (x, y) in [(10, 10), (21, 17), (40, 30), (54, 44), (47, 37)] {
            assert_eq!(opened.get_pixel(x, y)[0], FOREGROUND, "pixel {x},{y}");
        }
        let count = opened.pixels().filter(|p| p[0] == FOREGROUND).count();
        assert_eq!(count, 12 * 8 + 15 * 15);
    }

    #[test]
    fn test_opening_does_not_mutate_input() {
        let mask = noisy_mask();
        let before = mask.clone();
        let _ = open(&mask, StructuringElement::default());
        assert_eq!(mask, before);
    }

    #[test]
    fn test_opening_is_idempotent() {
        let once = open(&noisy_mask(), StructuringElement::default());
        let twice = open(&once, StructuringElement::default());
        assert_eq!(once, twice);
    }
}
