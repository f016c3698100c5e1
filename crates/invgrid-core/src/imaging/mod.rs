//! Raster stages: normalization, structural line removal, cell segmentation.

mod cells;
mod grid;
mod preprocessing;

pub use cells::{CellSegmenter, Segmentation};
pub use grid::{GridMasks, GridRecoverer};
pub use preprocessing::{ImageNormalizer, NormalizedImage, decode};

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Grow by `pad` on every side, clamped to `width` x `height`.
    pub fn padded(&self, pad: u32, width: u32, height: u32) -> BoundingBox {
        let x = self.x.saturating_sub(pad);
        let y = self.y.saturating_sub(pad);
        let right = (self.right() + pad).min(width);
        let bottom = (self.bottom() + pad).min(height);
        BoundingBox::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_clamps_to_image() {
        let b = BoundingBox::new(1, 2, 10, 10);
        assert_eq!(b.padded(3, 12, 100), BoundingBox::new(0, 0, 12, 15));
    }

    #[test]
    fn test_contains() {
        let outer = BoundingBox::new(0, 0, 100, 50);
        assert!(outer.contains(&BoundingBox::new(10, 10, 20, 20)));
        assert!(!outer.contains(&BoundingBox::new(90, 10, 20, 20)));
    }
}
