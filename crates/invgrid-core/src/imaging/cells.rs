//! Cell segmentation over the content-only mask.

use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, Contour, find_contours};
use tracing::debug;

use super::BoundingBox;
use crate::models::config::CellConfig;

/// Candidate cell boxes for one page.
#[derive(Debug, Clone, Default)]
pub struct Segmentation {
    /// Boxes sorted top-to-bottom, then left-to-right.
    pub boxes: Vec<BoundingBox>,
    /// Boxes dropped by the `max_cells` cap.
    pub dropped: usize,
    /// Contours traced before filtering.
    pub contours: usize,
}

/// Finds connected content regions and reduces them to boxes.
pub struct CellSegmenter {
    min_width: u32,
    min_height: u32,
    merge_gap_x: u32,
    merge_gap_y: u32,
    max_cells: usize,
}

impl CellSegmenter {
    pub fn new(config: &CellConfig) -> Self {
        Self {
            min_width: config.min_width,
            min_height: config.min_height,
            merge_gap_x: config.merge_gap_x,
            merge_gap_y: config.merge_gap_y,
            max_cells: config.max_cells,
        }
    }

    /// Segment a content mask (ink = 255) into cell boxes.
    pub fn segment(&self, content: &GrayImage) -> Segmentation {
        let merged = close_gaps(content, self.merge_gap_x, self.merge_gap_y);

        // Both outer and hole borders are traced; nested boxes are folded below.
        let contours: Vec<Contour<u32>> = find_contours(&merged);
        let traced = contours.len();
        let holes = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Hole)
            .count();

        let mut boxes: Vec<BoundingBox> = contours
            .iter()
            .filter_map(contour_bounds)
            .filter(|b| b.width > self.min_width && b.height > self.min_height)
            .collect();

        boxes.sort_by_key(|b| (b.y, b.x, b.width, b.height));
        boxes.dedup();
        let mut boxes = suppress_nested(boxes);

        let dropped = boxes.len().saturating_sub(self.max_cells);
        boxes.truncate(self.max_cells);

        debug!(
            "Segmented {} cells from {} contours ({} holes, {} dropped by cap)",
            boxes.len(),
            traced,
            holes,
            dropped
        );

        Segmentation {
            boxes,
            dropped,
            contours: traced,
        }
    }
}

fn contour_bounds(contour: &Contour<u32>) -> Option<BoundingBox> {
    let first = contour.points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &contour.points {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    Some(BoundingBox::new(
        min_x,
        min_y,
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}

/// Drop boxes that lie inside another box.
fn suppress_nested(boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    boxes
        .iter()
        .enumerate()
        .filter(|(i, b)| {
            !boxes
                .iter()
                .enumerate()
                .any(|(j, other)| *i != j && other != *b && other.contains(b))
        })
        .map(|(_, b)| *b)
        .collect()
}

/// Fill background gaps no longer than `gap_x` / `gap_y` between ink pixels.
pub fn close_gaps(mask: &GrayImage, gap_x: u32, gap_y: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = mask.clone();

    if gap_x > 0 {
        for y in 0..height {
            let mut last_ink: Option<u32> = None;
            for x in 0..width {
                if mask.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                if let Some(prev) = last_ink {
                    let gap = x - prev - 1;
                    if gap > 0 && gap <= gap_x {
                        for fill in prev + 1..x {
                            out.put_pixel(fill, y, Luma([255]));
                        }
                    }
                }
                last_ink = Some(x);
            }
        }
    }

    if gap_y > 0 {
        let horizontal = out.clone();
        for x in 0..width {
            let mut last_ink: Option<u32> = None;
            for y in 0..height {
                if horizontal.get_pixel(x, y)[0] == 0 {
                    continue;
                }
                if let Some(prev) = last_ink {
                    let gap = y - prev - 1;
                    if gap > 0 && gap <= gap_y {
                        for fill in prev + 1..y {
                            out.put_pixel(x, fill, Luma([255]));
                        }
                    }
                }
                last_ink = Some(y);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(img: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }

    /// Draw a "word": `glyphs` glyphs of 8x18 with 4px spacing.
    fn word(img: &mut GrayImage, x: u32, y: u32, glyphs: u32) {
        for g in 0..glyphs {
            let gx = x + g * 12;
            fill(img, gx, y, gx + 8, y + 18);
        }
    }

    #[test]
    fn test_glyphs_merge_into_one_cell() {
        let mut content = GrayImage::new(200, 60);
        word(&mut content, 10, 10, 5);

        let segmentation = CellSegmenter::new(&CellConfig::default()).segment(&content);
        assert_eq!(segmentation.boxes, vec![BoundingBox::new(10, 10, 56, 18)]);
    }

    #[test]
    fn test_speckles_are_filtered() {
        let mut content = GrayImage::new(200, 60);
        fill(&mut content, 5, 5, 7, 7);
        fill(&mut content, 100, 30, 125, 40);

        let segmentation = CellSegmenter::new(&CellConfig::default()).segment(&content);
        assert!(segmentation.boxes.is_empty());
        assert!(segmentation.contours >= 2);
    }

    #[test]
    fn test_separate_cells_stay_separate() {
        let mut content = GrayImage::new(300, 80);
        word(&mut content, 10, 10, 4);
        word(&mut content, 150, 10, 3);
        word(&mut content, 10, 50, 3);

        let segmentation = CellSegmenter::new(&CellConfig::default()).segment(&content);
        assert_eq!(
            segmentation.boxes,
            vec![
                BoundingBox::new(10, 10, 44, 18),
                BoundingBox::new(150, 10, 32, 18),
                BoundingBox::new(10, 50, 32, 18),
            ]
        );
    }

    #[test]
    fn test_hole_boxes_are_folded_into_outer() {
        let mut content = GrayImage::new(200, 100);
        // Ring: outer 80x50, hole 60x30
        fill(&mut content, 10, 10, 90, 60);
        for y in 20..50 {
            for x in 20..80 {
                content.put_pixel(x, y, Luma([0]));
            }
        }

        let config = CellConfig {
            merge_gap_x: 0,
            merge_gap_y: 0,
            ..CellConfig::default()
        };
        let segmentation = CellSegmenter::new(&config).segment(&content);
        assert_eq!(segmentation.boxes, vec![BoundingBox::new(10, 10, 80, 50)]);
    }

    #[test]
    fn test_cap_limits_cells() {
        let mut content = GrayImage::new(400, 200);
        for row in 0..4 {
            word(&mut content, 10, 10 + row * 40, 4);
        }

        let config = CellConfig {
            max_cells: 2,
            ..CellConfig::default()
        };
        let segmentation = CellSegmenter::new(&config).segment(&content);
        assert_eq!(segmentation.boxes.len(), 2);
        assert_eq!(segmentation.dropped, 2);
    }

    #[test]
    fn test_close_gaps_respects_limit() {
        let mut mask = GrayImage::new(40, 1);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(5, 0, Luma([255]));
        mask.put_pixel(30, 0, Luma([255]));

        let closed = close_gaps(&mask, 10, 0);
        assert!((0..=5).all(|x| closed.get_pixel(x, 0)[0] == 255));
        assert_eq!(closed.get_pixel(15, 0)[0], 0);
    }
}
