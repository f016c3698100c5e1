//! Structural line isolation.
//!
//! Table borders are long, thin runs of ink. A morphological opening with a
//! line-shaped element keeps exactly those runs; subtracting them from the
//! binarized page leaves the cell content.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use tracing::debug;

use crate::models::config::GridConfig;

/// Line and content masks recovered from a binarized page.
#[derive(Debug, Clone)]
pub struct GridMasks {
    /// Horizontal rule lines.
    pub horizontal: GrayImage,
    /// Vertical rule lines.
    pub vertical: GrayImage,
    /// Union of both line masks (after dilation).
    pub lines: GrayImage,
    /// Ink that is not part of a rule line.
    pub content: GrayImage,
    /// Number of foreground pixels in `content`.
    pub content_pixels: usize,
}

impl GridMasks {
    /// No content left to segment.
    pub fn is_empty(&self) -> bool {
        self.content_pixels == 0
    }
}

/// Separates table rule lines from text.
pub struct GridRecoverer {
    line_scale: u32,
    min_line_length: u32,
    line_dilation: u8,
}

impl GridRecoverer {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            line_scale: config.line_scale.max(1),
            min_line_length: config.min_line_length.max(1),
            line_dilation: config.line_dilation,
        }
    }

    /// Element lengths `(horizontal, vertical)` for an image, proportional to its size.
    pub fn element_lengths(&self, width: u32, height: u32) -> (u32, u32) {
        (
            (width / self.line_scale).max(self.min_line_length),
            (height / self.line_scale).max(self.min_line_length),
        )
    }

    /// Split `binary` (ink = 255) into line and content masks.
    pub fn recover(&self, binary: &GrayImage) -> GridMasks {
        let (width, height) = binary.dimensions();
        let (h_len, v_len) = self.element_lengths(width, height);

        let horizontal = open_horizontal(binary, h_len);
        let vertical = open_vertical(binary, v_len);

        let mut lines = weighted_union(&horizontal, &vertical);
        if self.line_dilation > 0 {
            lines = dilate(&lines, Norm::LInf, self.line_dilation);
        }

        let mut content = GrayImage::new(width, height);
        let mut content_pixels = 0usize;
        for (x, y, pixel) in binary.enumerate_pixels() {
            if pixel[0] > 0 && lines.get_pixel(x, y)[0] == 0 {
                content.put_pixel(x, y, Luma([255]));
                content_pixels += 1;
            }
        }

        debug!(
            "Grid recovery {}x{}: elements h={} v={}, {} content pixels",
            width, height, h_len, v_len, content_pixels
        );

        GridMasks {
            horizontal,
            vertical,
            lines,
            content,
            content_pixels,
        }
    }
}

/// Opening with a `1 x len` element: keep horizontal runs at least `len` long.
pub fn open_horizontal(mask: &GrayImage, len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        let mut x = 0;
        while x < width {
            if mask.get_pixel(x, y)[0] == 0 {
                x += 1;
                continue;
            }
            let start = x;
            while x < width && mask.get_pixel(x, y)[0] > 0 {
                x += 1;
            }
            if x - start >= len {
                for fill in start..x {
                    out.put_pixel(fill, y, Luma([255]));
                }
            }
        }
    }

    out
}

/// Opening with a `len x 1` element: keep vertical runs at least `len` long.
pub fn open_vertical(mask: &GrayImage, len: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let mut out = GrayImage::new(width, height);

    for x in 0..width {
        let mut y = 0;
        while y < height {
            if mask.get_pixel(x, y)[0] == 0 {
                y += 1;
                continue;
            }
            let start = y;
            while y < height && mask.get_pixel(x, y)[0] > 0 {
                y += 1;
            }
            if y - start >= len {
                for fill in start..y {
                    out.put_pixel(x, fill, Luma([255]));
                }
            }
        }
    }

    out
}

/// `0.5 * a + 0.5 * b`, any non-zero result counts as line.
fn weighted_union(a: &GrayImage, b: &GrayImage) -> GrayImage {
    let (width, height) = a.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let blended = (a.get_pixel(x, y)[0] as u16 + b.get_pixel(x, y)[0] as u16) / 2;
        Luma([if blended > 0 { 255 } else { 0 }])
    })
}
