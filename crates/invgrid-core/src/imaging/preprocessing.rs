//! Image normalization: grayscale, smoothing, binarization.

use image::imageops::invert;
use image::{DynamicImage, GenericImageView, GrayImage};
use imageproc::contrast::{ThresholdType, adaptive_threshold, otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::error::DecodeError;
use crate::models::config::{Binarization, ImagingConfig};

/// Images whose intensity range is below this carry no structure.
const MIN_CONTRAST: u8 = 16;

/// Output of the normalizer. Each stage is a new image.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Single-channel luma of the input.
    pub gray: GrayImage,
    /// Gray after noise reduction.
    pub smoothed: GrayImage,
    /// Ink pixels are 255, background is 0.
    pub binary: GrayImage,
}

impl NormalizedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.gray.dimensions()
    }
}

/// Decode raw bytes into an image.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let image = image::load_from_memory(bytes)?;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(DecodeError::Empty { width, height });
    }
    debug!("Decoded image: {}x{} {:?}", width, height, image.color());
    Ok(image)
}

/// Image normalizer for the structuring pipeline.
pub struct ImageNormalizer {
    /// Gaussian sigma, disabled when <= 0.
    blur_sigma: f32,
    /// Binarization mode.
    binarization: Binarization,
}

impl ImageNormalizer {
    /// Create a normalizer with default settings.
    pub fn new() -> Self {
        Self::from_config(&ImagingConfig::default())
    }

    pub fn from_config(config: &ImagingConfig) -> Self {
        Self {
            blur_sigma: config.blur_sigma,
            binarization: config.binarization,
        }
    }

    /// Set blur sigma.
    pub fn with_blur_sigma(mut self, sigma: f32) -> Self {
        self.blur_sigma = sigma;
        self
    }

    /// Set binarization mode.
    pub fn with_binarization(mut self, binarization: Binarization) -> Self {
        self.binarization = binarization;
        self
    }

    /// Run grayscale conversion, smoothing and binarization.
    pub fn normalize(&self, image: &DynamicImage) -> NormalizedImage {
        let gray = image.to_luma8();
        let smoothed = self.smooth(&gray);
        let binary = self.binarize(&smoothed);

        NormalizedImage {
            gray,
            smoothed,
            binary,
        }
    }

    /// Suppress sensor and compression noise.
    pub fn smooth(&self, gray: &GrayImage) -> GrayImage {
        if self.blur_sigma > 0.0 {
            gaussian_blur_f32(gray, self.blur_sigma)
        } else {
            gray.clone()
        }
    }

    /// Binarize with ink as foreground.
    pub fn binarize(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();

        let (min, max) = gray
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
        if max.saturating_sub(min) < MIN_CONTRAST {
            debug!("Flat image (range {}..{}), no foreground", min, max);
            return GrayImage::new(width, height);
        }

        match self.binarization {
            Binarization::Otsu => {
                let level = otsu_level(gray);
                debug!("Otsu level: {}", level);
                threshold(gray, level, ThresholdType::BinaryInverted)
            }
            Binarization::Adaptive { block_radius } => {
                // Light pixels come out white; ink is the complement.
                let mut binary = adaptive_threshold(gray, block_radius.max(1));
                invert(&mut binary);
                binary
            }
        }
    }
}

impl Default for ImageNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
