//! Splits a token raster into single-digit crops.

use image::{GrayImage, RgbImage, imageops};
use serde::{Deserialize, Serialize};

use crate::core::constants::{DEFAULT_DIGIT_HEIGHT_RATIO, DEFAULT_MIN_DIGIT_SIDE};
use crate::core::SheetError;
use crate::processors::binarize::otsu_inverted;
use crate::processors::contours::external_boxes;
use crate::processors::{PixelRect, Point};

/// Tuning for [`DigitSegmenter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitSegmenterConfig {
    /// Boxes narrower or shorter than this are dropped.
    pub min_side: u32,
    /// Boxes shorter than this fraction of the tallest box are dropped.
    pub height_ratio: f32,
}

impl Default for DigitSegmenterConfig {
    fn default() -> Self {
        Self {
            min_side: DEFAULT_MIN_DIGIT_SIDE,
            height_ratio: DEFAULT_DIGIT_HEIGHT_RATIO,
        }
    }
}

impl DigitSegmenterConfig {
    /// Rejects a height ratio outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), SheetError> {
        if !(0.0..=1.0).contains(&self.height_ratio) {
            return Err(SheetError::config_error_with_context(
                "digit_segmenter.height_ratio",
                &self.height_ratio.to_string(),
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// One digit-sized glyph cut from a token.
#[derive(Debug, Clone)]
pub struct DigitCrop {
    /// Envelope inside the token raster.
    pub bbox: PixelRect,
    /// Center of the envelope inside the token raster.
    pub center: Point,
    /// Grayscale pixels of the envelope.
    pub glyph: GrayImage,
}

/// Segments token rasters into digit crops.
#[derive(Debug, Clone, Default)]
pub struct DigitSegmenter {
    config: DigitSegmenterConfig,
}

impl DigitSegmenter {
    /// Creates a segmenter with the given configuration.
    pub fn new(config: DigitSegmenterConfig) -> Self {
        Self { config }
    }

    /// Digit crops of `token`, ordered by x-center.
    pub fn segment(&self, token: &RgbImage) -> Vec<DigitCrop> {
        if token.width() == 0 || token.height() == 0 {
            return Vec::new();
        }
        let gray = imageops::grayscale(token);
        let binary = otsu_inverted(&gray);

        let boxes: Vec<PixelRect> = external_boxes(&binary)
            .into_iter()
            .filter(|b| b.width >= self.config.min_side && b.height >= self.config.min_side)
            .collect();
        let Some(tallest) = boxes.iter().map(|b| b.height).max() else {
            return Vec::new();
        };
        let min_height = tallest as f32 * self.config.height_ratio;

        let mut crops: Vec<DigitCrop> = boxes
            .into_iter()
            .filter(|b| b.height as f32 >= min_height)
            .map(|bbox| DigitCrop {
                bbox,
                center: bbox.center(),
                glyph: imageops::crop_imm(&gray, bbox.x, bbox.y, bbox.width, bbox.height).to_image(),
            })
            .collect();
        crops.sort_by(|a, b| a.center.x.total_cmp(&b.center.x));
        crops
    }
}
