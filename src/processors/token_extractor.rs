//! Glyph-cluster extraction inside one row band.
//!
//! A handwritten answer is usually several disconnected strokes. The extractor
//! finds stroke envelopes, discards ruling residue and specks, merges strokes
//! that sit close together on the same row, and hands each cluster on as a
//! square, padded [`TextToken`].

use image::{GrayImage, Rgb, RgbImage, imageops};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::core::constants::{
    DEFAULT_MIN_BAND_SPAN, DEFAULT_TOKEN_MERGE_DISTANCE, DEFAULT_TOKEN_PADDING, WHITE,
};
use crate::core::SheetError;
use crate::domain::{LineBand, TextToken};
use crate::processors::binarize::{dark_pixel_ratio, otsu_inverted};
use crate::processors::contours::external_boxes;
use crate::processors::{PixelRect, Point};

/// Tuning for [`TextTokenExtractor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenExtractorConfig {
    /// Boxes wider than this fraction of the band are border artifacts.
    pub max_width_ratio: f32,
    /// Boxes narrower than this are noise.
    pub min_width: u32,
    /// Boxes shorter than this are noise.
    pub min_height: u32,
    /// Boxes with a larger width/height ratio are ruling residue.
    pub max_aspect_ratio: f32,
    /// Boxes with a smaller share of dark pixels are near-empty.
    pub min_ink_ratio: f32,
    /// Gray level below which a pixel counts as dark.
    pub ink_level: u8,
    /// Boxes whose x-centers are closer than this are merged.
    pub merge_distance: f32,
    /// Margin added around each merged box.
    pub padding: u32,
    /// Bands with a smaller unshrunk span produce no tokens.
    pub min_band_span: u32,
}

impl Default for TokenExtractorConfig {
    fn default() -> Self {
        Self {
            max_width_ratio: 0.95,
            min_width: 2,
            min_height: 10,
            max_aspect_ratio: 1.8,
            min_ink_ratio: 0.04,
            ink_level: 150,
            merge_distance: DEFAULT_TOKEN_MERGE_DISTANCE,
            padding: DEFAULT_TOKEN_PADDING,
            min_band_span: DEFAULT_MIN_BAND_SPAN,
        }
    }
}

impl TokenExtractorConfig {
    /// Rejects values that would make extraction meaningless.
    pub fn validate(&self) -> Result<(), SheetError> {
        if !(self.max_width_ratio > 0.0 && self.max_width_ratio <= 1.0) {
            return Err(SheetError::config_error_with_context(
                "token_extractor.max_width_ratio",
                &self.max_width_ratio.to_string(),
                "must be in (0, 1]",
            ));
        }
        if !(self.max_aspect_ratio > 0.0) {
            return Err(SheetError::config_error_with_context(
                "token_extractor.max_aspect_ratio",
                &self.max_aspect_ratio.to_string(),
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_ink_ratio) {
            return Err(SheetError::config_error_with_context(
                "token_extractor.min_ink_ratio",
                &self.min_ink_ratio.to_string(),
                "must be in [0, 1]",
            ));
        }
        if !(self.merge_distance >= 0.0) {
            return Err(SheetError::config_error_with_context(
                "token_extractor.merge_distance",
                &self.merge_distance.to_string(),
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// A merged glyph envelope before rasterization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergedBox {
    /// Union envelope.
    pub rect: PixelRect,
    /// Number of contour boxes folded into it.
    pub merge_count: usize,
}

/// Merges boxes left to right by x-center proximity and vertical overlap.
///
/// `boxes` is sorted by x-center first. Each box is folded into the current
/// cluster when the cluster's center is within `distance` and their vertical
/// extents overlap; otherwise it starts a new cluster.
pub fn merge_boxes(boxes: &[PixelRect], distance: f32) -> Vec<MergedBox> {
    let mut sorted = boxes.to_vec();
    sorted.sort_by(|a, b| a.center().x.total_cmp(&b.center().x));

    let mut merged: Vec<MergedBox> = Vec::with_capacity(sorted.len());
    for rect in sorted {
        match merged.last_mut() {
            Some(current)
                if (current.rect.center().x - rect.center().x).abs() < distance
                    && current.rect.overlaps_vertically(&rect) =>
            {
                current.rect = current.rect.union(&rect);
                current.merge_count += 1;
            }
            _ => merged.push(MergedBox {
                rect,
                merge_count: 1,
            }),
        }
    }
    merged
}

/// Pastes `crop` centered on a white square canvas whose side is its longer edge.
///
/// Returns the canvas and the paste offset.
pub fn square_on_white(crop: &RgbImage) -> (RgbImage, (u32, u32)) {
    let side = crop.width().max(crop.height());
    let mut canvas = RgbImage::from_pixel(side, side, Rgb([WHITE, WHITE, WHITE]));
    let dx = (side - crop.width()) / 2;
    let dy = (side - crop.height()) / 2;
    imageops::overlay(&mut canvas, crop, dx as i64, dy as i64);
    (canvas, (dx, dy))
}

/// Extracts glyph-cluster tokens from a band.
#[derive(Debug, Clone, Default)]
pub struct TextTokenExtractor {
    config: TokenExtractorConfig,
}

impl TextTokenExtractor {
    /// Creates an extractor with the given configuration.
    pub fn new(config: TokenExtractorConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &TokenExtractorConfig {
        &self.config
    }

    /// Envelopes that pass the artifact filters, in contour order.
    pub fn candidate_boxes(&self, gray: &GrayImage) -> Vec<PixelRect> {
        let cfg = &self.config;
        let band_width = gray.width() as f32;
        let binary = otsu_inverted(gray);

        external_boxes(&binary)
            .into_iter()
            .filter(|b| {
                if b.width as f32 > cfg.max_width_ratio * band_width {
                    trace!(?b, "rejected border artifact");
                    return false;
                }
                if b.width < cfg.min_width || b.height < cfg.min_height {
                    return false;
                }
                if b.aspect_ratio() > cfg.max_aspect_ratio {
                    trace!(?b, "rejected ruling residue");
                    return false;
                }
                dark_pixel_ratio(gray, b, cfg.ink_level) >= cfg.min_ink_ratio
            })
            .collect()
    }

    /// Extracts the tokens of `band`, ordered by x.
    pub fn extract(&self, band: &LineBand) -> Vec<TextToken> {
        let cfg = &self.config;
        if band.span() < cfg.min_band_span || band.raster.width() == 0 || band.raster.height() == 0 {
            return Vec::new();
        }

        let gray = imageops::grayscale(&band.raster);
        let candidates = self.candidate_boxes(&gray);
        let merged = merge_boxes(&candidates, cfg.merge_distance);
        let (band_w, band_h) = band.raster.dimensions();

        let mut tokens: Vec<TextToken> = merged
            .into_iter()
            .filter_map(|m| {
                let padded = m.rect.pad_and_clip(cfg.padding, band_w, band_h);
                if padded.is_empty() {
                    return None;
                }
                let crop = imageops::crop_imm(&band.raster, padded.x, padded.y, padded.width, padded.height)
                    .to_image();
                let (raster, (dx, dy)) = square_on_white(&crop);
                let raster_origin = Point::new(
                    band.raster_x as f32 + padded.x as f32 - dx as f32,
                    band.raster_y as f32 + padded.y as f32 - dy as f32,
                );
                Some(TextToken {
                    line_index: band.index,
                    bbox: m.rect,
                    band_origin: (band.raster_x, band.raster_y),
                    raster_origin,
                    raster,
                    merge_count: m.merge_count,
                })
            })
            .collect();
        tokens.sort_by_key(|t| (t.bbox.x, t.bbox.y));

        debug!(
            line = band.index,
            candidates = candidates.len(),
            tokens = tokens.len(),
            "extracted tokens"
        );
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band_with_strokes(width: u32, height: u32, strokes: &[PixelRect]) -> LineBand {
        let mut raster = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        for s in strokes {
            for y in s.y..s.bottom() {
                for x in s.x..s.right() {
                    raster.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        LineBand {
            index: 4,
            y_top: 200,
            y_bottom: 200 + height + 6,
            raster_x: 5,
            raster_y: 203,
            raster,
        }
    }

    #[test]
    fn test_merge_boxes_joins_close_overlapping_boxes() {
        let boxes = vec![
            PixelRect::new(200, 5, 10, 20),
            PixelRect::new(10, 5, 10, 20),
            PixelRect::new(40, 8, 10, 20),
            PixelRect::new(60, 60, 10, 20),
        ];
        let merged = merge_boxes(&boxes, 100.0);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].rect, PixelRect::new(10, 5, 40, 23));
        assert_eq!(merged[0].merge_count, 2);
        // Close in x but on another row.
        assert_eq!(merged[1].rect, PixelRect::new(60, 60, 10, 20));
        assert_eq!(merged[2].merge_count, 1);
    }

    #[test]
    fn test_square_on_white_centers_crop() {
        let crop = RgbImage::from_pixel(10, 4, Rgb([0, 0, 0]));
        let (canvas, (dx, dy)) = square_on_white(&crop);
        assert_eq!(canvas.dimensions(), (10, 10));
        assert_eq!((dx, dy), (0, 3));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(canvas.get_pixel(5, 5), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_extract_filters_and_orders_tokens() {
        let band = band_with_strokes(
            600,
            40,
            &[
                // Two digits far apart.
                PixelRect::new(300, 10, 8, 20),
                PixelRect::new(50, 10, 8, 20),
                // A flat dash that reads as ruling residue.
                PixelRect::new(450, 18, 40, 3),
                // A speck.
                PixelRect::new(520, 20, 2, 2),
            ],
        );
        let tokens = TextTokenExtractor::default().extract(&band);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].bbox.x, 50);
        assert_eq!(tokens[1].bbox.x, 300);
        for token in &tokens {
            assert_eq!(token.line_index, 4);
            assert_eq!(token.raster.width(), token.raster.height());
            assert_eq!(token.merge_count, 1);
        }
        // 8x20 box padded by 5 becomes 18x30, squared to 30.
        assert_eq!(tokens[0].raster.dimensions(), (30, 30));
        assert_eq!(tokens[0].raster_origin, Point::new(5.0 + 45.0 - 6.0, 203.0 + 5.0));
    }

    #[test]
    fn test_short_band_yields_no_tokens() {
        let mut band = band_with_strokes(100, 12, &[PixelRect::new(10, 1, 6, 10)]);
        band.y_top = 0;
        band.y_bottom = 14;
        assert!(TextTokenExtractor::default().extract(&band).is_empty());
    }

    #[test]
    fn test_blank_band_yields_no_tokens() {
        let band = band_with_strokes(200, 40, &[]);
        assert!(TextTokenExtractor::default().extract(&band).is_empty());
    }
}
