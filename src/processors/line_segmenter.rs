//! Splits a region crop into horizontal row bands.
//!
//! Rows on an answer sheet are separated by printed ruling lines. The segmenter
//! isolates those lines with a wide horizontal opening, turns their top and
//! bottom edges into row boundaries, and cuts one [`LineBand`] per boundary pair.

use image::{RgbImage, imageops};
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants::{
    DEFAULT_BOUNDARY_MERGE_DISTANCE, DEFAULT_MAX_SEPARATOR_HEIGHT, DEFAULT_MIN_BAND_SPAN,
    DEFAULT_MIN_KERNEL_WIDTH,
};
use crate::core::SheetError;
use crate::domain::LineBand;
use crate::processors::binarize::{clahe, otsu_inverted};
use crate::processors::contours::external_boxes;
use crate::processors::morphology::open_horizontal;
use crate::processors::PixelRect;

/// Tuning for [`LineSegmenter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSegmenterConfig {
    /// CLAHE clip limit.
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size along each axis.
    pub clahe_grid: u32,
    /// Gaussian blur sigma applied before thresholding.
    pub blur_sigma: f32,
    /// Lower bound of the opening kernel width.
    pub min_kernel_width: u32,
    /// The kernel is at least `region_width / kernel_width_divisor` wide.
    pub kernel_width_divisor: u32,
    /// Separators must be at least `region_width / min_separator_width_divisor` wide.
    pub min_separator_width_divisor: u32,
    /// Separators may be at most this tall.
    pub max_separator_height: u32,
    /// Boundaries closer than this to the previous kept boundary are dropped.
    pub merge_distance: u32,
    /// Boundary pairs closer than this do not form a band.
    pub min_band_span: u32,
    /// Pixels trimmed from the top of every band raster.
    pub shrink_top: u32,
    /// Pixels trimmed from the bottom of every band raster.
    pub shrink_bottom: u32,
    /// Pixels trimmed from the left of every band raster.
    pub shrink_left: u32,
    /// Pixels trimmed from the right of every band raster.
    pub shrink_right: u32,
}

impl Default for LineSegmenterConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_grid: 8,
            blur_sigma: 1.1,
            min_kernel_width: DEFAULT_MIN_KERNEL_WIDTH,
            kernel_width_divisor: 3,
            min_separator_width_divisor: 6,
            max_separator_height: DEFAULT_MAX_SEPARATOR_HEIGHT,
            merge_distance: DEFAULT_BOUNDARY_MERGE_DISTANCE,
            min_band_span: DEFAULT_MIN_BAND_SPAN,
            shrink_top: 3,
            shrink_bottom: 3,
            shrink_left: 5,
            shrink_right: 15,
        }
    }
}

impl LineSegmenterConfig {
    /// Rejects values that would make segmentation meaningless.
    pub fn validate(&self) -> Result<(), SheetError> {
        if !(self.blur_sigma > 0.0) {
            return Err(SheetError::config_error_with_context(
                "line_segmenter.blur_sigma",
                &self.blur_sigma.to_string(),
                "must be positive",
            ));
        }
        if self.kernel_width_divisor == 0 {
            return Err(SheetError::config_error_with_context(
                "line_segmenter.kernel_width_divisor",
                "0",
                "must be positive",
            ));
        }
        if self.min_separator_width_divisor == 0 {
            return Err(SheetError::config_error_with_context(
                "line_segmenter.min_separator_width_divisor",
                "0",
                "must be positive",
            ));
        }
        if self.clahe_grid == 0 {
            return Err(SheetError::config_error_with_context(
                "line_segmenter.clahe_grid",
                "0",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Drops every boundary closer than `min_gap` to the last kept one.
///
/// The input is sorted and deduplicated first. The first boundary always
/// survives. Applying the function to its own output changes nothing.
pub fn merge_boundaries(boundaries: &[u32], min_gap: u32) -> Vec<u32> {
    let mut sorted = boundaries.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut merged: Vec<u32> = Vec::with_capacity(sorted.len());
    for value in sorted {
        match merged.last() {
            Some(&last) if value - last < min_gap => {}
            _ => merged.push(value),
        }
    }
    merged
}

/// Row segmentation of a region crop.
#[derive(Debug, Clone, Default)]
pub struct LineSegmenter {
    config: LineSegmenterConfig,
}

impl LineSegmenter {
    /// Creates a segmenter with the given configuration.
    pub fn new(config: LineSegmenterConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &LineSegmenterConfig {
        &self.config
    }

    /// Bounding boxes of the horizontal ruling lines in `region`.
    pub fn find_separators(&self, region: &RgbImage) -> Vec<PixelRect> {
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let cfg = &self.config;

        let gray = imageops::grayscale(region);
        let enhanced = clahe(&gray, cfg.clahe_clip_limit, cfg.clahe_grid);
        let blurred = gaussian_blur_f32(&enhanced, cfg.blur_sigma);
        let binary = otsu_inverted(&blurred);

        let kernel_width = cfg.min_kernel_width.max(width / cfg.kernel_width_divisor);
        let opened = open_horizontal(&binary, kernel_width);

        let min_width = width / cfg.min_separator_width_divisor;
        external_boxes(&opened)
            .into_iter()
            .filter(|b| b.width >= min_width && b.height <= cfg.max_separator_height)
            .collect()
    }

    /// Cuts `region` into row bands.
    ///
    /// Never fails: without separators the whole region is one band, and an
    /// empty region yields no bands.
    pub fn segment(&self, region: &RgbImage) -> Vec<LineBand> {
        let (width, height) = region.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let separators = self.find_separators(region);
        if separators.is_empty() {
            debug!(width, height, "no separators found, using the whole region as one band");
            return vec![self.cut_band(region, 0, 0, height)];
        }

        let mut boundaries = vec![0, height];
        for sep in &separators {
            boundaries.push(sep.y);
            boundaries.push(sep.bottom().min(height));
        }
        let merged = merge_boundaries(&boundaries, self.config.merge_distance);

        let bands: Vec<LineBand> = merged
            .windows(2)
            .filter(|pair| pair[1] - pair[0] >= self.config.min_band_span)
            .enumerate()
            .map(|(index, pair)| self.cut_band(region, index, pair[0], pair[1]))
            .collect();

        debug!(
            separators = separators.len(),
            boundaries = merged.len(),
            bands = bands.len(),
            "segmented region"
        );
        bands
    }

    fn cut_band(&self, region: &RgbImage, index: usize, y_top: u32, y_bottom: u32) -> LineBand {
        let cfg = &self.config;
        let width = region.width();

        let (mut y0, mut y1) = (y_top + cfg.shrink_top, y_bottom.saturating_sub(cfg.shrink_bottom));
        if y1 <= y0 {
            (y0, y1) = (y_top, y_bottom);
        }
        let (mut x0, mut x1) = (cfg.shrink_left, width.saturating_sub(cfg.shrink_right));
        if x1 <= x0 {
            (x0, x1) = (0, width);
        }

        let raster = imageops::crop_imm(region, x0, y0, x1 - x0, y1 - y0).to_image();
        LineBand {
            index,
            y_top,
            y_bottom,
            raster_x: x0,
            raster_y: y0,
            raster,
        }
    }
}
