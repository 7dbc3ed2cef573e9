//! Page-level inputs and the intermediate raster units of one processing pass.
//!
//! Coordinates follow one convention throughout: a [`LineBand`] is expressed
//! in the coordinate space of the region it was cut from, and a [`TextToken`]
//! keeps both its box inside the band and the region-space offsets needed to
//! reconstruct absolute positions.

use std::fmt;
use std::path::Path;

use image::{RgbImage, imageops};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::SheetError;
use crate::processors::{PixelRect, Point};

static STUDENT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{8}").unwrap_or_else(|e| panic!("student id pattern is invalid: {e}"))
});

/// The two region classes reported by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionClass {
    /// The column of printed question numbers.
    QuestionNumber,
    /// The column of handwritten answers.
    Answer,
}

impl fmt::Display for RegionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionClass::QuestionNumber => write!(f, "question_number"),
            RegionClass::Answer => write!(f, "answer"),
        }
    }
}

/// A region located by the external detector.
#[derive(Debug, Clone)]
pub struct DetectedRegion {
    /// Bounding box in page coordinates.
    pub bbox: PixelRect,
    /// Which column this is.
    pub class: RegionClass,
    /// The cropped pixels.
    pub raster: RgbImage,
    /// Page the region was found on.
    pub page_id: String,
}

impl DetectedRegion {
    /// Creates a region from an already-cropped raster.
    pub fn new(bbox: PixelRect, class: RegionClass, raster: RgbImage, page_id: impl Into<String>) -> Self {
        Self {
            bbox,
            class,
            raster,
            page_id: page_id.into(),
        }
    }

    /// Crops `bbox` out of `page`, clamping the box to the page bounds.
    ///
    /// Returns an error when the clamped box is empty.
    pub fn crop_from_page(
        page: &RgbImage,
        bbox: PixelRect,
        class: RegionClass,
        page_id: impl Into<String>,
    ) -> Result<Self, SheetError> {
        let clipped = bbox.clip(page.width(), page.height());
        if clipped.is_empty() {
            return Err(SheetError::invalid_input(format!(
                "{class} region {bbox:?} lies outside the {}x{} page",
                page.width(),
                page.height()
            )));
        }
        let raster =
            imageops::crop_imm(page, clipped.x, clipped.y, clipped.width, clipped.height).to_image();
        Ok(Self::new(clipped, class, raster, page_id))
    }
}

/// Identity of the sheet being processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    /// Stable identifier of the page, usually the file stem.
    pub page_id: String,
    /// Subject the exam belongs to.
    pub subject: String,
    /// Eight-digit student number.
    pub student_id: String,
}

impl PageContext {
    /// Creates a context from explicit values.
    pub fn new(
        page_id: impl Into<String>,
        subject: impl Into<String>,
        student_id: impl Into<String>,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            subject: subject.into(),
            student_id: student_id.into(),
        }
    }

    /// Derives the context from a scan path laid out as `<subject>/<...student id...>.<ext>`.
    ///
    /// The subject is the parent directory name and the student id is the
    /// first run of eight digits in the file stem.
    pub fn from_image_path(path: &Path) -> Result<Self, SheetError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SheetError::invalid_input(format!("{} has no file name", path.display())))?;
        let subject = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SheetError::invalid_input(format!("{} has no subject directory", path.display()))
            })?;
        let student_id = STUDENT_ID_PATTERN
            .find(stem)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| {
                SheetError::invalid_input(format!("no 8-digit student id in '{stem}'"))
            })?;

        Ok(Self::new(stem, subject, student_id))
    }
}

/// One horizontal row of a region.
#[derive(Debug, Clone)]
pub struct LineBand {
    /// Zero-based row index within the region.
    pub index: usize,
    /// Top of the unshrunk row, region coordinates.
    pub y_top: u32,
    /// Bottom of the unshrunk row, region coordinates.
    pub y_bottom: u32,
    /// Left edge of `raster` in region coordinates.
    pub raster_x: u32,
    /// Top edge of `raster` in region coordinates.
    pub raster_y: u32,
    /// The row pixels after the inward shrink.
    pub raster: RgbImage,
}

impl LineBand {
    /// Vertical span of the unshrunk row.
    pub fn span(&self) -> u32 {
        self.y_bottom.saturating_sub(self.y_top)
    }
}

/// One glyph cluster cut out of a band.
#[derive(Debug, Clone)]
pub struct TextToken {
    /// Index of the band the token came from.
    pub line_index: usize,
    /// Merged glyph envelope in band-raster coordinates.
    pub bbox: PixelRect,
    /// Region-space position of the band raster's top-left corner.
    pub band_origin: (u32, u32),
    /// Region-space position of the square raster's top-left corner.
    pub raster_origin: Point,
    /// Square white canvas holding the padded glyph cluster.
    pub raster: RgbImage,
    /// How many contour boxes were merged into this token.
    pub merge_count: usize,
}

impl TextToken {
    /// Left edge of the envelope inside the band.
    pub fn x_in_line(&self) -> u32 {
        self.bbox.x
    }

    /// Vertical center of the envelope inside the band.
    pub fn y_in_line(&self) -> f32 {
        self.bbox.center().y
    }

    /// Center of the envelope in region coordinates.
    pub fn center_in_region(&self) -> Point {
        Point::new(
            self.bbox.center().x + self.band_origin.0 as f32,
            self.y_in_line() + self.band_origin.1 as f32,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;

    #[test]
    fn test_page_context_from_path() {
        let path = PathBuf::from("/scans/Algebra/Algebra_32201234_p1.jpg");
        let ctx = PageContext::from_image_path(&path).unwrap();
        assert_eq!(ctx.subject, "Algebra");
        assert_eq!(ctx.student_id, "32201234");
        assert_eq!(ctx.page_id, "Algebra_32201234_p1");
    }

    #[test]
    fn test_page_context_requires_student_id() {
        let path = PathBuf::from("/scans/Algebra/scan_1234.png");
        assert!(PageContext::from_image_path(&path).is_err());
    }

    #[test]
    fn test_crop_from_page_clamps_to_page() {
        let page = RgbImage::from_pixel(100, 80, Rgb([255, 255, 255]));
        let region = DetectedRegion::crop_from_page(
            &page,
            PixelRect::new(60, 50, 100, 100),
            RegionClass::Answer,
            "p1",
        )
        .unwrap();
        assert_eq!(region.bbox, PixelRect::new(60, 50, 40, 30));
        assert_eq!(region.raster.dimensions(), (40, 30));

        let outside = DetectedRegion::crop_from_page(
            &page,
            PixelRect::new(200, 0, 10, 10),
            RegionClass::Answer,
            "p1",
        );
        assert!(outside.is_err());
    }

    #[test]
    fn test_token_center_in_region() {
        let token = TextToken {
            line_index: 2,
            bbox: PixelRect::new(10, 4, 20, 10),
            band_origin: (5, 100),
            raster_origin: Point::new(0.0, 0.0),
            raster: RgbImage::new(1, 1),
            merge_count: 1,
        };
        assert_eq!(token.center_in_region(), Point::new(25.0, 109.0));
        assert_eq!(token.x_in_line(), 10);
        assert_eq!(token.y_in_line(), 9.0);
    }
}
