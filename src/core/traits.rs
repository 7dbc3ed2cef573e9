//! Service seams for the external collaborators.
//!
//! The region detector and the digit classifier live outside this crate. The
//! pipeline receives them as trait objects, so a page worker never reaches for
//! a process-wide singleton. Both traits require `Send + Sync` because one
//! handle is shared read-only by every worker in a parallel batch.

use image::{GrayImage, RgbImage};

use crate::core::SheetError;
use crate::domain::DetectedRegion;

/// One ranked classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitPrediction {
    /// Predicted label, expected to be a single decimal digit.
    pub label: String,
    /// Confidence score in `[0, 1]`.
    pub confidence: f32,
}

impl DigitPrediction {
    /// Creates a new prediction.
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Locates the question-number and answer columns on a page.
pub trait RegionDetector: Send + Sync {
    /// Returns every region found on `page`, each with its bbox and crop.
    ///
    /// A well-behaved detector returns at most one region per class.
    fn detect(&self, page: &RgbImage, page_id: &str) -> Result<Vec<DetectedRegion>, SheetError>;
}

/// Labels a single-glyph raster with a digit.
pub trait DigitClassifier: Send + Sync {
    /// Returns predictions ranked by descending confidence.
    ///
    /// The pipeline only consults the first entry.
    fn classify(&self, glyph: &GrayImage) -> Result<Vec<DigitPrediction>, SheetError>;
}

impl<T: RegionDetector + ?Sized> RegionDetector for &T {
    fn detect(&self, page: &RgbImage, page_id: &str) -> Result<Vec<DetectedRegion>, SheetError> {
        (**self).detect(page, page_id)
    }
}

impl<T: DigitClassifier + ?Sized> DigitClassifier for &T {
    fn classify(&self, glyph: &GrayImage) -> Result<Vec<DigitPrediction>, SheetError> {
        (**self).classify(glyph)
    }
}

impl<T: RegionDetector + ?Sized> RegionDetector for std::sync::Arc<T> {
    fn detect(&self, page: &RgbImage, page_id: &str) -> Result<Vec<DetectedRegion>, SheetError> {
        (**self).detect(page, page_id)
    }
}

impl<T: DigitClassifier + ?Sized> DigitClassifier for std::sync::Arc<T> {
    fn classify(&self, glyph: &GrayImage) -> Result<Vec<DigitPrediction>, SheetError> {
        (**self).classify(glyph)
    }
}
