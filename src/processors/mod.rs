//! Image processing for answer sheets.
//!
//! This module provides the raster algorithms the pipeline is built from.
//!
//! # Modules
//!
//! * `geometry` - Points and pixel rectangles
//! * `binarize` - CLAHE, Otsu thresholding and ink ratios
//! * `morphology` - Horizontal opening used to isolate ruling lines
//! * `contours` - External contour envelopes
//! * `line_segmenter` - Region to row bands
//! * `token_extractor` - Row band to glyph-cluster tokens
//! * `digit_segmenter` - Token to single-digit crops
//! * `clustering` - Deterministic 1-D k-means

pub mod binarize;
pub mod clustering;
pub mod contours;
pub mod digit_segmenter;
mod geometry;
pub mod line_segmenter;
pub mod morphology;
pub mod token_extractor;

pub use clustering::{Clustering, ClusteringError, cluster};
pub use digit_segmenter::{DigitCrop, DigitSegmenter, DigitSegmenterConfig};
pub use geometry::*;
pub use line_segmenter::{LineSegmenter, LineSegmenterConfig, merge_boundaries};
pub use token_extractor::{TextTokenExtractor, TokenExtractorConfig};
