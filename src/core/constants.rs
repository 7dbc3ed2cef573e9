//! Constants used throughout the answer-sheet pipeline.
//!
//! These are the default values behind the configuration structs. Every one of
//! them can be overridden through [`crate::pipeline::PipelineConfig`].

/// Question id assigned to tokens whose y-center falls outside every question range.
pub const UNKNOWN_QUESTION_ID: &str = "unknownQN";

/// Consecutive line boundaries closer than this (in pixels) are merged.
pub const DEFAULT_BOUNDARY_MERGE_DISTANCE: u32 = 25;

/// Minimum vertical span (in pixels) between two boundaries for a band to be kept.
pub const DEFAULT_MIN_BAND_SPAN: u32 = 15;

/// Lower bound for the width of the horizontal opening kernel.
pub const DEFAULT_MIN_KERNEL_WIDTH: u32 = 15;

/// Maximum height (in pixels) of a separator-line candidate.
pub const DEFAULT_MAX_SEPARATOR_HEIGHT: u32 = 20;

/// Merge distance between token x-centers, in pixels.
pub const DEFAULT_TOKEN_MERGE_DISTANCE: f32 = 100.0;

/// Padding added around each merged token box before squaring.
pub const DEFAULT_TOKEN_PADDING: u32 = 5;

/// Minimum width and height of a digit contour.
pub const DEFAULT_MIN_DIGIT_SIDE: u32 = 5;

/// Digit contours shorter than this fraction of the tallest one are dropped.
pub const DEFAULT_DIGIT_HEIGHT_RATIO: f32 = 0.6;

/// Classifier confidence below which a digit is unresolved.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.85;

/// Minimum number of pages before batch processing goes parallel.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// Maximum number of Lloyd iterations for sub-question clustering.
pub const DEFAULT_KMEANS_MAX_ITERATIONS: usize = 100;

/// Pixel value used for the white canvas behind tokens and evidence images.
pub const WHITE: u8 = 255;
