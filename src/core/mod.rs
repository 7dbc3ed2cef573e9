//! The core module of the answer-sheet pipeline.
//!
//! This module contains the fundamental pieces shared by every stage:
//! - Constants behind the configuration defaults
//! - Error handling
//! - Traits for the external detector and classifier services
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod constants;
pub mod errors;
pub mod traits;

pub use constants::*;
pub use errors::{ProcessingStage, SheetError};
pub use traits::{DigitClassifier, DigitPrediction, RegionDetector};

/// Result alias used across the crate.
pub type SheetResult<T> = Result<T, SheetError>;

