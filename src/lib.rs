//! # Answer Sheet OCR
//!
//! A Rust library that reads handwritten numeric answers from scanned exam
//! answer sheets and maps them onto the exam's answer key.
//!
//! ## Features
//!
//! - Row segmentation of the question-number and answer columns
//! - Reconciliation of printed question rows with the answer key
//! - Collision-free token keys with an exact, reversible grammar
//! - Sub-question recovery by layout, including 1-D k-means over row positions
//! - Multi-answer splitting at the widest digit gaps
//! - Failure evidence images for manual review
//! - Batch processing support
//!
//! The region detector and the digit classifier are external services. They
//! are plugged in through the [`core::RegionDetector`] and
//! [`core::DigitClassifier`] traits.
//!
//! ## Modules
//!
//! * [`core`] - Error handling, constants, and service traits
//! * [`domain`] - Answer key, question ids, regions, and page results
//! * [`processors`] - Raster algorithms: thresholding, morphology, segmentation, clustering
//! * [`pipeline`] - Question mapping, token keys, recognition, and page orchestration
//! * [`utils`] - Image loading, encoding, and logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use answer_sheet_ocr::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # struct MyDetector;
//! # impl RegionDetector for MyDetector {
//! #     fn detect(&self, _: &image::RgbImage, _: &str) -> Result<Vec<DetectedRegion>, SheetError> { Ok(vec![]) }
//! # }
//! # struct MyClassifier;
//! # impl DigitClassifier for MyClassifier {
//! #     fn classify(&self, _: &image::GrayImage) -> Result<Vec<DigitPrediction>, SheetError> { Ok(vec![]) }
//! # }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let answer_key = AnswerKey::from_file(Path::new("exam/answer_key.json"))?;
//! let pipeline = SheetPipeline::builder(answer_key)
//!     .detector(Arc::new(MyDetector))
//!     .classifier(Arc::new(MyClassifier))
//!     .build()?;
//!
//! let path = Path::new("scans/Math/20231234.png");
//! let page = load_image(path)?;
//! let context = PageContext::from_image_path(path)?;
//! match pipeline.process_page(&page, &context)? {
//!     PageOutcome::Completed(result) => {
//!         for answer in result.resolved_answers() {
//!             println!("{}-{}: {:?}", answer.question_number, answer.sub_question_number, answer.student_answer);
//!         }
//!     }
//!     PageOutcome::Aborted { reason, .. } => eprintln!("page aborted: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod domain;

pub mod pipeline;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use answer_sheet_ocr::prelude::*;
/// ```
///
/// Included items focus on the most common tasks:
/// - The pipeline and its configuration (`SheetPipeline`, `PipelineConfig`, `ConfigLoader`)
/// - Inputs (`AnswerKey`, `PageContext`, `DetectedRegion`)
/// - Results (`PageOutcome`, `PageResult`, `FailureRecord`)
/// - Service traits (`RegionDetector`, `DigitClassifier`)
/// - Essential error and result types (`SheetError`, `SheetResult`)
///
/// For individual stages, import directly from `answer_sheet_ocr::processors`
/// or `answer_sheet_ocr::pipeline`.
pub mod prelude {
    // Pipeline (essential)
    pub use crate::pipeline::{BatchSummary, ConfigLoader, PipelineConfig, SheetPipeline};

    // Inputs and results
    pub use crate::domain::{
        AbortReason, AnswerKey, AnswerKeyEntry, DetectedRegion, FailureReason, FailureRecord,
        PageContext, PageOutcome, PageResult, RecognizedAnswer, RegionClass,
    };

    // Services
    pub use crate::core::{DigitClassifier, DigitPrediction, RegionDetector};

    // Error Handling (essential)
    pub use crate::core::{SheetError, SheetResult};

    // Image Utility (minimal)
    pub use crate::utils::load_image;
}
