//! The answer-sheet pipeline module.
//!
//! This module turns detected regions into an answer sheet: it maps printed
//! question rows onto the answer key, keys every answer token, groups tokens
//! into question slots, recognizes their digits, and collects evidence for the
//! questions that fail.

mod config;
pub mod evidence;
pub mod grouping;
pub mod key;
pub mod key_generator;
pub mod page;
pub mod question_mapper;
pub mod recognition;
pub mod stats;

// Re-export the main pipeline components for easier access
pub use config::{ConfigFormat, ConfigLoader, PipelineConfig};
pub use evidence::{EvidenceConfig, FailureCollector};
pub use grouping::{GroupMember, PageLayout, QuestionGroup, assign_sub_questions};
pub use key::TokenKey;
pub use key_generator::{KeyGenerator, KeyedTokens};
pub use page::{SheetPipeline, SheetPipelineBuilder};
pub use question_mapper::{CanonicalList, MappingPolicy, QuestionIndexMapper};
pub use recognition::{
    DigitReading, GroupResult, QuestionOutcome, RecognitionConfig, RecognitionGrouper,
    RecognitionReport, recombine, select_split_points,
};
pub use stats::{BatchSummary, PageStats};
