//! Records produced by one page pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{AnswerKeyEntry, RegionClass};
use crate::pipeline::stats::PageStats;

/// One slot of the answer sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedAnswer {
    /// Major question number.
    pub question_number: u32,
    /// Sub-question number, `0` when none.
    pub sub_question_number: u32,
    /// Recognized answer, `None` when the slot was not resolved.
    pub student_answer: Option<String>,
    /// Mean digit confidence, `0.0` for an unresolved slot.
    pub confidence: f32,
    /// Expected number of answers in the slot.
    pub answer_count: u32,
    /// Score awarded for the slot.
    pub point: f32,
}

impl RecognizedAnswer {
    /// An unresolved slot for a key entry.
    pub fn pending(entry: &AnswerKeyEntry) -> Self {
        Self {
            question_number: entry.question_number,
            sub_question_number: entry.sub_question_number,
            student_answer: None,
            confidence: 0.0,
            answer_count: entry.answer_count,
            point: entry.point,
        }
    }

    /// Whether recognition filled the slot.
    pub fn is_resolved(&self) -> bool {
        self.student_answer.is_some()
    }
}

/// Why a question could not be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// At least one digit scored below the confidence threshold or was not a digit.
    LowConfidence,
    /// No digit crop survived segmentation.
    NoDigits,
    /// Fewer digit crops than expected answers.
    InsufficientDigits,
    /// The classifier returned an error.
    ClassifierUnavailable,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::LowConfidence => write!(f, "low confidence"),
            FailureReason::NoDigits => write!(f, "no digits"),
            FailureReason::InsufficientDigits => write!(f, "insufficient digits"),
            FailureReason::ClassifierUnavailable => write!(f, "classifier unavailable"),
        }
    }
}

/// Image encoding used for failure evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceFormat {
    /// Lossless PNG.
    #[default]
    Png,
    /// JPEG.
    Jpeg,
}

impl EvidenceFormat {
    /// MIME type of the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            EvidenceFormat::Png => "image/png",
            EvidenceFormat::Jpeg => "image/jpeg",
        }
    }
}

/// An encoded evidence image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceImage {
    /// Encoding of `data`.
    pub format: EvidenceFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Base64 (standard alphabet) of the encoded bytes.
    pub data: String,
}

/// A question that could not be recognized, with the pixels a reviewer needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Student the page belongs to.
    pub student_id: String,
    /// Major question number.
    pub question_number: u32,
    /// Sub-question number, `0` when none.
    pub sub_question_number: u32,
    /// What went wrong.
    pub reason: FailureReason,
    /// Token rasters of the question concatenated left to right.
    pub evidence_image: EvidenceImage,
}

/// Why a page was abandoned before recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AbortReason {
    /// The detector did not return a required region.
    MissingRegion {
        /// The absent class.
        class: RegionClass,
    },
    /// The detector returned more than one region of a class.
    RegionContractViolation {
        /// The duplicated class.
        class: RegionClass,
        /// How many regions were returned.
        count: usize,
    },
    /// The detector could not be reached.
    DetectorUnavailable {
        /// Error reported by the detector.
        message: String,
    },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::MissingRegion { class } => write!(f, "missing {class} region"),
            AbortReason::RegionContractViolation { class, count } => {
                write!(f, "{count} {class} regions detected, expected one")
            }
            AbortReason::DetectorUnavailable { message } => {
                write!(f, "detector unavailable: {message}")
            }
        }
    }
}

/// Output of a completed page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Page identifier.
    pub page_id: String,
    /// Student the page belongs to.
    pub student_id: String,
    /// Exam subject.
    pub subject: String,
    /// One slot per answer-key entry, in key order.
    pub answers: Vec<RecognizedAnswer>,
    /// Questions that failed recognition.
    pub failures: Vec<FailureRecord>,
    /// Keys of tokens that matched no question.
    pub unmatched_keys: Vec<String>,
    /// Counters collected during the pass.
    pub stats: PageStats,
}

impl PageResult {
    /// Answers that recognition filled.
    pub fn resolved_answers(&self) -> impl Iterator<Item = &RecognizedAnswer> {
        self.answers.iter().filter(|a| a.is_resolved())
    }
}

/// Either a completed page or a page-level abort.
///
/// An abort carries no answers at all, which keeps it distinct from a page
/// whose every question failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum PageOutcome {
    /// Every question resolved to success or failure.
    Completed(PageResult),
    /// The page was abandoned before recognition.
    Aborted {
        /// Page identifier.
        page_id: String,
        /// Why.
        reason: AbortReason,
    },
}

impl PageOutcome {
    /// Page identifier for either variant.
    pub fn page_id(&self) -> &str {
        match self {
            PageOutcome::Completed(result) => &result.page_id,
            PageOutcome::Aborted { page_id, .. } => page_id,
        }
    }

    /// The result of a completed page.
    pub fn result(&self) -> Option<&PageResult> {
        match self {
            PageOutcome::Completed(result) => Some(result),
            PageOutcome::Aborted { .. } => None,
        }
    }

    /// Whether the page was abandoned.
    pub fn is_aborted(&self) -> bool {
        matches!(self, PageOutcome::Aborted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_slot_copies_key_entry() {
        let entry = AnswerKeyEntry::new(4, 2, 3, 2.5);
        let slot = RecognizedAnswer::pending(&entry);
        assert_eq!(slot.question_number, 4);
        assert_eq!(slot.sub_question_number, 2);
        assert_eq!(slot.answer_count, 3);
        assert!(!slot.is_resolved());
        assert_eq!(slot.confidence, 0.0);
    }

    #[test]
    fn test_abort_outcome_serializes_with_status_tag() {
        let outcome = PageOutcome::Aborted {
            page_id: "p1".to_string(),
            reason: AbortReason::MissingRegion {
                class: RegionClass::Answer,
            },
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["reason"]["kind"], "missing_region");
        assert_eq!(json["reason"]["class"], "answer");
        assert!(outcome.is_aborted());
        assert_eq!(outcome.page_id(), "p1");
    }

    #[test]
    fn test_abort_reason_display() {
        let reason = AbortReason::RegionContractViolation {
            class: RegionClass::QuestionNumber,
            count: 2,
        };
        assert_eq!(reason.to_string(), "2 question_number regions detected, expected one");
    }
}
