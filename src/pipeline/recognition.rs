//! Digit recognition and recombination for question groups.
//!
//! For every group the recognizer pools the digit crops of all member tokens,
//! decides where one answer ends and the next begins, asks the classifier for
//! each digit, and either commits the recombined answer string or reports why
//! the question failed. A question never yields a partial answer.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::constants::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::core::{DigitClassifier, DigitPrediction, SheetError};
use crate::domain::{AnswerKey, FailureReason, QuestionId};
use crate::pipeline::grouping::{GroupMember, PageLayout, QuestionGroup, assign_sub_questions};
use crate::pipeline::key::TokenKey;
use crate::pipeline::key_generator::KeyedTokens;
use crate::processors::{DigitSegmenter, Point};

/// Tuning for [`RecognitionGrouper`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Top-ranked predictions below this confidence are unresolved.
    pub confidence_threshold: f32,
    /// Inserted between the answers of a multi-answer question.
    pub answer_separator: String,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            answer_separator: String::new(),
        }
    }
}

impl RecognitionConfig {
    /// Rejects a confidence threshold outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), SheetError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(SheetError::config_error_with_context(
                "recognition.confidence_threshold",
                &self.confidence_threshold.to_string(),
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Chooses where to split a run of digits into `answer_count` answers.
///
/// `centers` are digit centers in reading order. Returns the indices `i`
/// after which a split falls, ascending. The `answer_count - 1` widest gaps
/// between consecutive centers win; on equal gaps the earlier one does.
pub fn select_split_points(centers: &[Point], answer_count: usize) -> Vec<usize> {
    if answer_count <= 1 || centers.len() < 2 {
        return Vec::new();
    }
    let mut gaps: Vec<(usize, f32)> = centers
        .windows(2)
        .enumerate()
        .map(|(i, pair)| (i, pair[0].distance(&pair[1])))
        .collect();
    gaps.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut splits: Vec<usize> = gaps
        .into_iter()
        .take(answer_count - 1)
        .map(|(i, _)| i)
        .collect();
    splits.sort_unstable();
    splits
}

/// One classified digit.
#[derive(Debug, Clone, PartialEq)]
pub struct DigitReading {
    /// Recognized digit, `None` when unresolved.
    pub digit: Option<char>,
    /// Top-ranked confidence, `0.0` when the classifier gave nothing.
    pub confidence: f32,
}

/// Partitions `readings` at `splits` and joins each part into a string.
///
/// Returns `None` if any digit is unresolved.
pub fn recombine(readings: &[DigitReading], splits: &[usize]) -> Option<Vec<String>> {
    let mut groups = Vec::with_capacity(splits.len() + 1);
    let mut current = String::new();
    for (i, reading) in readings.iter().enumerate() {
        current.push(reading.digit?);
        if splits.contains(&i) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    Some(groups)
}

/// Terminal state of one question group.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionOutcome {
    /// The question was recognized.
    Recognized {
        /// Recombined answer string.
        answer: String,
        /// Mean digit confidence.
        confidence: f32,
    },
    /// The question failed.
    Failed {
        /// Why.
        reason: FailureReason,
    },
}

/// A group together with its outcome.
#[derive(Debug, Clone)]
pub struct GroupResult<'a> {
    /// The group.
    pub group: QuestionGroup<'a>,
    /// Expected number of answers.
    pub answer_count: usize,
    /// Digit crops sent to the classifier.
    pub digits: usize,
    /// What happened.
    pub outcome: QuestionOutcome,
}

impl GroupResult<'_> {
    /// The slot of the group.
    pub fn question(&self) -> QuestionId {
        self.group.question
    }
}

/// Everything recognition produced for one page.
#[derive(Debug, Clone)]
pub struct RecognitionReport<'a> {
    /// Layout used for sub-question assignment.
    pub layout: PageLayout,
    /// Results in `(major, minor)` order.
    pub results: Vec<GroupResult<'a>>,
    /// Keys of tokens that matched no question.
    pub unmatched_keys: Vec<String>,
}

/// Groups keyed tokens into questions and recognizes each one.
pub struct RecognitionGrouper<'a> {
    classifier: &'a dyn DigitClassifier,
    segmenter: &'a DigitSegmenter,
    config: &'a RecognitionConfig,
}

impl<'a> RecognitionGrouper<'a> {
    /// Creates a recognizer.
    pub fn new(
        classifier: &'a dyn DigitClassifier,
        segmenter: &'a DigitSegmenter,
        config: &'a RecognitionConfig,
    ) -> Self {
        Self {
            classifier,
            segmenter,
            config,
        }
    }

    /// Recognizes every matched token group of a page.
    ///
    /// Keys that fail to parse are logged and skipped.
    pub fn recognize<'t>(&self, keyed: &'t KeyedTokens, answer_key: &AnswerKey) -> RecognitionReport<'t> {
        let mut members = Vec::with_capacity(keyed.len());
        let mut unmatched_keys = Vec::new();
        for (key_text, token) in keyed.iter() {
            let key: TokenKey = match key_text.parse() {
                Ok(key) => key,
                Err(e) => {
                    warn!("skipping token: {e}");
                    continue;
                }
            };
            if !key.is_matched() {
                unmatched_keys.push(key_text.to_string());
                continue;
            }
            members.push(GroupMember {
                key,
                key_text,
                token,
            });
        }

        let layout = PageLayout::detect(answer_key, members.iter().map(|m| &m.key));
        let groups = assign_sub_questions(members, layout, answer_key);

        let results = groups
            .into_iter()
            .map(|group| {
                let answer_count = group.answer_count(answer_key);
                let (digits, outcome) = self.recognize_group(&group, answer_count);
                match &outcome {
                    QuestionOutcome::Recognized { answer, confidence } => {
                        debug!(question = %group.question, %answer, confidence, "recognized");
                    }
                    QuestionOutcome::Failed { reason } => {
                        info!(question = %group.question, %reason, digits, "question failed");
                    }
                }
                GroupResult {
                    group,
                    answer_count,
                    digits,
                    outcome,
                }
            })
            .collect();

        RecognitionReport {
            layout,
            results,
            unmatched_keys,
        }
    }

    /// Recognizes one group. Returns the digit count and the outcome.
    pub fn recognize_group(&self, group: &QuestionGroup<'_>, answer_count: usize) -> (usize, QuestionOutcome) {
        let mut crops = Vec::new();
        for member in &group.members {
            let origin = member.token.raster_origin;
            for crop in self.segmenter.segment(&member.token.raster) {
                let center = crop.center.offset(origin.x, origin.y);
                crops.push((center, crop.glyph));
            }
        }
        let digits = crops.len();
        if crops.is_empty() {
            return (digits, QuestionOutcome::Failed { reason: FailureReason::NoDigits });
        }
        if crops.len() < answer_count {
            return (
                digits,
                QuestionOutcome::Failed {
                    reason: FailureReason::InsufficientDigits,
                },
            );
        }

        crops.sort_by(|a, b| a.0.x.total_cmp(&b.0.x));
        let centers: Vec<Point> = crops.iter().map(|(c, _)| *c).collect();
        let splits = select_split_points(&centers, answer_count);

        let mut readings = Vec::with_capacity(crops.len());
        for (_, glyph) in &crops {
            match self.classifier.classify(glyph) {
                Ok(predictions) => readings.push(self.read(predictions.first())),
                Err(e) => {
                    warn!(question = %group.question, "classifier error: {e}");
                    return (
                        digits,
                        QuestionOutcome::Failed {
                            reason: FailureReason::ClassifierUnavailable,
                        },
                    );
                }
            }
        }

        match recombine(&readings, &splits) {
            Some(answers) => {
                let confidence =
                    readings.iter().map(|r| r.confidence).sum::<f32>() / readings.len() as f32;
                (
                    digits,
                    QuestionOutcome::Recognized {
                        answer: answers.join(&self.config.answer_separator),
                        confidence,
                    },
                )
            }
            None => (
                digits,
                QuestionOutcome::Failed {
                    reason: FailureReason::LowConfidence,
                },
            ),
        }
    }

    fn read(&self, top: Option<&DigitPrediction>) -> DigitReading {
        let Some(top) = top else {
            return DigitReading {
                digit: None,
                confidence: 0.0,
            };
        };
        let mut chars = top.label.trim().chars();
        let digit = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_digit() => Some(c),
            _ => None,
        };
        let resolved = digit.filter(|_| top.confidence >= self.config.confidence_threshold);
        DigitReading {
            digit: resolved,
            confidence: top.confidence,
        }
    }
}
