//! The exam answer key and the canonical question lists derived from it.
//!
//! The key is validated once, before any page is processed. A key that fails
//! validation never reaches the pipeline.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::SheetError;
use crate::domain::QuestionId;

/// One row of the answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyEntry {
    /// Major question number.
    pub question_number: u32,
    /// Sub-question number, `0` when the question has none.
    #[serde(default)]
    pub sub_question_number: u32,
    /// Number of separate answers expected in this slot.
    pub answer_count: u32,
    /// Score awarded for the slot.
    #[serde(default)]
    pub point: f32,
}

impl AnswerKeyEntry {
    /// Creates a new entry.
    pub fn new(question_number: u32, sub_question_number: u32, answer_count: u32, point: f32) -> Self {
        Self {
            question_number,
            sub_question_number,
            answer_count,
            point,
        }
    }

    /// The canonical id of this entry.
    pub fn question_id(&self) -> QuestionId {
        QuestionId::from_key_numbers(self.question_number, self.sub_question_number)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerKeyPayload {
    Wrapped { questions: Vec<AnswerKeyEntry> },
    Bare(Vec<AnswerKeyEntry>),
}

/// A validated answer key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerKey {
    questions: Vec<AnswerKeyEntry>,
}

impl AnswerKey {
    /// Parses and validates an answer key from JSON.
    ///
    /// Accepts either `{"questions": [...]}` or a bare array of entries.
    /// Unknown fields on an entry (question text, reference answer) are ignored.
    pub fn from_json(json: &str) -> Result<Self, SheetError> {
        let payload: AnswerKeyPayload = serde_json::from_str(json)
            .map_err(|e| SheetError::invalid_answer_key(format!("unreadable payload: {e}")))?;
        let questions = match payload {
            AnswerKeyPayload::Wrapped { questions } => questions,
            AnswerKeyPayload::Bare(questions) => questions,
        };
        Self::from_entries(questions)
    }

    /// Reads and validates an answer key from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, SheetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validates a list of entries, keeping their order.
    pub fn from_entries(questions: Vec<AnswerKeyEntry>) -> Result<Self, SheetError> {
        if questions.is_empty() {
            return Err(SheetError::invalid_answer_key("the key has no questions"));
        }

        let mut seen = HashSet::new();
        let mut plain = HashSet::new();
        let mut with_subs = HashSet::new();
        for entry in &questions {
            let id = entry.question_id();
            if entry.answer_count == 0 {
                return Err(SheetError::invalid_answer_key(format!(
                    "question {id} has answer_count 0"
                )));
            }
            if !entry.point.is_finite() || entry.point < 0.0 {
                return Err(SheetError::invalid_answer_key(format!(
                    "question {id} has invalid point {}",
                    entry.point
                )));
            }
            if !seen.insert(id) {
                return Err(SheetError::invalid_answer_key(format!(
                    "question {id} appears more than once"
                )));
            }
            if id.is_hyphenated() {
                with_subs.insert(id.major);
            } else {
                plain.insert(id.major);
            }
        }

        if let Some(major) = plain.intersection(&with_subs).min() {
            return Err(SheetError::invalid_answer_key(format!(
                "question {major} mixes a plain entry with sub-question entries"
            )));
        }

        Ok(Self { questions })
    }

    /// Entries in key order.
    pub fn entries(&self) -> &[AnswerKeyEntry] {
        &self.questions
    }

    /// Every id including sub-question suffixes, numerically sorted.
    pub fn list_a(&self) -> Vec<QuestionId> {
        let mut ids: Vec<QuestionId> = self.questions.iter().map(|e| e.question_id()).collect();
        ids.sort();
        ids
    }

    /// Major ids only, deduplicated and numerically sorted.
    pub fn list_b(&self) -> Vec<QuestionId> {
        let mut majors: Vec<u32> = self.questions.iter().map(|e| e.question_number).collect();
        majors.sort_unstable();
        majors.dedup();
        majors.into_iter().map(QuestionId::major).collect()
    }

    /// Number of key entries per major question.
    pub fn tail_question_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.questions {
            *counts.entry(entry.question_number).or_insert(0) += 1;
        }
        counts
    }

    /// Tail count for one major question, `0` if the key does not list it.
    pub fn tail_count(&self, major: u32) -> usize {
        self.questions
            .iter()
            .filter(|e| e.question_number == major)
            .count()
    }

    /// Whether every major question has exactly one entry.
    pub fn is_uniform(&self) -> bool {
        self.tail_question_counts().values().all(|&count| count == 1)
    }

    /// Expected answer count for an exact id, if the key lists it.
    pub fn answer_count(&self, id: &QuestionId) -> Option<u32> {
        self.entry(id).map(|e| e.answer_count)
    }

    /// Looks up the entry for an exact id.
    pub fn entry(&self, id: &QuestionId) -> Option<&AnswerKeyEntry> {
        self.questions.iter().find(|e| e.question_id() == *id)
    }

    /// Looks up the slot a recognized group belongs to.
    ///
    /// An exact id wins. A plain id also resolves to the only entry of its
    /// major, which covers keys that list a lone sub-question such as `5-1`.
    pub fn resolve(&self, id: &QuestionId) -> Option<&AnswerKeyEntry> {
        if let Some(entry) = self.entry(id) {
            return Some(entry);
        }
        if id.minor.is_none() {
            let mut of_major = self.questions.iter().filter(|e| e.question_number == id.major);
            if let (Some(only), None) = (of_major.next(), of_major.next()) {
                return Some(only);
            }
        }
        None
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always false for a validated key.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
