//! Page and batch statistics.
//!
//! This module defines the `PageStats` counters collected during one page pass
//! and the `BatchSummary` that aggregates them over a batch of outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::PageOutcome;

/// Counters collected while processing one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStats {
    /// Bands found in the question-number region.
    pub question_bands: usize,
    /// Bands found in the answer region.
    pub answer_bands: usize,
    /// Tokens extracted from the answer region.
    pub tokens: usize,
    /// Tokens that matched no question.
    pub unmatched_tokens: usize,
    /// Keys that needed a dedup suffix.
    pub key_collisions: usize,
    /// Question groups formed.
    pub groups: usize,
    /// Digit crops sent to the classifier.
    pub digits: usize,
    /// Groups recognized successfully.
    pub recognized: usize,
    /// Groups that failed.
    pub failed: usize,
}

impl PageStats {
    /// Share of groups recognized, as a percentage (0.0 to 100.0).
    pub fn recognition_rate(&self) -> f64 {
        if self.groups == 0 {
            0.0
        } else {
            (self.recognized as f64 / self.groups as f64) * 100.0
        }
    }
}

/// Aggregated statistics over a batch of page outcomes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    /// Pages submitted.
    pub pages: usize,
    /// Pages that completed.
    pub completed: usize,
    /// Pages abandoned before recognition.
    pub aborted: usize,
    /// Sum of the per-page counters of completed pages.
    pub totals: PageStats,
}

impl BatchSummary {
    /// Summarizes a batch of outcomes.
    pub fn from_outcomes(outcomes: &[PageOutcome]) -> Self {
        let mut summary = Self {
            pages: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            match outcome.result() {
                Some(result) => {
                    summary.completed += 1;
                    let s = &result.stats;
                    let t = &mut summary.totals;
                    t.question_bands += s.question_bands;
                    t.answer_bands += s.answer_bands;
                    t.tokens += s.tokens;
                    t.unmatched_tokens += s.unmatched_tokens;
                    t.key_collisions += s.key_collisions;
                    t.groups += s.groups;
                    t.digits += s.digits;
                    t.recognized += s.recognized;
                    t.failed += s.failed;
                }
                None => summary.aborted += 1,
            }
        }
        summary
    }

    /// Share of pages that completed, as a percentage (0.0 to 100.0).
    pub fn completion_rate(&self) -> f64 {
        if self.pages == 0 {
            0.0
        } else {
            (self.completed as f64 / self.pages as f64) * 100.0
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch Summary:")?;
        writeln!(f, "  Pages: {}", self.pages)?;
        writeln!(
            f,
            "  Completed: {} ({:.1}%)",
            self.completed,
            self.completion_rate()
        )?;
        writeln!(f, "  Aborted: {}", self.aborted)?;
        writeln!(f, "  Tokens: {} ({} unmatched)", self.totals.tokens, self.totals.unmatched_tokens)?;
        writeln!(
            f,
            "  Questions recognized: {} ({:.1}%)",
            self.totals.recognized,
            self.totals.recognition_rate()
        )?;
        writeln!(f, "  Questions failed: {}", self.totals.failed)?;
        Ok(())
    }
}
