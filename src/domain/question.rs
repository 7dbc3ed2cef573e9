//! Question identifiers and the y-range table that maps bands to them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::SheetError;

/// Canonical question identifier, `"3"` or `"3-2"`.
///
/// Ordering is numeric on `(major, minor)` with a plain question sorting
/// before any of its sub-questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId {
    /// Major question number.
    pub major: u32,
    /// Sub-question number, `None` for a plain question.
    pub minor: Option<u32>,
}

impl QuestionId {
    /// A plain question without a sub-question.
    pub fn major(major: u32) -> Self {
        Self { major, minor: None }
    }

    /// A sub-question.
    pub fn sub(major: u32, minor: u32) -> Self {
        Self {
            major,
            minor: Some(minor),
        }
    }

    /// Builds an id from the answer-key convention where `0` means "no sub-question".
    pub fn from_key_numbers(question_number: u32, sub_question_number: u32) -> Self {
        if sub_question_number == 0 {
            Self::major(question_number)
        } else {
            Self::sub(question_number, sub_question_number)
        }
    }

    /// Sub-question number in answer-key convention (`0` = none).
    pub fn sub_number(&self) -> u32 {
        self.minor.unwrap_or(0)
    }

    /// Whether the id carries a sub-question suffix.
    pub fn is_hyphenated(&self) -> bool {
        self.minor.is_some()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "{}-{}", self.major, minor),
            None => write!(f, "{}", self.major),
        }
    }
}

impl FromStr for QuestionId {
    type Err = SheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(SheetError::invalid_input(format!(
                    "question id '{s}' is not numeric"
                )));
            }
            part.parse::<u32>()
                .map_err(|e| SheetError::invalid_input(format!("question id '{s}': {e}")))
        };

        match s.split_once('-') {
            Some((major, minor)) => Ok(Self::sub(parse(major)?, parse(minor)?)),
            None => Ok(Self::major(parse(s)?)),
        }
    }
}

/// One entry of the question table: a y-range of the question-number column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRange {
    /// Question the range belongs to.
    pub question_id: QuestionId,
    /// Top of the range, inclusive.
    pub y_top: u32,
    /// Bottom of the range, inclusive.
    pub y_bottom: u32,
}

impl QuestionRange {
    /// Whether `y` lies inside `[y_top, y_bottom]`.
    pub fn contains(&self, y: f32) -> bool {
        y >= self.y_top as f32 && y <= self.y_bottom as f32
    }
}

/// Ordered, non-overlapping y-ranges produced by question mapping.
///
/// An empty table means mapping failed; every lookup then misses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionTable {
    ranges: Vec<QuestionRange>,
}

impl QuestionTable {
    /// Builds a table from ranges sorted by `y_top`.
    pub fn new(ranges: Vec<QuestionRange>) -> Self {
        Self { ranges }
    }

    /// The table of a failed mapping.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the question whose range contains `y`, earliest range first.
    pub fn lookup(&self, y: f32) -> Option<QuestionId> {
        self.ranges
            .iter()
            .find(|range| range.contains(y))
            .map(|range| range.question_id)
    }

    /// Shifts every range by `dy` pixels, saturating at zero.
    pub fn shifted(&self, dy: i64) -> Self {
        let shift = |v: u32| (v as i64 + dy).max(0) as u32;
        Self {
            ranges: self
                .ranges
                .iter()
                .map(|r| QuestionRange {
                    question_id: r.question_id,
                    y_top: shift(r.y_top),
                    y_bottom: shift(r.y_bottom),
                })
                .collect(),
        }
    }

    /// The ranges in ascending y order.
    pub fn ranges(&self) -> &[QuestionRange] {
        &self.ranges
    }

    /// Number of ranges.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether mapping produced no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_id_display_and_parse() {
        assert_eq!(QuestionId::major(7).to_string(), "7");
        assert_eq!(QuestionId::sub(3, 2).to_string(), "3-2");
        assert_eq!("12".parse::<QuestionId>().unwrap(), QuestionId::major(12));
        assert_eq!("3-2".parse::<QuestionId>().unwrap(), QuestionId::sub(3, 2));
        assert!("3-".parse::<QuestionId>().is_err());
        assert!("a".parse::<QuestionId>().is_err());
        assert!("+3".parse::<QuestionId>().is_err());
    }

    #[test]
    fn test_question_id_orders_numerically() {
        let mut ids = vec![
            QuestionId::major(10),
            QuestionId::sub(2, 10),
            QuestionId::sub(2, 9),
            QuestionId::major(2),
            QuestionId::major(1),
        ];
        ids.sort();
        let rendered: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        assert_eq!(rendered, vec!["1", "2", "2-9", "2-10", "10"]);
    }

    #[test]
    fn test_table_lookup_is_inclusive() {
        let table = QuestionTable::new(vec![
            QuestionRange {
                question_id: QuestionId::major(1),
                y_top: 0,
                y_bottom: 50,
            },
            QuestionRange {
                question_id: QuestionId::major(2),
                y_top: 50,
                y_bottom: 100,
            },
        ]);
        assert_eq!(table.lookup(50.0), Some(QuestionId::major(1)));
        assert_eq!(table.lookup(75.5), Some(QuestionId::major(2)));
        assert_eq!(table.lookup(100.5), None);
        assert_eq!(QuestionTable::empty().lookup(10.0), None);
    }

    #[test]
    fn test_shifted_table_saturates() {
        let table = QuestionTable::new(vec![QuestionRange {
            question_id: QuestionId::major(1),
            y_top: 10,
            y_bottom: 40,
        }]);
        let shifted = table.shifted(-20);
        assert_eq!(shifted.ranges()[0].y_top, 0);
        assert_eq!(shifted.ranges()[0].y_bottom, 20);
    }
}
