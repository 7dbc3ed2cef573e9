//! Reconciles question-number bands with the answer key.
//!
//! The question-number column usually has one band per printed question, but
//! sheets differ: some print every sub-question on its own row, some print only
//! majors, some add a header row, and segmentation occasionally loses a row.
//! The mapper compares the detected band count against both canonical lists of
//! the answer key and picks the first policy that fits.

use std::fmt;

use tracing::{debug, warn};

use crate::domain::{AnswerKey, LineBand, QuestionId, QuestionRange, QuestionTable};

/// Which canonical list a mapping used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalList {
    /// Every id, sub-questions included.
    Full,
    /// Major ids only.
    Majors,
}

impl fmt::Display for CanonicalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalList::Full => write!(f, "list-A"),
            CanonicalList::Majors => write!(f, "list-B"),
        }
    }
}

/// How detected bands are paired with a canonical list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingPolicy {
    /// One band per list entry.
    Exact(CanonicalList),
    /// One extra leading band, treated as a header and skipped.
    SkipHeader(CanonicalList),
    /// One band short; pairs as many as exist.
    Shortfall(CanonicalList),
    /// The band count fits neither list.
    Mismatch,
}

/// Maps question-number bands to canonical question ids.
#[derive(Debug, Clone)]
pub struct QuestionIndexMapper {
    list_a: Vec<QuestionId>,
    list_b: Vec<QuestionId>,
}

impl QuestionIndexMapper {
    /// Creates a mapper for the lists of `answer_key`.
    pub fn new(answer_key: &AnswerKey) -> Self {
        Self {
            list_a: answer_key.list_a(),
            list_b: answer_key.list_b(),
        }
    }

    /// Chooses the policy for `band_count` detected bands.
    pub fn policy(&self, band_count: usize) -> MappingPolicy {
        let (a, b) = (self.list_a.len(), self.list_b.len());
        let n = band_count;
        if n == a {
            MappingPolicy::Exact(CanonicalList::Full)
        } else if n == b {
            MappingPolicy::Exact(CanonicalList::Majors)
        } else if n == a + 1 {
            MappingPolicy::SkipHeader(CanonicalList::Full)
        } else if n == b + 1 {
            MappingPolicy::SkipHeader(CanonicalList::Majors)
        } else if n + 1 == a {
            MappingPolicy::Shortfall(CanonicalList::Full)
        } else if n + 1 == b {
            MappingPolicy::Shortfall(CanonicalList::Majors)
        } else {
            MappingPolicy::Mismatch
        }
    }

    /// Builds the y-range table for `bands`.
    ///
    /// Returns an empty table when the band count reconciles with neither list.
    pub fn map(&self, bands: &[LineBand]) -> QuestionTable {
        let policy = self.policy(bands.len());
        let (list, skip) = match policy {
            MappingPolicy::Exact(list) => (list, 0),
            MappingPolicy::SkipHeader(list) => (list, 1),
            MappingPolicy::Shortfall(list) => {
                warn!(
                    detected = bands.len(),
                    expected = self.ids(list).len(),
                    %list,
                    "question bands are one short, mapping the rows that exist"
                );
                (list, 0)
            }
            MappingPolicy::Mismatch => {
                warn!(
                    detected = bands.len(),
                    list_a = self.list_a.len(),
                    list_b = self.list_b.len(),
                    "question band count matches no canonical list"
                );
                return QuestionTable::empty();
            }
        };

        let ranges: Vec<QuestionRange> = bands[skip..]
            .iter()
            .zip(self.ids(list))
            .map(|(band, &question_id)| QuestionRange {
                question_id,
                y_top: band.y_top,
                y_bottom: band.y_bottom,
            })
            .collect();

        debug!(?policy, ranges = ranges.len(), "mapped question bands");
        QuestionTable::new(ranges)
    }

    fn ids(&self, list: CanonicalList) -> &[QuestionId] {
        match list {
            CanonicalList::Full => &self.list_a,
            CanonicalList::Majors => &self.list_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerKeyEntry;
    use image::RgbImage;

    /// Key with list-A = [1, 2-1, 2-2, 3] and list-B = [1, 2, 3].
    fn key() -> AnswerKey {
        AnswerKey::from_entries(vec![
            AnswerKeyEntry::new(1, 0, 1, 1.0),
            AnswerKeyEntry::new(2, 1, 1, 1.0),
            AnswerKeyEntry::new(2, 2, 1, 1.0),
            AnswerKeyEntry::new(3, 0, 1, 1.0),
        ])
        .unwrap()
    }

    fn bands(count: usize) -> Vec<LineBand> {
        (0..count)
            .map(|i| LineBand {
                index: i,
                y_top: i as u32 * 50,
                y_bottom: (i as u32 + 1) * 50,
                raster_x: 0,
                raster_y: 0,
                raster: RgbImage::new(1, 1),
            })
            .collect()
    }

    fn ids(table: &QuestionTable) -> Vec<String> {
        table
            .ranges()
            .iter()
            .map(|r| r.question_id.to_string())
            .collect()
    }

    #[test]
    fn test_policy_order() {
        let mapper = QuestionIndexMapper::new(&key());
        assert_eq!(mapper.policy(4), MappingPolicy::Exact(CanonicalList::Full));
        assert_eq!(mapper.policy(3), MappingPolicy::Exact(CanonicalList::Majors));
        assert_eq!(mapper.policy(5), MappingPolicy::SkipHeader(CanonicalList::Full));
        assert_eq!(mapper.policy(2), MappingPolicy::Shortfall(CanonicalList::Majors));
        assert_eq!(mapper.policy(7), MappingPolicy::Mismatch);
    }

    #[test]
    fn test_exact_full_mapping() {
        let table = QuestionIndexMapper::new(&key()).map(&bands(4));
        assert_eq!(ids(&table), vec!["1", "2-1", "2-2", "3"]);
        assert_eq!(table.ranges()[1].y_top, 50);
        assert_eq!(table.ranges()[1].y_bottom, 100);
    }

    #[test]
    fn test_header_band_is_skipped() {
        let table = QuestionIndexMapper::new(&key()).map(&bands(5));
        assert_eq!(ids(&table), vec!["1", "2-1", "2-2", "3"]);
        assert_eq!(table.ranges()[0].y_top, 50);
    }

    #[test]
    fn test_shortfall_maps_available_rows() {
        let table = QuestionIndexMapper::new(&key()).map(&bands(2));
        assert_eq!(ids(&table), vec!["1", "2"]);
    }

    #[test]
    fn test_mismatch_yields_empty_table() {
        let table = QuestionIndexMapper::new(&key()).map(&bands(9));
        assert!(table.is_empty());
    }
}
