//! Sub-question assignment.
//!
//! Once every token carries a question id, tokens are grouped into the
//! `(question, sub-question)` slots they answer. How a sub-question is found
//! depends on the sheet layout:
//!
//! ### Uniform
//! Every question in the answer key has exactly one entry. Tokens are grouped
//! by their question id as-is.
//!
//! ### Hyphenated
//! The question-number column prints sub-questions on their own rows, so the
//! ids already read `3-2`. Tokens are grouped by the full id.
//!
//! ### Clustered
//! Only majors are printed, and a major with `k` sub-questions spans `k`
//! answer rows. The tokens of such a major are clustered by their y-center
//! into `k` groups; clusters ordered top to bottom become sub-questions
//! `1..=k`. Tokens on a shared row stay together even when there are fewer
//! rows than sub-questions. When clustering cannot run, tokens fall back to
//! positional order.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{AnswerKey, QuestionId, TextToken};
use crate::pipeline::key::TokenKey;
use crate::processors::cluster;

/// Layout family of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLayout {
    /// One entry per question.
    Uniform,
    /// Question ids already carry sub-question suffixes.
    Hyphenated,
    /// Sub-questions must be recovered from token positions.
    Clustered,
}

impl PageLayout {
    /// Picks the layout from the answer key and the matched token keys.
    pub fn detect<'k>(answer_key: &AnswerKey, keys: impl IntoIterator<Item = &'k TokenKey>) -> Self {
        if answer_key.is_uniform() {
            return PageLayout::Uniform;
        }
        let hyphenated = keys
            .into_iter()
            .filter_map(|k| k.question)
            .any(|id| id.is_hyphenated());
        if hyphenated {
            PageLayout::Hyphenated
        } else {
            PageLayout::Clustered
        }
    }
}

/// A token together with its parsed key.
#[derive(Debug, Clone)]
pub struct GroupMember<'a> {
    /// Parsed key.
    pub key: TokenKey,
    /// Rendered key, as stored in the keyed map.
    pub key_text: &'a str,
    /// The token.
    pub token: &'a TextToken,
}

/// Tokens answering one `(question, sub-question)` slot.
#[derive(Debug, Clone)]
pub struct QuestionGroup<'a> {
    /// The slot.
    pub question: QuestionId,
    /// Members ordered by x.
    pub members: Vec<GroupMember<'a>>,
}

impl QuestionGroup<'_> {
    /// Expected number of answers for the group.
    ///
    /// The answer key wins; otherwise the count carried by the first key,
    /// and at least one.
    pub fn answer_count(&self, answer_key: &AnswerKey) -> usize {
        if let Some(entry) = answer_key.resolve(&self.question) {
            return entry.answer_count as usize;
        }
        self.members
            .first()
            .map(|m| m.key.answer_count as usize)
            .filter(|&ac| ac > 0)
            .unwrap_or(1)
    }
}

/// Groups matched tokens into question slots, sorted by `(major, minor)`.
///
/// Tokens without a question are skipped.
pub fn assign_sub_questions<'a>(
    members: Vec<GroupMember<'a>>,
    layout: PageLayout,
    answer_key: &AnswerKey,
) -> Vec<QuestionGroup<'a>> {
    let mut by_major: BTreeMap<u32, Vec<(QuestionId, GroupMember<'a>)>> = BTreeMap::new();
    for member in members {
        let Some(id) = member.key.question else {
            continue;
        };
        by_major.entry(id.major).or_default().push((id, member));
    }

    let mut slots: BTreeMap<QuestionId, Vec<GroupMember<'a>>> = BTreeMap::new();
    for (major, entries) in by_major {
        let tail = answer_key.tail_count(major);
        let needs_clustering = layout == PageLayout::Clustered
            && tail > 1
            && entries.iter().all(|(id, _)| id.minor.is_none());

        if needs_clustering {
            for (minor, member) in cluster_by_row(major, entries.into_iter().map(|(_, m)| m).collect(), tail) {
                slots.entry(QuestionId::sub(major, minor)).or_default().push(member);
            }
        } else {
            for (id, member) in entries {
                slots.entry(id).or_default().push(member);
            }
        }
    }

    let groups: Vec<QuestionGroup<'a>> = slots
        .into_iter()
        .map(|(question, mut members)| {
            members.sort_by_key(|m| (m.key.x, m.key.y, m.key.line));
            QuestionGroup { question, members }
        })
        .collect();
    debug!(?layout, groups = groups.len(), "assigned sub-questions");
    groups
}

/// Splits the tokens of one major into `k` sub-questions by y-center.
fn cluster_by_row<'a>(major: u32, mut members: Vec<GroupMember<'a>>, k: usize) -> Vec<(u32, GroupMember<'a>)> {
    members.sort_by_key(|m| (m.key.y, m.key.x, m.key.line));
    let ys: Vec<f32> = members.iter().map(|m| m.key.y as f32).collect();

    match cluster(&ys, k) {
        Ok(clustering) => {
            if clustering.centers.len() < k {
                warn!(major, k, rows = clustering.centers.len(), "fewer distinct rows than sub-questions");
            }
            members
                .into_iter()
                .zip(clustering.labels)
                .map(|(member, label)| (label as u32 + 1, member))
                .collect()
        }
        Err(e) => {
            warn!(major, k, tokens = ys.len(), "clustering failed, assigning sub-questions by position: {e}");
            members
                .into_iter()
                .enumerate()
                .map(|(i, member)| ((i + 1).min(k) as u32, member))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerKeyEntry;
    use crate::processors::{PixelRect, Point};
    use image::RgbImage;

    fn token() -> TextToken {
        TextToken {
            line_index: 0,
            bbox: PixelRect::new(0, 0, 1, 1),
            band_origin: (0, 0),
            raster_origin: Point::new(0.0, 0.0),
            raster: RgbImage::new(1, 1),
            merge_count: 1,
        }
    }

    fn member<'a>(token: &'a TextToken, question: Option<QuestionId>, x: u32, y: u32) -> GroupMember<'a> {
        GroupMember {
            key: TokenKey::new("math", "20231234", 0, x, y, question, 1).unwrap(),
            key_text: "",
            token,
        }
    }

    fn clustered_key() -> AnswerKey {
        AnswerKey::from_entries(vec![
            AnswerKeyEntry::new(1, 0, 1, 1.0),
            AnswerKeyEntry::new(2, 1, 1, 1.0),
            AnswerKeyEntry::new(2, 2, 1, 1.0),
            AnswerKeyEntry::new(2, 3, 1, 1.0),
        ])
        .unwrap()
    }

    fn slot_names(groups: &[QuestionGroup<'_>]) -> Vec<String> {
        groups.iter().map(|g| g.question.to_string()).collect()
    }

    #[test]
    fn test_detect_layout() {
        let t = token();
        let uniform = AnswerKey::from_entries(vec![AnswerKeyEntry::new(1, 0, 1, 1.0)]).unwrap();
        let plain = [member(&t, Some(QuestionId::major(2)), 0, 0).key];
        let hyphen = [member(&t, Some(QuestionId::sub(2, 1)), 0, 0).key];
        assert_eq!(PageLayout::detect(&uniform, &hyphen), PageLayout::Uniform);
        assert_eq!(PageLayout::detect(&clustered_key(), &hyphen), PageLayout::Hyphenated);
        assert_eq!(PageLayout::detect(&clustered_key(), &plain), PageLayout::Clustered);
    }

    #[test]
    fn test_clustered_rows_become_sub_questions_in_y_order() {
        let t = token();
        let members = vec![
            member(&t, Some(QuestionId::major(2)), 10, 500),
            member(&t, Some(QuestionId::major(2)), 12, 100),
            member(&t, Some(QuestionId::major(2)), 11, 300),
            member(&t, Some(QuestionId::major(1)), 40, 20),
        ];
        let groups = assign_sub_questions(members, PageLayout::Clustered, &clustered_key());
        assert_eq!(slot_names(&groups), vec!["1", "2-1", "2-2", "2-3"]);
        assert_eq!(groups[1].members[0].key.y, 100);
        assert_eq!(groups[2].members[0].key.y, 300);
        assert_eq!(groups[3].members[0].key.y, 500);
    }

    #[test]
    fn test_clustering_failure_falls_back_to_position() {
        let t = token();
        // Two tokens cannot form three clusters.
        let members = vec![
            member(&t, Some(QuestionId::major(2)), 10, 400),
            member(&t, Some(QuestionId::major(2)), 10, 200),
        ];
        let groups = assign_sub_questions(members, PageLayout::Clustered, &clustered_key());
        assert_eq!(slot_names(&groups), vec!["2-1", "2-2"]);
        assert_eq!(groups[0].members[0].key.y, 200);
    }

    #[test]
    fn test_tokens_sharing_a_row_stay_in_one_sub_question() {
        let t = token();
        let members = vec![
            member(&t, Some(QuestionId::major(2)), 10, 100),
            member(&t, Some(QuestionId::major(2)), 60, 100),
            member(&t, Some(QuestionId::major(2)), 10, 300),
            member(&t, Some(QuestionId::major(2)), 60, 300),
        ];
        let groups = assign_sub_questions(members, PageLayout::Clustered, &clustered_key());
        assert_eq!(slot_names(&groups), vec!["2-1", "2-2"]);
        let rows: Vec<Vec<u32>> = groups
            .iter()
            .map(|g| g.members.iter().map(|m| m.key.y).collect())
            .collect();
        assert_eq!(rows, vec![vec![100, 100], vec![300, 300]]);
    }

    #[test]
    fn test_unknown_tokens_are_skipped_and_members_sorted_by_x() {
        let t = token();
        let members = vec![
            member(&t, Some(QuestionId::sub(2, 1)), 90, 10),
            member(&t, None, 5, 10),
            member(&t, Some(QuestionId::sub(2, 1)), 30, 12),
        ];
        let groups = assign_sub_questions(members, PageLayout::Hyphenated, &clustered_key());
        assert_eq!(groups.len(), 1);
        let xs: Vec<u32> = groups[0].members.iter().map(|m| m.key.x).collect();
        assert_eq!(xs, vec![30, 90]);
    }

    #[test]
    fn test_group_answer_count_prefers_answer_key() {
        let t = token();
        let key = AnswerKey::from_entries(vec![AnswerKeyEntry::new(7, 0, 3, 1.0)]).unwrap();
        let group = QuestionGroup {
            question: QuestionId::major(7),
            members: vec![member(&t, Some(QuestionId::major(7)), 0, 0)],
        };
        assert_eq!(group.answer_count(&key), 3);
        let orphan = QuestionGroup {
            question: QuestionId::major(9),
            members: vec![member(&t, Some(QuestionId::major(9)), 0, 0)],
        };
        assert_eq!(orphan.answer_count(&key), 1);
    }
}
