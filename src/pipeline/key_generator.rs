//! Builds a unique key for every answer token of a page.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::core::{ProcessingStage, SheetError};
use crate::domain::{AnswerKey, PageContext, QuestionTable, TextToken};
use crate::pipeline::key::TokenKey;

/// Tokens of one page indexed by their rendered key.
#[derive(Debug, Clone, Default)]
pub struct KeyedTokens {
    tokens: BTreeMap<String, TextToken>,
    collisions: usize,
}

impl KeyedTokens {
    /// Number of keyed tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no tokens were keyed.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Looks up a token by key.
    pub fn get(&self, key: &str) -> Option<&TextToken> {
        self.tokens.get(key)
    }

    /// Keys and tokens in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TextToken)> {
        self.tokens.iter().map(|(k, t)| (k.as_str(), t))
    }

    /// How many keys needed a dedup suffix.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    fn insert_unique(&mut self, key: TokenKey, token: TextToken) -> String {
        let base = key.to_string();
        if !self.tokens.contains_key(&base) {
            self.tokens.insert(base.clone(), token);
            return base;
        }
        self.collisions += 1;
        let mut n = 1;
        loop {
            let candidate = key.clone().with_dup(n).to_string();
            if !self.tokens.contains_key(&candidate) {
                trace!(%base, %candidate, "resolved key collision");
                self.tokens.insert(candidate.clone(), token);
                return candidate;
            }
            n += 1;
        }
    }
}

/// Generates token keys for one page.
#[derive(Debug)]
pub struct KeyGenerator<'a> {
    context: &'a PageContext,
    answer_key: &'a AnswerKey,
}

impl<'a> KeyGenerator<'a> {
    /// Creates a generator for a page.
    pub fn new(context: &'a PageContext, answer_key: &'a AnswerKey) -> Self {
        Self {
            context,
            answer_key,
        }
    }

    /// Keys every token against `table`.
    ///
    /// Tokens are visited in the given order, so the first of two colliding
    /// tokens keeps the plain key and later ones get `_dup1`, `_dup2`, ...
    pub fn generate(
        &self,
        tokens: impl IntoIterator<Item = TextToken>,
        table: &QuestionTable,
    ) -> Result<KeyedTokens, SheetError> {
        let mut keyed = KeyedTokens::default();
        let mut unmatched = 0usize;

        for token in tokens {
            let y_center = token.center_in_region().y;
            let question = table.lookup(y_center);
            let answer_count = question
                .and_then(|id| self.answer_key.answer_count(&id))
                .unwrap_or(0);
            if question.is_none() {
                unmatched += 1;
            }

            let key = TokenKey::new(
                &self.context.subject,
                &self.context.student_id,
                token.line_index,
                token.x_in_line(),
                y_center.round() as u32,
                question,
                answer_count,
            )
            .map_err(|e| {
                SheetError::processing_error(
                    ProcessingStage::KeyGeneration,
                    format!("page {} line {}", self.context.page_id, token.line_index),
                    e,
                )
            })?;
            keyed.insert_unique(key, token);
        }

        debug!(
            tokens = keyed.len(),
            unmatched,
            collisions = keyed.collisions(),
            "generated token keys"
        );
        Ok(keyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AnswerKeyEntry, QuestionId, QuestionRange};
    use crate::processors::{PixelRect, Point};
    use image::RgbImage;

    fn token(line: usize, x: u32, band_y: u32) -> TextToken {
        TextToken {
            line_index: line,
            bbox: PixelRect::new(x, 4, 10, 20),
            band_origin: (5, band_y),
            raster_origin: Point::new(0.0, 0.0),
            raster: RgbImage::new(2, 2),
            merge_count: 1,
        }
    }

    fn fixture() -> (PageContext, AnswerKey, QuestionTable) {
        let context = PageContext::new("p1", "Math", "20231234");
        let key = AnswerKey::from_entries(vec![
            AnswerKeyEntry::new(1, 0, 1, 1.0),
            AnswerKeyEntry::new(2, 0, 2, 1.0),
        ])
        .unwrap();
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
        (context, key, table)
    }

    #[test]
    fn test_keys_carry_question_and_answer_count() {
        let (context, key, table) = fixture();
        let keyed = KeyGenerator::new(&context, &key)
            .generate(vec![token(0, 30, 3), token(1, 40, 53), token(2, 7, 200)], &table)
            .unwrap();
        let keys: Vec<&str> = keyed.iter().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![
                "Math_20231234_L0_x30_y17_qn1_ac1",
                "Math_20231234_L1_x40_y67_qn2_ac2",
                "Math_20231234_L2_x7_y214_qnunknownQN_ac0",
            ]
        );
    }

    #[test]
    fn test_collisions_get_increasing_suffixes() {
        let (context, key, table) = fixture();
        let keyed = KeyGenerator::new(&context, &key)
            .generate(vec![token(0, 30, 3), token(0, 30, 3), token(0, 30, 3)], &table)
            .unwrap();
        assert_eq!(keyed.len(), 3);
        assert_eq!(keyed.collisions(), 2);
        assert!(keyed.get("Math_20231234_L0_x30_y17_qn1_ac1").is_some());
        assert!(keyed.get("Math_20231234_L0_x30_y17_qn1_ac1_dup1").is_some());
        assert!(keyed.get("Math_20231234_L0_x30_y17_qn1_ac1_dup2").is_some());
    }

    #[test]
    fn test_unkeyable_student_id_is_a_key_generation_error() {
        let (_, key, table) = fixture();
        let context = PageContext::new("p1", "Math", "2023_1234");
        let err = KeyGenerator::new(&context, &key)
            .generate(vec![token(0, 30, 3)], &table)
            .unwrap_err();
        assert!(matches!(
            err,
            SheetError::Processing {
                kind: ProcessingStage::KeyGeneration,
                ..
            }
        ));
        assert_eq!(err.to_string(), "key generation failed: page p1 line 0");
    }
}
