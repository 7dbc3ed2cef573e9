//! Token key grammar.
//!
//! A token key identifies one answer token within a page pass:
//!
//! ```text
//! {subject}_{student_id}_L{line}_x{x}_y{y}_qn{question}_ac{answer_count}[_dup{n}]
//! ```
//!
//! `question` is `3`, `3-2`, or `unknownQN`. The subject may itself contain
//! underscores, so parsing works from the right: the fixed-shape fields are
//! peeled off first and whatever remains splits at its last underscore.

use std::fmt;
use std::str::FromStr;

use crate::core::constants::UNKNOWN_QUESTION_ID;
use crate::core::SheetError;
use crate::domain::QuestionId;

/// Parsed form of a token key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    subject: String,
    student_id: String,
    /// Row index of the token in the answer region.
    pub line: usize,
    /// Left edge of the token inside its row.
    pub x: u32,
    /// Vertical center of the token in answer-region coordinates.
    pub y: u32,
    /// Matched question, `None` when the token fell outside every range.
    pub question: Option<QuestionId>,
    /// Expected answer count of the matched question, `0` when unknown.
    pub answer_count: u32,
    /// Collision suffix.
    pub dup: Option<u32>,
}

impl TokenKey {
    /// Creates a key.
    ///
    /// Whitespace is removed from the subject. The student id must be
    /// non-empty and free of underscores and whitespace.
    pub fn new(
        subject: &str,
        student_id: &str,
        line: usize,
        x: u32,
        y: u32,
        question: Option<QuestionId>,
        answer_count: u32,
    ) -> Result<Self, SheetError> {
        let subject: String = subject.chars().filter(|c| !c.is_whitespace()).collect();
        if subject.is_empty() {
            return Err(SheetError::invalid_input("token key subject is empty"));
        }
        validate_student_id(student_id)
            .map_err(|reason| SheetError::invalid_input(format!("student id '{student_id}': {reason}")))?;
        Ok(Self {
            subject,
            student_id: student_id.to_string(),
            line,
            x,
            y,
            question,
            answer_count,
            dup: None,
        })
    }

    /// Subject with whitespace removed.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Student id.
    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Returns the key with a collision suffix.
    pub fn with_dup(mut self, dup: u32) -> Self {
        self.dup = Some(dup);
        self
    }

    /// Whether the token matched a question.
    pub fn is_matched(&self) -> bool {
        self.question.is_some()
    }
}

fn validate_student_id(student_id: &str) -> Result<(), &'static str> {
    if student_id.is_empty() {
        Err("empty")
    } else if student_id.contains('_') || student_id.chars().any(char::is_whitespace) {
        Err("contains '_' or whitespace")
    } else {
        Ok(())
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_L{}_x{}_y{}_qn",
            self.subject, self.student_id, self.line, self.x, self.y
        )?;
        match &self.question {
            Some(id) => write!(f, "{id}")?,
            None => f.write_str(UNKNOWN_QUESTION_ID)?,
        }
        write!(f, "_ac{}", self.answer_count)?;
        if let Some(dup) = self.dup {
            write!(f, "_dup{dup}")?;
        }
        Ok(())
    }
}

fn digits<T: FromStr>(key: &str, field: &str, value: &str) -> Result<T, SheetError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SheetError::key_parse(key, format!("{field} '{value}' is not a number")));
    }
    value
        .parse()
        .map_err(|_| SheetError::key_parse(key, format!("{field} '{value}' is out of range")))
}

fn peel<'a>(key: &str, rest: &'a str, marker: &str) -> Result<(&'a str, &'a str), SheetError> {
    rest.rsplit_once(marker)
        .ok_or_else(|| SheetError::key_parse(key, format!("missing '{marker}' field")))
}

impl FromStr for TokenKey {
    type Err = SheetError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let mut rest = key;

        let mut dup = None;
        if let Some((head, tail)) = rest.rsplit_once("_dup") {
            if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
                dup = Some(digits(key, "dup", tail)?);
                rest = head;
            }
        }

        let (rest, ac) = peel(key, rest, "_ac")?;
        let answer_count = digits(key, "ac", ac)?;

        let (rest, qn) = peel(key, rest, "_qn")?;
        let question = if qn == UNKNOWN_QUESTION_ID {
            None
        } else {
            Some(
                qn.parse::<QuestionId>()
                    .map_err(|_| SheetError::key_parse(key, format!("question '{qn}' is malformed")))?,
            )
        };

        let (rest, y) = peel(key, rest, "_y")?;
        let y = digits(key, "y", y)?;
        let (rest, x) = peel(key, rest, "_x")?;
        let x = digits(key, "x", x)?;
        let (rest, line) = peel(key, rest, "_L")?;
        let line = digits(key, "line", line)?;

        let (subject, student_id) = rest
            .rsplit_once('_')
            .ok_or_else(|| SheetError::key_parse(key, "missing subject/student separator"))?;
        if subject.is_empty() || subject.chars().any(char::is_whitespace) {
            return Err(SheetError::key_parse(key, "subject is empty or contains whitespace"));
        }
        validate_student_id(student_id)
            .map_err(|reason| SheetError::key_parse(key, format!("student id {reason}")))?;

        Ok(Self {
            subject: subject.to_string(),
            student_id: student_id.to_string(),
            line,
            x,
            y,
            question,
            answer_count,
            dup,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_matches_grammar() {
        let key = TokenKey::new("Signals and Systems", "32201959", 2, 414, 1014, Some(QuestionId::sub(2, 1)), 1)
            .unwrap();
        assert_eq!(key.to_string(), "SignalsandSystems_32201959_L2_x414_y1014_qn2-1_ac1");
        assert_eq!(
            key.with_dup(2).to_string(),
            "SignalsandSystems_32201959_L2_x414_y1014_qn2-1_ac1_dup2"
        );
    }

    #[test]
    fn test_unknown_question_round_trips() {
        let text = "AI_exam_20231234_L0_x5_y77_qnunknownQN_ac0";
        let key: TokenKey = text.parse().unwrap();
        assert_eq!(key.subject(), "AI_exam");
        assert_eq!(key.student_id(), "20231234");
        assert_eq!(key.question, None);
        assert_eq!(key.answer_count, 0);
        assert_eq!(key.to_string(), text);
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        for bad in [
            "math_1234_L1_x2_y3_qn4",
            "math_1234_L1_x2_y3_qn4-_ac1",
            "math_1234_Lx_x2_y3_qn4_ac1",
            "1234_L1_x2_y3_qn4_ac1",
            "math__L1_x2_y3_qn4_ac1",
            "math_1234_L1_x-2_y3_qn4_ac1",
        ] {
            assert!(bad.parse::<TokenKey>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_student_id_is_validated() {
        assert!(TokenKey::new("math", "12_34", 0, 0, 0, None, 0).is_err());
        assert!(TokenKey::new("math", "", 0, 0, 0, None, 0).is_err());
        assert!(TokenKey::new("  ", "1234", 0, 0, 0, None, 0).is_err());
    }

    fn question_strategy() -> impl Strategy<Value = Option<QuestionId>> {
        prop_oneof![
            Just(None),
            (1u32..200).prop_map(|m| Some(QuestionId::major(m))),
            (1u32..200, 1u32..20).prop_map(|(m, s)| Some(QuestionId::sub(m, s))),
        ]
    }

    proptest! {
        #[test]
        fn prop_key_round_trips(
            subject in "[A-Za-z][A-Za-z0-9_ ]{0,12}",
            student in "[0-9]{8}",
            line in 0usize..200,
            x in 0u32..5000,
            y in 0u32..8000,
            question in question_strategy(),
            answer_count in 0u32..10,
            dup in proptest::option::of(1u32..50),
        ) {
            let mut key = TokenKey::new(&subject, &student, line, x, y, question, answer_count).unwrap();
            if let Some(n) = dup {
                key = key.with_dup(n);
            }
            let parsed: TokenKey = key.to_string().parse().unwrap();
            prop_assert_eq!(&parsed, &key);
            prop_assert_eq!(parsed.to_string(), key.to_string());
        }
    }
}
