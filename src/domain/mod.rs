//! Domain-level structures shared across the answer-sheet pipeline.
//!
//! This module groups the typed records of one page pass: the validated
//! answer key, question identifiers, detected regions with the bands and
//! tokens cut from them, and the answers and failures handed downstream.

pub mod answer_key;
pub mod question;
pub mod region;
pub mod result;

pub use answer_key::*;
pub use question::*;
pub use region::*;
pub use result::*;
