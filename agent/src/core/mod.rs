//! Deterministic, pure logic shared by the driver.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod intent;
pub mod json;
pub mod text;
pub mod types;

use crate::core::types::{DecodeOutcome, DuplicatePolicy, ParserKind};

/// Decode one raw planner turn with the grammar selected for this run.
pub fn decode(parser: ParserKind, raw: &str, policy: Option<DuplicatePolicy>) -> DecodeOutcome {
    match parser {
        ParserKind::Text => text::decode_text(raw, policy),
        ParserKind::Json => json::decode_json(raw),
    }
}
