//! Decoder for the delimited-section text wire format (primary grammar).
//!
//! A raw turn is a sequence of lines. A line that is solely `===NAME===`
//! opens a section named `NAME` (case-insensitive) and closes the previous
//! one; all other lines accumulate verbatim onto the open section. The turn
//! must end with `===END===` as its last non-blank line.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::core::intent::{Format, LEADING_KEYS, intent_from_map};
use crate::core::types::{DecodeFailure, DecodeOutcome, DuplicatePolicy};

/// Decode one raw text turn into an intent.
///
/// `policy` controls duplicate-section resolution; with `None` any duplicate
/// recognized key fails the decode with [`DecodeFailure::UnresolvedDuplicate`].
pub fn decode_text(raw: &str, policy: Option<DuplicatePolicy>) -> DecodeOutcome {
    let lines: Vec<&str> = raw.lines().collect();

    match lines.iter().rev().find(|line| !line.trim().is_empty()) {
        Some(line)
            if delimiter_key(line).is_some_and(|key| key.eq_ignore_ascii_case("end")) => {}
        _ => return Err(DecodeFailure::MissingEndMarker),
    }

    // Leading keys are exclusivity markers wherever they appear in the turn,
    // never continuation text.
    let mut leading_present: Vec<String> = Vec::new();
    for line in &lines {
        if let Some(key) = delimiter_key(line) {
            let key = key.to_ascii_lowercase();
            if LEADING_KEYS.contains(&key.as_str()) && !leading_present.contains(&key) {
                leading_present.push(key);
            }
        }
    }
    if leading_present.len() > 1 {
        return Err(DecodeFailure::ExclusiveViolation {
            present: leading_present,
        });
    }

    // Collect sections in encounter order. The first section's key selects
    // the format; later keys outside the format's field set are treated as
    // continuation text of the open section (tolerates the planner echoing
    // delimiter-like text inside a field).
    let mut format: Option<Format> = None;
    let mut sections: Vec<(String, Vec<&str>)> = Vec::new();
    for line in lines.iter().copied() {
        match delimiter_key(line).map(str::to_ascii_lowercase) {
            Some(key) if key == "end" => break,
            Some(key) => match format {
                None => match Format::from_leading_key(&key) {
                    Some(selected) => {
                        format = Some(selected);
                        sections.push((key, Vec::new()));
                    }
                    None => return Err(DecodeFailure::UnrecognizedFormat),
                },
                Some(selected) => {
                    if selected.fields().contains(&key.as_str()) {
                        sections.push((key, Vec::new()));
                    } else if let Some(open) = sections.last_mut() {
                        open.1.push(line);
                    }
                }
            },
            // Lines before the first delimiter belong to no section.
            None => {
                if let Some(open) = sections.last_mut() {
                    open.1.push(line);
                }
            }
        }
    }
    let Some(format) = format else {
        return Err(DecodeFailure::UnrecognizedFormat);
    };

    let mut resolved: BTreeMap<String, String> = BTreeMap::new();
    for (key, body) in sections {
        let value = body.join("\n").trim().to_string();
        match resolved.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match policy {
                None => {
                    return Err(DecodeFailure::UnresolvedDuplicate {
                        key: slot.key().clone(),
                    });
                }
                Some(DuplicatePolicy::KeepFirst) => {
                    let block = rewrap(slot.key(), &value);
                    let canonical = slot.get_mut();
                    canonical.push('\n');
                    canonical.push_str(&block);
                }
                Some(DuplicatePolicy::KeepLast) => {
                    let previous = rewrap(slot.key(), slot.get());
                    *slot.get_mut() = format!("{value}\n{previous}");
                }
            },
        }
    }

    intent_from_map(format, &resolved)
}

/// Extract the section name from a delimiter line of the form `===NAME===`,
/// tolerating surrounding whitespace. Returns `None` for ordinary lines.
fn delimiter_key(line: &str) -> Option<&str> {
    let inner = line.trim().strip_prefix("===")?.strip_suffix("===")?;
    if inner.is_empty() || inner.contains('=') {
        return None;
    }
    Some(inner)
}

/// Re-wrap a displaced duplicate occurrence as `===KEY===\n<value>` trailing
/// text.
fn rewrap(key: &str, value: &str) -> String {
    format!("==={}===\n{}", key.to_ascii_uppercase(), value)
}
