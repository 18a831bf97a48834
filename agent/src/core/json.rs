//! Decoder for the JSON wire format (alternate grammar).
//!
//! Locates a JSON object inside free-form planner text (fenced code block,
//! then brace-bounded substring, then the whole text), repairs illegal
//! backslash escapes once, and maps the object onto the three fixed field
//! sets shared with the text grammar.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::core::intent::{Format, LEADING_KEYS, intent_from_map};
use crate::core::types::{DecodeFailure, DecodeOutcome};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").expect("fenced block regex")
});

/// Decode one raw JSON turn into an intent.
pub fn decode_json(raw: &str) -> DecodeOutcome {
    let candidate = locate_json(raw);

    let value: Value = match serde_json::from_str(candidate) {
        Ok(value) => value,
        Err(_) => {
            // One escape-repair pass, then give up.
            match serde_json::from_str(&repair_escapes(candidate)) {
                Ok(value) => value,
                Err(_) => return Err(DecodeFailure::InvalidJson),
            }
        }
    };

    let Value::Object(object) = value else {
        return Err(DecodeFailure::UnrecognizedFormat);
    };

    let present: Vec<String> = LEADING_KEYS
        .iter()
        .filter(|key| object.contains_key(**key))
        .map(|key| (*key).to_string())
        .collect();
    let format = match present.as_slice() {
        [] => return Err(DecodeFailure::UnrecognizedFormat),
        [only] => Format::from_leading_key(only).ok_or(DecodeFailure::UnrecognizedFormat)?,
        _ => return Err(DecodeFailure::ExclusiveViolation { present }),
    };

    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for field in format.fields() {
        if let Some(text) = object.get(*field).and_then(value_as_text) {
            map.insert((*field).to_string(), text);
        }
    }
    intent_from_map(format, &map)
}

/// Pick the most likely JSON payload out of surrounding prose.
fn locate_json(raw: &str) -> &str {
    if let Some(captures) = FENCED_BLOCK.captures(raw) {
        if let Some(block) = captures.get(1) {
            return block.as_str();
        }
    }
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if start < end {
            return raw[start..=end].trim();
        }
    }
    raw.trim()
}

/// Replace every backslash escape outside the JSON-legal set
/// `{", \, /, b, f, n, r, t, u}` with a literal double backslash, keeping
/// the escaped character.
fn repair_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next) if "\"\\/bfnrtu".contains(next) => {
                out.push('\\');
                out.push(next);
            }
            Some(next) => {
                out.push_str("\\\\");
                out.push(next);
            }
            None => out.push_str("\\\\"),
        }
    }
    out
}

/// Render a scalar JSON value as field text. Structured values do not count
/// as present.
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Intent;

    const ACTION_JSON: &str = r#"{
        "action": "ls",
        "explanation": "list files",
        "expected_outcome": "file names",
        "subtask": "inspect",
        "is_destructive": false
    }"#;

    #[test]
    fn bare_object_decodes() {
        let intent = decode_json(ACTION_JSON).expect("decode");
        assert_eq!(
            intent,
            Intent::Action {
                command: "ls".to_string(),
                explanation: "list files".to_string(),
                expected_outcome: "file names".to_string(),
                subtask: "inspect".to_string(),
                destructive: false,
            }
        );
    }

    #[test]
    fn fenced_block_is_preferred() {
        let raw = format!("Here you go:\n```json\n{ACTION_JSON}\n```\ntrailing prose");
        assert!(decode_json(&raw).is_ok());
    }

    #[test]
    fn untagged_fence_works_too() {
        let raw = format!("```\n{ACTION_JSON}\n```");
        assert!(decode_json(&raw).is_ok());
    }

    #[test]
    fn brace_bounded_substring_is_extracted() {
        let raw = format!("preamble {ACTION_JSON} postamble");
        assert!(decode_json(&raw).is_ok());
    }

    #[test]
    fn illegal_escape_is_repaired_once() {
        // `\d` is not a legal JSON escape; the repair pass doubles the
        // backslash and the parse succeeds.
        let raw = r#"{"task_complete": true, "summary": "matched \d+ lines"}"#;
        let intent = decode_json(raw).expect("decode");
        assert_eq!(
            intent,
            Intent::TaskComplete {
                summary: "matched \\d+ lines".to_string(),
            }
        );
    }

    #[test]
    fn unparseable_text_is_invalid_json() {
        assert_eq!(decode_json("not json at all"), Err(DecodeFailure::InvalidJson));
        assert_eq!(decode_json("{broken: [}"), Err(DecodeFailure::InvalidJson));
    }

    #[test]
    fn non_object_json_is_unrecognized() {
        assert_eq!(decode_json("[1, 2, 3]"), Err(DecodeFailure::UnrecognizedFormat));
    }

    #[test]
    fn object_without_leading_key_is_unrecognized() {
        assert_eq!(
            decode_json(r#"{"plan": "do things"}"#),
            Err(DecodeFailure::UnrecognizedFormat)
        );
    }

    #[test]
    fn two_leading_keys_violate_exclusivity() {
        let raw = r#"{"action": "ls", "task_complete": true, "summary": "done"}"#;
        match decode_json(raw) {
            Err(DecodeFailure::ExclusiveViolation { present }) => {
                assert_eq!(present, vec!["action".to_string(), "task_complete".to_string()]);
            }
            other => panic!("expected ExclusiveViolation, got {other:?}"),
        }
    }

    #[test]
    fn boolean_fields_accept_json_bool_or_string() {
        let with_bool = r#"{"action": "rm -rf build", "explanation": "e",
            "expected_outcome": "o", "subtask": "s", "is_destructive": true}"#;
        let with_string = r#"{"action": "rm -rf build", "explanation": "e",
            "expected_outcome": "o", "subtask": "s", "is_destructive": "TRUE"}"#;
        for raw in [with_bool, with_string] {
            match decode_json(raw).expect("decode") {
                Intent::Action { destructive, .. } => assert!(destructive),
                other => panic!("expected Action, got {other:?}"),
            }
        }
    }

    #[test]
    fn missing_summary_is_reported() {
        match decode_json(r#"{"task_complete": true}"#) {
            Err(DecodeFailure::MissingFields { missing }) => {
                assert!(missing.contains("summary"));
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn request_info_decodes() {
        let raw = r#"{"request_info": "which branch?", "subtask": "pick branch"}"#;
        let intent = decode_json(raw).expect("decode");
        assert_eq!(
            intent,
            Intent::RequestInfo {
                prompt: "which branch?".to_string(),
                subtask: "pick branch".to_string(),
            }
        );
    }
}
