//! Field-set resolution shared by the text and JSON grammars.
//!
//! Both grammars reduce a raw turn to a flat key/value map; this module maps
//! that map onto one of the three fixed field sets and builds the [`Intent`].

use std::collections::{BTreeMap, BTreeSet};

use crate::core::types::{DecodeFailure, Intent};

/// Keys that select a response format. Mutually exclusive per turn.
pub const LEADING_KEYS: [&str; 3] = ["action", "request_info", "task_complete"];

/// One of the three fixed response formats, selected by its leading key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Action,
    RequestInfo,
    TaskComplete,
}

impl Format {
    pub fn from_leading_key(key: &str) -> Option<Self> {
        match key {
            "action" => Some(Self::Action),
            "request_info" => Some(Self::RequestInfo),
            "task_complete" => Some(Self::TaskComplete),
            _ => None,
        }
    }

    pub fn leading_key(self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::RequestInfo => "request_info",
            Self::TaskComplete => "task_complete",
        }
    }

    /// The complete field set for this format. Every field must be present
    /// in the resolved map.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Self::Action => &[
                "action",
                "explanation",
                "expected_outcome",
                "subtask",
                "is_destructive",
            ],
            Self::RequestInfo => &["request_info", "subtask"],
            Self::TaskComplete => &["task_complete", "summary"],
        }
    }
}

/// Coerce a boolean field value: trimmed, case-insensitive comparison
/// against `"true"`. Anything else is `false`.
pub fn coerce_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Build an intent from a resolved key/value map, checking completeness.
///
/// The `task_complete` value is coerced but does not change variant
/// selection; the wire format always sends `true` there.
pub fn intent_from_map(
    format: Format,
    map: &BTreeMap<String, String>,
) -> Result<Intent, DecodeFailure> {
    let missing: BTreeSet<String> = format
        .fields()
        .iter()
        .filter(|field| !map.contains_key(**field))
        .map(|field| (*field).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DecodeFailure::MissingFields { missing });
    }

    let intent = match format {
        Format::Action => Intent::Action {
            command: map["action"].clone(),
            explanation: map["explanation"].clone(),
            expected_outcome: map["expected_outcome"].clone(),
            subtask: map["subtask"].clone(),
            destructive: coerce_bool(&map["is_destructive"]),
        },
        Format::RequestInfo => Intent::RequestInfo {
            prompt: map["request_info"].clone(),
            subtask: map["subtask"].clone(),
        },
        Format::TaskComplete => Intent::TaskComplete {
            summary: map["summary"].clone(),
        },
    };
    Ok(intent)
}
