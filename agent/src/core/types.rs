//! Shared deterministic types for the decode/drive core.
//!
//! These types define stable contracts between core components. They should
//! not depend on external state or I/O and must remain deterministic across
//! runs.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Role of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged entry of the conversational transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Ordered, append-only conversational history. Owned by the turn driver and
/// sent in full on every completion call.
pub type Transcript = Vec<Message>;

/// The decoded, typed meaning of one planner turn.
///
/// Exactly one variant per turn. A turn that textually carries markers for
/// more than one variant is a [`DecodeFailure`], never a variant choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Run a command through the dispatcher.
    Action {
        command: String,
        explanation: String,
        expected_outcome: String,
        subtask: String,
        destructive: bool,
    },
    /// Ask the human operator for more information.
    RequestInfo { prompt: String, subtask: String },
    /// The planner declares the task finished.
    TaskComplete { summary: String },
}

/// Why a raw turn failed to decode.
///
/// All kinds are recoverable at decode time: the driver appends a corrective
/// message and charges the failure budget. This is a domain value, not an
/// `anyhow` error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// `===END===` was absent or not the last non-blank line.
    MissingEndMarker,
    /// The first section (or the object's keys) matched none of the three
    /// leading keys.
    UnrecognizedFormat,
    /// A recognized key appeared more than once and no duplicate policy was
    /// supplied.
    UnresolvedDuplicate { key: String },
    /// The selected field set is incomplete.
    MissingFields { missing: BTreeSet<String> },
    /// The turn held no parseable JSON, even after escape repair.
    InvalidJson,
    /// More than one of `action`/`request_info`/`task_complete` was present.
    ExclusiveViolation { present: Vec<String> },
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingEndMarker => {
                write!(f, "missing ===END=== as the last non-blank line")
            }
            Self::UnrecognizedFormat => write!(f, "unrecognized response format"),
            Self::UnresolvedDuplicate { key } => {
                write!(f, "duplicate section '{key}' with no duplicate policy")
            }
            Self::MissingFields { missing } => {
                let fields: Vec<&str> = missing.iter().map(String::as_str).collect();
                write!(f, "missing required fields: {}", fields.join(", "))
            }
            Self::InvalidJson => write!(f, "response is not valid JSON"),
            Self::ExclusiveViolation { present } => {
                write!(f, "mutually exclusive markers present: {}", present.join(", "))
            }
        }
    }
}

/// Outcome of decoding one raw turn: a valid intent or a typed failure,
/// never both.
pub type DecodeOutcome = Result<Intent, DecodeFailure>;

/// How to resolve a recognized key that appears more than once in a text
/// turn. Must be supplied explicitly; with no policy a duplicate fails the
/// decode (fail closed, never guess).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Keep the first occurrence; later blocks become trailing text.
    KeepFirst,
    /// Keep the last occurrence; earlier blocks become trailing text.
    KeepLast,
}

/// Which response grammar is active for this run. Exactly one per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Delimited `===SECTION===` text format (primary).
    Text,
    /// One JSON object per turn (alternate).
    Json,
}

/// Result of one dispatched command. Non-zero exit is a normal result, not
/// a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}
