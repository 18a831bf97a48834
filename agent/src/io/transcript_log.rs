//! JSONL sink for finished-run transcripts.
//!
//! One record per message, appended at run end. The `kind` tag gives a
//! coarse classification of what the message carried, so the log can be
//! grepped without re-parsing wire formats.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{Message, Role};

#[derive(Serialize)]
struct TranscriptRecord<'a> {
    role: Role,
    kind: &'static str,
    content: &'a str,
}

/// Append every message of a finished run to the JSONL file at `path`.
pub fn append_transcript(path: &Path, messages: &[Message]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create transcript dir {}", parent.display()))?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open transcript log {}", path.display()))?;

    for message in messages {
        let record = TranscriptRecord {
            role: message.role,
            kind: classify(&message.content),
            content: &message.content,
        };
        let mut line = serde_json::to_string(&record).context("serialize transcript record")?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .with_context(|| format!("append transcript log {}", path.display()))?;
    }
    Ok(())
}

/// Coarse content classification, keyed on the wire markers.
fn classify(content: &str) -> &'static str {
    if content.contains("request_info") || content.contains("REQUEST_INFO") {
        "request_info"
    } else if content.contains("task_complete") || content.contains("TASK_COMPLETE") {
        "task_complete"
    } else {
        "action"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_json_line_per_message() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("transcript.jsonl");
        let messages = vec![
            Message::user("Task: list files"),
            Message::assistant("===TASK_COMPLETE===\ntrue\n===SUMMARY===\ndone\n===END==="),
        ];

        append_transcript(&path, &messages).expect("append");
        append_transcript(&path, &messages).expect("append again");

        let contents = fs::read_to_string(&path).expect("read");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        let record: serde_json::Value = serde_json::from_str(lines[1]).expect("json");
        assert_eq!(record["kind"], "task_complete");
        assert_eq!(record["role"], "assistant");
    }
}
