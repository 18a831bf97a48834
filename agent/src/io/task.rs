//! Task statement sourcing.
//!
//! Resolution order: CLI argument, `AGENT_TASK`, `AGENT_TASK_FILE` (file
//! contents), then an interactive prompt.

use std::env;
use std::fs;

use anyhow::{Context, Result};
use tracing::info;

use crate::io::console::HumanIo;

pub fn resolve_task(arg: Option<String>, human: &mut impl HumanIo) -> Result<String> {
    if let Some(task) = arg {
        return Ok(task);
    }
    if let Ok(task) = env::var("AGENT_TASK") {
        return Ok(task);
    }
    if let Ok(path) = env::var("AGENT_TASK_FILE") {
        let task = fs::read_to_string(&path).with_context(|| format!("read task file {path}"))?;
        info!(path, "task loaded from file");
        return Ok(task);
    }
    human.ask("Enter the task for the agent:")
}
