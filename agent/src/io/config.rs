//! Agent configuration stored in `agent.toml`.

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Agent configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values; a missing file
/// means all defaults. Secrets never live here (see
/// [`AgentConfig::apply_env`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Chat-completions endpoint URL. Usually supplied via `AGENT_API_URL`.
    pub api_url: String,

    /// Model identifier sent with every completion request.
    pub model: String,

    /// Sampling temperature sent with every completion request.
    pub temperature: f64,

    /// Consecutive undecodable responses tolerated before the run aborts.
    pub max_consecutive_failures: u32,

    /// Wall-clock budget for one dispatched command, in seconds.
    pub command_timeout_secs: u64,

    /// Truncate captured command stdout/stderr beyond this many bytes.
    pub command_output_limit_bytes: usize,

    /// When set, append the finished run's transcript to this JSONL file.
    pub transcript_log_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            model: "gpt-4o".to_string(),
            temperature: 0.7,
            max_consecutive_failures: 3,
            command_timeout_secs: 10 * 60,
            command_output_limit_bytes: 100_000,
            transcript_log_path: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_consecutive_failures == 0 {
            return Err(anyhow!("max_consecutive_failures must be > 0"));
        }
        if self.command_timeout_secs == 0 {
            return Err(anyhow!("command_timeout_secs must be > 0"));
        }
        if self.command_output_limit_bytes == 0 {
            return Err(anyhow!("command_output_limit_bytes must be > 0"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(anyhow!("temperature must be within 0.0..=2.0"));
        }
        Ok(())
    }

    /// Overlay environment variables onto the file-based config. The
    /// endpoint and model are deployment concerns and commonly come from
    /// the environment rather than the checked-in file.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("AGENT_API_URL") {
            self.api_url = url;
        }
        if let Ok(model) = env::var("AGENT_MODEL") {
            self.model = model;
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
