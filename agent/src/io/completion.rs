//! Completion-service abstraction for planner turns.
//!
//! The [`CompletionClient`] trait decouples the turn driver from the actual
//! generation backend. Tests use scripted clients that return predetermined
//! turns without touching the network.

use std::env;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use crate::core::types::{Message, ParserKind};
use crate::io::config::AgentConfig;
use crate::prompts::system_prompt;

/// One generation-service response: the raw turn text plus usage metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub total_tokens: u64,
}

/// Abstraction over planner completion backends.
///
/// Any `Err` is a transport-level failure: the driver pauses briefly and
/// retries without charging the decode failure budget.
pub trait CompletionClient {
    fn complete(&self, transcript: &[Message]) -> Result<Completion>;
}

/// Blocking HTTP client for a chat-completions endpoint.
pub struct HttpCompletionClient {
    http: reqwest::blocking::Client,
    api_url: String,
    model: String,
    temperature: f64,
    token: Option<String>,
    subscription_key: Option<String>,
    extra_headers: Vec<(String, String)>,
    system_prompt: &'static str,
}

impl HttpCompletionClient {
    /// Build a client from config plus environment: `AGENT_API_TOKEN`,
    /// `AGENT_SUBSCRIPTION_KEY`, and `AGENT_EXTRA_HEADERS`
    /// (`name:value,name:value`).
    pub fn new(cfg: &AgentConfig, parser: ParserKind) -> Result<Self> {
        if cfg.api_url.trim().is_empty() {
            return Err(anyhow!(
                "no completion endpoint configured (set api_url in agent.toml or AGENT_API_URL)"
            ));
        }
        let extra_headers = match env::var("AGENT_EXTRA_HEADERS") {
            Ok(raw) => parse_extra_headers(&raw)?,
            Err(_) => Vec::new(),
        };
        Ok(Self {
            http: reqwest::blocking::Client::new(),
            api_url: cfg.api_url.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            token: env::var("AGENT_API_TOKEN").ok(),
            subscription_key: env::var("AGENT_SUBSCRIPTION_KEY").ok(),
            extra_headers,
            system_prompt: system_prompt(parser),
        })
    }
}

impl CompletionClient for HttpCompletionClient {
    #[instrument(skip_all, fields(messages = transcript.len()))]
    fn complete(&self, transcript: &[Message]) -> Result<Completion> {
        // The driver owns only user/assistant turns; the system prompt is
        // prepended here, on the wire.
        let mut messages = vec![Message::system(self.system_prompt)];
        messages.extend_from_slice(transcript);

        let payload = json!({
            "messages": messages,
            "model": self.model,
            "temperature": self.temperature,
            "choiceCount": 1,
        });

        let mut request = self
            .http
            .post(&self.api_url)
            .header("x-request-id", uuid::Uuid::new_v4().to_string())
            .json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = &self.subscription_key {
            request = request.header("Subscription-Key", key);
        }
        for (name, value) in &self.extra_headers {
            request = request.header(name, value);
        }

        let response = request.send().context("send completion request")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(anyhow!("completion endpoint returned {status}: {body}"));
        }

        let body: ApiResponse = response.json().context("parse completion response")?;
        let text = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion endpoint returned no choices"))?;
        let total_tokens = body.usage.map(|usage| usage.total_tokens).unwrap_or(0);

        debug!(total_tokens, "completion received");
        Ok(Completion { text, total_tokens })
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    content: String,
}

#[derive(Deserialize)]
struct ApiUsage {
    #[serde(default)]
    total_tokens: u64,
}

fn parse_extra_headers(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let (name, value) = entry
                .split_once(':')
                .ok_or_else(|| anyhow!("malformed AGENT_EXTRA_HEADERS entry '{entry}'"))?;
            Ok((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_headers_parse_name_value_pairs() {
        let headers = parse_extra_headers("host:private,session:abc").expect("parse");
        assert_eq!(
            headers,
            vec![
                ("host".to_string(), "private".to_string()),
                ("session".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn malformed_extra_header_is_an_error() {
        assert!(parse_extra_headers("no-colon-here").is_err());
    }

    #[test]
    fn empty_extra_headers_are_fine() {
        assert!(parse_extra_headers("").expect("parse").is_empty());
    }
}
