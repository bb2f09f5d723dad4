//! Ollama client backing the learned intent tier and text-generating tools.
//!
//! The model is only ever consulted for utterances the pattern tier cannot
//! place (or flags as ambiguous), and by the few tools that write prose
//! (research summaries, jokes). Everything else is deterministic.

use std::time::Duration;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmSettings;

/// Errors from talking to the model server.
#[derive(Debug, Error, Diagnostic)]
pub enum LlmError {
    #[error("model server is not reachable at {url}")]
    #[diagnostic(
        code(steward::llm::unavailable),
        help("Start Ollama with `ollama serve` or pass --no-llm to use pattern matching only.")
    )]
    Unavailable { url: String },

    #[error("model request failed: {message}")]
    #[diagnostic(
        code(steward::llm::request_failed),
        help("Check the server log; the configured model may not be pulled (`ollama pull <model>`).")
    )]
    RequestFailed { message: String },

    #[error("unexpected model reply: {message}")]
    #[diagnostic(
        code(steward::llm::parse_error),
        help("The server answered with a body that is not a generate response.")
    )]
    ParseError { message: String },

    #[error("model did not answer within {timeout_secs}s")]
    #[diagnostic(
        code(steward::llm::timeout),
        help("Raise llm.timeout_secs in the config or switch to a smaller model.")
    )]
    Timeout { timeout_secs: u64 },
}

pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// Something that turns a prompt into text.
pub trait InferenceBackend: Send + Sync {
    /// One completion for `prompt`, optionally steered by a `system` prompt.
    fn generate(&self, prompt: &str, system: Option<&str>) -> LlmResult<String>;
}

/// Connection settings for [`OllamaClient`].
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    /// Per-request timeout for generation.
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        LlmSettings::default().into()
    }
}

impl From<LlmSettings> for OllamaConfig {
    fn from(settings: LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model,
            timeout_secs: settings.timeout_secs,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// Blocking client for an Ollama server's `/api/generate` endpoint.
///
/// Call [`OllamaClient::probe`] once before use; an unprobed or unreachable
/// client refuses to generate instead of waiting out a timeout per request.
pub struct OllamaClient {
    config: OllamaConfig,
    agent: ureq::Agent,
    reachable: bool,
    pulled: Vec<String>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self {
            config,
            agent,
            reachable: false,
            pulled: Vec::new(),
        }
    }

    /// Ask the server for its model list. Returns whether it answered.
    pub fn probe(&mut self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        let tags = self
            .agent
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .call()
            .ok()
            .and_then(|resp| resp.into_json::<TagsResponse>().ok());
        match tags {
            Some(tags) => {
                self.reachable = true;
                self.pulled = tags.models.into_iter().map(|m| m.name).collect();
                tracing::debug!(models = self.pulled.len(), "model server reachable");
            }
            None => {
                self.reachable = false;
                self.pulled.clear();
            }
        }
        self.reachable
    }

    /// Whether the configured model is among the pulled ones. A tag-less
    /// name matches any tag (`llama3` matches `llama3:latest`).
    pub fn has_model(&self) -> bool {
        let wanted = self.config.model.as_str();
        self.pulled
            .iter()
            .any(|name| name == wanted || name.split(':').next() == Some(wanted))
    }

    pub fn is_available(&self) -> bool {
        self.reachable
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn transport_error(&self, e: ureq::Error) -> LlmError {
        match e {
            ureq::Error::Status(code, resp) => LlmError::RequestFailed {
                message: format!(
                    "HTTP {code}: {}",
                    resp.into_string().unwrap_or_default().trim()
                ),
            },
            ureq::Error::Transport(t) if t.to_string().contains("timed out") => LlmError::Timeout {
                timeout_secs: self.config.timeout_secs,
            },
            ureq::Error::Transport(t) => LlmError::RequestFailed {
                message: t.to_string(),
            },
        }
    }
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

impl InferenceBackend for OllamaClient {
    fn generate(&self, prompt: &str, system: Option<&str>) -> LlmResult<String> {
        if !self.reachable {
            return Err(LlmError::Unavailable {
                url: self.config.base_url.clone(),
            });
        }

        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        tracing::debug!(model = %self.config.model, chars = prompt.len(), "model request");
        let reply: GenerateResponse = self
            .agent
            .post(&format!("{}/api/generate", self.config.base_url))
            .send_json(&request)
            .map_err(|e| self.transport_error(e))?
            .into_json()
            .map_err(|e| LlmError::ParseError {
                message: e.to_string(),
            })?;
        Ok(reply.response)
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("reachable", &self.reachable)
            .finish()
    }
}

/// Locate the outermost JSON object in a model reply.
///
/// Models like to wrap JSON in code fences or chat around it; everything
/// outside the first `{` and the last `}` is ignored.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}
