//! Structured output protocol.
//!
//! Everything the assistant says goes out as an [`AssistantMessage`] through
//! a [`MessageSink`]: styled terminal text, newline-delimited JSON, or an
//! in-memory buffer for tests.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ── Message types ───────────────────────────────────────────────────────

/// A structured message emitted by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AssistantMessage {
    /// Conversational reply.
    Reply { text: String },
    /// Tool execution result.
    ToolResult {
        tool: String,
        success: bool,
        output: String,
    },
    /// Intent vetoed by a capability.
    Blocked { capability: String, text: String },
    /// Question awaiting a user answer (confirmation).
    Prompt { question: String },
    /// Status or informational message.
    System { text: String },
}

impl AssistantMessage {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Reply { text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::System { text: text.into() }
    }

    pub fn prompt(question: impl Into<String>) -> Self {
        Self::Prompt {
            question: question.into(),
        }
    }

    pub fn tool_result(tool: impl Into<String>, success: bool, output: impl Into<String>) -> Self {
        Self::ToolResult {
            tool: tool.into(),
            success,
            output: output.into(),
        }
    }

    /// Rewrite the user-facing text, leaving tool and capability names alone.
    pub fn map_text(self, f: impl FnOnce(String) -> String) -> Self {
        match self {
            Self::Reply { text } => Self::Reply { text: f(text) },
            Self::System { text } => Self::System { text: f(text) },
            Self::Blocked { capability, text } => Self::Blocked {
                capability,
                text: f(text),
            },
            Self::ToolResult {
                tool,
                success,
                output,
            } => Self::ToolResult {
                tool,
                success,
                output: f(output),
            },
            Self::Prompt { question } => Self::Prompt {
                question: f(question),
            },
        }
    }

    /// The text a voice front end would speak for this message.
    pub fn spoken_text(&self) -> &str {
        match self {
            Self::Reply { text } | Self::System { text } | Self::Blocked { text, .. } => text,
            Self::ToolResult { output, .. } => output,
            Self::Prompt { question } => question,
        }
    }
}

// ── MessageSink trait ───────────────────────────────────────────────────

/// A destination for assistant messages.
pub trait MessageSink: Send + Sync {
    fn emit(&self, msg: &AssistantMessage);

    fn emit_batch(&self, msgs: &[AssistantMessage]) {
        for m in msgs {
            self.emit(m);
        }
    }
}

// ── StdoutSink ──────────────────────────────────────────────────────────

/// Renders messages as terminal output.
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn emit(&self, msg: &AssistantMessage) {
        match msg {
            AssistantMessage::Reply { text } => println!("{text}"),
            AssistantMessage::ToolResult {
                tool,
                success,
                output,
            } => {
                let status = if *success { "ok" } else { "FAIL" };
                println!("[{tool}:{status}] {output}");
            }
            AssistantMessage::Blocked { capability, text } => {
                println!("[blocked:{capability}] {text}");
            }
            AssistantMessage::Prompt { question } => println!("? {question}"),
            AssistantMessage::System { text } => println!("{text}"),
        }
    }
}

// ── JsonSink ────────────────────────────────────────────────────────────

/// Emits messages as newline-delimited JSON.
pub struct JsonSink;

impl MessageSink for JsonSink {
    fn emit(&self, msg: &AssistantMessage) {
        if let Ok(json) = serde_json::to_string(msg) {
            println!("{json}");
        }
    }
}

// ── VecSink ─────────────────────────────────────────────────────────────

/// Collects messages in memory.
pub struct VecSink {
    messages: Mutex<Vec<AssistantMessage>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<AssistantMessage> {
        self.messages.lock().expect("vec sink lock poisoned").clone()
    }

    /// Spoken text of every collected message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.messages()
            .iter()
            .map(|m| m.spoken_text().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().expect("vec sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.messages.lock().expect("vec sink lock poisoned").clear();
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSink for VecSink {
    fn emit(&self, msg: &AssistantMessage) {
        self.messages
            .lock()
            .expect("vec sink lock poisoned")
            .push(msg.clone());
    }
}
