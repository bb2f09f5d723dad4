//! Guarded tool dispatch.
//!
//! The [`Dispatcher`] turns a resolved [`Intent`] into a registry call:
//!
//! 1. map the intent to a tool name and arguments, and look the tool up;
//! 2. for [`DangerLevel::Critical`](crate::tool::DangerLevel) tools, ask the
//!    [`Confirmer`] and stop unless the answer contains an explicit "yes";
//! 3. drop caller-supplied reserved names and check the rest against the
//!    declared parameters;
//! 4. build a [`ToolContext`](crate::tool::ToolContext) holding the live
//!    collaborators the tool declared (a tool asking for an absent one
//!    fails with a missing-context error);
//! 5. run the tool inside a failure boundary.
//!
//! Every path ends in an [`Outcome`]; nothing propagates to the caller.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::intent::{Intent, ToolCall};
use crate::message::{AssistantMessage, MessageSink};
use crate::tool::{ContextProviders, Injected, ToolError, ToolInput, ToolRegistry};

/// Final result of handling one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// The tool ran; `message` is its user-facing output.
    Completed { tool: String, message: String },
    /// No tool corresponds to the intent.
    NotUnderstood { tool: Option<String> },
    /// A capability vetoed the intent.
    Blocked { capability: String },
    /// A dangerous action was declined or not confirmed in time.
    Cancelled { tool: String },
    /// The arguments did not fit the tool's parameters.
    ArgumentMismatch { tool: String, detail: String },
    /// The tool failed while running.
    ToolFailed { tool: String, detail: String },
}

impl Outcome {
    /// Stable snake_case label, used in audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::NotUnderstood { .. } => "not_understood",
            Self::Blocked { .. } => "blocked",
            Self::Cancelled { .. } => "cancelled",
            Self::ArgumentMismatch { .. } => "argument_mismatch",
            Self::ToolFailed { .. } => "tool_failed",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Tool the outcome concerns, if one was resolved.
    pub fn tool(&self) -> Option<&str> {
        match self {
            Self::Completed { tool, .. }
            | Self::Cancelled { tool }
            | Self::ArgumentMismatch { tool, .. }
            | Self::ToolFailed { tool, .. } => Some(tool),
            Self::NotUnderstood { tool } => tool.as_deref(),
            Self::Blocked { .. } => None,
        }
    }

    /// User-facing text.
    pub fn message(&self) -> String {
        match self {
            Self::Completed { message, .. } => message.clone(),
            Self::NotUnderstood { .. } => "Sorry, I didn't understand that.".into(),
            Self::Blocked { capability } => {
                format!("I can't do that. The action was blocked by the {capability} policy.")
            }
            Self::Cancelled { .. } => "Okay, cancelled.".into(),
            Self::ArgumentMismatch { tool, detail } => {
                format!("Argument mismatch for tool '{tool}': {detail}")
            }
            Self::ToolFailed { tool, detail } => {
                format!("An error occurred while executing '{tool}': {detail}")
            }
        }
    }

    /// The message to surface for this outcome.
    pub fn to_message(&self) -> AssistantMessage {
        match self {
            Self::Blocked { capability } => AssistantMessage::Blocked {
                capability: capability.clone(),
                text: self.message(),
            },
            Self::NotUnderstood { .. } | Self::Cancelled { .. } => {
                AssistantMessage::reply(self.message())
            }
            Self::Completed { tool, .. }
            | Self::ArgumentMismatch { tool, .. }
            | Self::ToolFailed { tool, .. } => {
                AssistantMessage::tool_result(tool, self.is_completed(), self.message())
            }
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

// ── Confirmation ────────────────────────────────────────────────────────

/// Blocking yes/no exchange with the user.
pub trait Confirmer: Send + Sync {
    /// Show `prompt` and wait up to `timeout` for an answer.
    ///
    /// `None` means no answer arrived in time.
    fn ask(&self, prompt: &str, timeout: Duration) -> Option<String>;
}

/// Whether `answer` contains an explicit "yes" token.
pub fn is_affirmative(answer: &str) -> bool {
    answer
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("yes"))
}

/// Build the confirmation question, naming the tool and its arguments as given.
pub fn confirmation_prompt(tool: &str, arguments: &BTreeMap<String, String>) -> String {
    if arguments.is_empty() {
        return format!("Are you sure you want to run {tool}? Say yes to confirm.");
    }
    let args: Vec<String> = arguments
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect();
    format!(
        "Are you sure you want to run {tool} with {}? Say yes to confirm.",
        args.join(", ")
    )
}

/// Emits the prompt to a sink and waits on a channel of user lines.
///
/// Lines already queued when the question is asked are discarded, so only
/// an answer typed after the prompt counts.
pub struct ChannelConfirmer {
    sink: Arc<dyn MessageSink>,
    answers: Arc<Mutex<Receiver<String>>>,
}

impl ChannelConfirmer {
    pub fn new(sink: Arc<dyn MessageSink>, answers: Receiver<String>) -> Self {
        Self::shared(sink, Arc::new(Mutex::new(answers)))
    }

    /// Share the line channel with the input loop; the loop must not hold
    /// the lock while an utterance is being handled.
    pub fn shared(sink: Arc<dyn MessageSink>, answers: Arc<Mutex<Receiver<String>>>) -> Self {
        Self { sink, answers }
    }
}

impl Confirmer for ChannelConfirmer {
    fn ask(&self, prompt: &str, timeout: Duration) -> Option<String> {
        let answers = self.answers.lock().expect("confirmer lock poisoned");
        let stale = answers.try_iter().count();
        if stale > 0 {
            tracing::info!(lines = stale, "discarded input typed before the confirmation prompt");
        }
        self.sink.emit(&AssistantMessage::prompt(prompt));
        match answers.recv_timeout(timeout) {
            Ok(answer) => Some(answer),
            Err(RecvTimeoutError::Timeout) => {
                tracing::info!(timeout_secs = timeout.as_secs(), "confirmation timed out");
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

/// Answers every question with silence.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

impl Confirmer for DenyAll {
    fn ask(&self, _prompt: &str, _timeout: Duration) -> Option<String> {
        None
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────

/// Runs intents against the tool registry.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    providers: ContextProviders,
    confirmer: Arc<dyn Confirmer>,
    confirm_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        providers: ContextProviders,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let confirm_timeout =
            Duration::from_secs(providers.config.dispatch.confirm_timeout_secs);
        Self {
            registry,
            providers,
            confirmer,
            confirm_timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one intent.
    pub fn execute(&self, intent: &Intent) -> Outcome {
        match intent.to_tool_call() {
            Some(call) => self.execute_call(&call),
            None => {
                tracing::debug!(intent = %intent, "intent maps to no tool");
                Outcome::NotUnderstood { tool: None }
            }
        }
    }

    /// Handle one registry-shaped call.
    pub fn execute_call(&self, call: &ToolCall) -> Outcome {
        let name = call.tool_name.as_str();
        let Some(tool) = self.registry.get(name) else {
            tracing::debug!(tool = name, "no such tool");
            return Outcome::NotUnderstood {
                tool: Some(name.to_string()),
            };
        };
        let signature = tool.signature();

        if signature.danger.requires_confirmation() {
            let prompt = confirmation_prompt(name, &call.arguments);
            tracing::info!(tool = name, danger = %signature.danger, "requesting confirmation");
            let answer = self.confirmer.ask(&prompt, self.confirm_timeout);
            if !answer.as_deref().is_some_and(is_affirmative) {
                tracing::info!(tool = name, "dangerous action cancelled");
                return Outcome::Cancelled { tool: name.into() };
            }
            tracing::info!(tool = name, "dangerous action confirmed");
        }

        let input: ToolInput = call
            .arguments
            .iter()
            .filter(|(k, _)| !Injected::is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Err(ToolError::ArgumentMismatch { detail, .. }) = signature.check_arguments(&input)
        {
            tracing::warn!(tool = name, %detail, "argument mismatch");
            return Outcome::ArgumentMismatch {
                tool: name.into(),
                detail,
            };
        }

        let ctx = self.providers.context_for(&signature.injected);

        match panic::catch_unwind(AssertUnwindSafe(|| tool.execute(&ctx, input))) {
            Ok(Ok(message)) => {
                tracing::debug!(tool = name, "tool completed");
                Outcome::Completed {
                    tool: name.into(),
                    message,
                }
            }
            Ok(Err(ToolError::ArgumentMismatch { detail, .. })) => {
                tracing::warn!(tool = name, %detail, "argument mismatch");
                Outcome::ArgumentMismatch {
                    tool: name.into(),
                    detail,
                }
            }
            Ok(Err(e)) => {
                let detail = match e {
                    ToolError::Execution { message, .. } => message,
                    other => other.to_string(),
                };
                tracing::warn!(tool = name, error = %detail, "tool failed");
                Outcome::ToolFailed {
                    tool: name.into(),
                    detail,
                }
            }
            Err(payload) => {
                let detail = panic_detail(payload.as_ref());
                tracing::warn!(tool = name, error = %detail, "tool panicked");
                Outcome::ToolFailed {
                    tool: name.into(),
                    detail,
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("providers", &self.providers)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish()
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".into()
    }
}
