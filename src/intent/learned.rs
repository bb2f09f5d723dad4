//! Learned tier: asks an inference backend to map text onto the intent schema.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::llm::{InferenceBackend, extract_json};
use crate::tool::ToolSignature;

use super::{INTENT_SCHEMA, Intent};

const PREAMBLE: &str = "You are the intent parser of a personal desktop assistant. \
Map the user's request to exactly one JSON object from the schema below. \
Reply with the JSON object only.";

const RULES: &str = "RULES:\n\
1. Remove politeness phrases (please, could you, thanks).\n\
2. 'tell me a joke in kannada' -> {\"type\": \"joke\", \"language\": \"kannada\"}.\n\
3. 'who is X' -> {\"type\": \"research_topic\", \"query\": \"who is X\"}.\n\
4. 'click picture' -> {\"type\": \"vision_capture\"}.\n\
5. Use the tool_name form only for catalog tools no intent type covers.\n\
6. If nothing fits, answer {\"type\": \"unknown\"}.";

/// Fallback resolver backed by an external model.
pub struct LearnedResolver {
    backend: Arc<dyn InferenceBackend>,
    system_prompt: String,
}

impl LearnedResolver {
    /// Build a resolver whose prompt embeds the given tool catalog.
    pub fn new(backend: Arc<dyn InferenceBackend>, catalog: &[ToolSignature]) -> Self {
        Self {
            backend,
            system_prompt: build_system_prompt(catalog),
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Ask the model for an intent.
    ///
    /// Transport errors, replies without a JSON object and objects that do
    /// not validate against the intent union all come back as `None`.
    pub fn resolve(&self, text: &str) -> Option<Intent> {
        let prompt = format!("USER INPUT: \"{text}\"");
        let reply = match self.backend.generate(&prompt, Some(&self.system_prompt)) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "learned resolver request failed");
                return None;
            }
        };

        let Some(json) = extract_json(&reply) else {
            tracing::warn!(reply = %reply, "learned resolver reply has no JSON object");
            return None;
        };
        let value: serde_json::Value = match serde_json::from_str(json) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "learned resolver reply is not valid JSON");
                return None;
            }
        };

        match Intent::from_value(value) {
            Some(Intent::Unknown { .. }) => Some(Intent::unknown(text)),
            Some(intent) => Some(intent),
            None => {
                tracing::warn!(json = %json, "learned resolver proposed an invalid intent");
                None
            }
        }
    }
}

impl std::fmt::Debug for LearnedResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LearnedResolver")
            .field("prompt_len", &self.system_prompt.len())
            .finish()
    }
}

fn build_system_prompt(catalog: &[ToolSignature]) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\nTOOL CATALOG:\n");
    for sig in catalog {
        let params: Vec<String> = sig
            .parameters
            .iter()
            .map(|p| {
                if p.required {
                    p.name.clone()
                } else {
                    format!("{}?", p.name)
                }
            })
            .collect();
        let _ = writeln!(
            prompt,
            "- {}({}): {}",
            sig.name,
            params.join(", "),
            sig.description
        );
    }
    prompt.push_str("\nINTENT SCHEMA:\n");
    prompt.push_str(INTENT_SCHEMA);
    prompt.push_str("\n\n");
    prompt.push_str(RULES);
    prompt
}
