//! Notes and preferences kept in the assistant store.

use std::sync::Arc;

use crate::store::AssistantStore;
use crate::tool::{
    DangerLevel, Tool, ToolContext, ToolError, ToolInput, ToolParam, ToolResult, ToolSignature,
};

/// Preference keys are snake_case: "user name" and "User_Name" are one key.
pub fn preference_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

pub struct SaveNoteTool {
    store: Arc<dyn AssistantStore>,
}

impl SaveNoteTool {
    pub fn new(store: Arc<dyn AssistantStore>) -> Self {
        Self { store }
    }
}

impl Tool for SaveNoteTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "save_note".into(),
            description: "Remember a note for later.".into(),
            parameters: vec![ToolParam::required("note", "What to remember.")],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let note = input.require("note", "save_note")?.trim();
        self.store
            .save_note(note)
            .map_err(|e| ToolError::execution("save_note", format!("Could not save the note: {e}")))?;
        Ok(format!("I will remember that: {note}"))
    }
}

pub struct GetNotesTool {
    store: Arc<dyn AssistantStore>,
}

impl GetNotesTool {
    pub fn new(store: Arc<dyn AssistantStore>) -> Self {
        Self { store }
    }
}

impl Tool for GetNotesTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "get_notes".into(),
            description: "Recall the most recent notes (default: the last one).".into(),
            parameters: vec![ToolParam::optional("limit", "How many notes to recall.")],
            injected: vec![],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let limit: usize = input
            .get("limit")
            .and_then(|l| l.parse().ok())
            .filter(|&l| l > 0)
            .unwrap_or(1);
        let notes = self
            .store
            .recent_notes(limit)
            .map_err(|e| ToolError::execution("get_notes", e))?;
        Ok(match notes.as_slice() {
            [] => "I don't have any memories yet.".into(),
            [only] => format!("You told me: {}", only.text),
            many => {
                let texts: Vec<&str> = many.iter().map(|n| n.text.as_str()).collect();
                format!("You told me: {}", texts.join("; "))
            }
        })
    }
}

pub struct SetPreferenceTool {
    store: Arc<dyn AssistantStore>,
}

impl SetPreferenceTool {
    pub fn new(store: Arc<dyn AssistantStore>) -> Self {
        Self { store }
    }
}

impl Tool for SetPreferenceTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "set_preference".into(),
            description: "Store a user preference such as user_name.".into(),
            parameters: vec![
                ToolParam::required("key", "Preference name."),
                ToolParam::required("value", "Preference value."),
            ],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "set_preference";
        let key = preference_key(input.require("key", NAME)?);
        let value = input.require("value", NAME)?.trim();
        self.store
            .set_preference(&key, value)
            .map_err(|e| ToolError::execution(NAME, e))?;
        Ok(format!("Got it. Your {} is {value}.", key.replace('_', " ")))
    }
}
