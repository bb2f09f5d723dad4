//! Typed intents and the two-tier resolution pipeline.
//!
//! An utterance is first matched against ordered deterministic rules
//! ([`pattern`]); unresolved or ambiguous results escalate to an inference
//! service ([`learned`]). [`pipeline`] composes the two.

pub mod learned;
pub mod pattern;
pub mod pipeline;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use learned::LearnedResolver;
pub use pattern::PatternResolver;
pub use pipeline::{IntentPipeline, split_composite};

/// What the user wants, one variant per known intent shape.
///
/// Serialized with an internal `type` tag, so a stored intent reads like
/// `{"type": "open_something", "target": "notepad"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    Exit,
    Identity,
    Joke {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    GetTime,
    GetDate,
    OpenSomething {
        target: String,
    },
    OpenWithSearch {
        target: String,
        query: String,
    },
    PlayMusic {
        song: String,
    },
    WebSearch {
        query: String,
    },
    ResearchTopic {
        query: String,
    },
    Wikipedia {
        query: String,
    },
    Weather {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    WhatsappMsg {
        contact: String,
        msg: String,
    },
    SystemControl {
        action: String,
    },
    SystemCommand {
        command: String,
    },
    VisionControl {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode: Option<String>,
    },
    VisionCapture,
    VisionDescribe,
    KeyboardType {
        text: String,
    },
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Download {
        url: String,
    },
    Remember {
        note: String,
    },
    Recall,
    MemorySet {
        key: String,
        value: String,
    },
    StartLearning {
        skill_name: String,
    },
    StopLearning,
    ExecuteSkill {
        skill_name: String,
    },
    /// A registry-shaped proposal from the learned tier.
    ToolCall {
        tool_name: String,
        #[serde(default)]
        arguments: BTreeMap<String, String>,
    },
    Unknown {
        #[serde(default)]
        raw: String,
    },
}

/// A concrete registry invocation derived from an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: BTreeMap<String, String>,
}

impl ToolCall {
    pub fn new(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            arguments: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, name: &str, value: &str) -> Self {
        self.arguments.insert(name.to_string(), value.to_string());
        self
    }

    fn opt_arg(self, name: &str, value: Option<&String>) -> Self {
        match value {
            Some(v) => self.arg(name, v),
            None => self,
        }
    }
}

impl Intent {
    pub fn unknown(raw: impl Into<String>) -> Self {
        Self::Unknown { raw: raw.into() }
    }

    /// The serialized `type` tag of this intent.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Farewell => "farewell",
            Self::Exit => "exit",
            Self::Identity => "identity",
            Self::Joke { .. } => "joke",
            Self::GetTime => "get_time",
            Self::GetDate => "get_date",
            Self::OpenSomething { .. } => "open_something",
            Self::OpenWithSearch { .. } => "open_with_search",
            Self::PlayMusic { .. } => "play_music",
            Self::WebSearch { .. } => "web_search",
            Self::ResearchTopic { .. } => "research_topic",
            Self::Wikipedia { .. } => "wikipedia",
            Self::Weather { .. } => "weather",
            Self::WhatsappMsg { .. } => "whatsapp_msg",
            Self::SystemControl { .. } => "system_control",
            Self::SystemCommand { .. } => "system_command",
            Self::VisionControl { .. } => "vision_control",
            Self::VisionCapture => "vision_capture",
            Self::VisionDescribe => "vision_describe",
            Self::KeyboardType { .. } => "keyboard_type",
            Self::VolumeUp => "volume_up",
            Self::VolumeDown => "volume_down",
            Self::VolumeMute => "volume_mute",
            Self::Download { .. } => "download",
            Self::Remember { .. } => "remember",
            Self::Recall => "recall",
            Self::MemorySet { .. } => "memory_set",
            Self::StartLearning { .. } => "start_learning",
            Self::StopLearning => "stop_learning",
            Self::ExecuteSkill { .. } => "execute_skill",
            Self::ToolCall { .. } => "tool_call",
            Self::Unknown { .. } => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }

    /// Intents the assistant answers itself instead of dispatching.
    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Self::Greeting | Self::Farewell | Self::Exit | Self::Identity
        )
    }

    /// Every required text field is non-blank.
    ///
    /// The pattern tier only builds well-formed intents; this guards values
    /// decoded from model output.
    pub fn is_well_formed(&self) -> bool {
        let filled = |s: &str| !s.trim().is_empty();
        match self {
            Self::OpenSomething { target } => filled(target),
            Self::OpenWithSearch { target, query } => filled(target) && filled(query),
            Self::PlayMusic { song } => filled(song),
            Self::WebSearch { query } | Self::ResearchTopic { query } | Self::Wikipedia { query } => {
                filled(query)
            }
            Self::WhatsappMsg { contact, msg } => filled(contact) && filled(msg),
            Self::SystemControl { action } | Self::VisionControl { action, .. } => filled(action),
            Self::SystemCommand { command } => filled(command),
            Self::KeyboardType { text } => filled(text),
            Self::Download { url } => filled(url),
            Self::Remember { note } => filled(note),
            Self::MemorySet { key, value } => filled(key) && filled(value),
            Self::StartLearning { skill_name } | Self::ExecuteSkill { skill_name } => {
                filled(skill_name)
            }
            Self::ToolCall { tool_name, .. } => filled(tool_name),
            _ => true,
        }
    }

    /// Map an action-bearing intent onto exactly one registry call.
    ///
    /// Returns `None` for conversational, skill-control and unknown intents.
    pub fn to_tool_call(&self) -> Option<ToolCall> {
        let call = match self {
            Self::Joke { language } => ToolCall::new("tell_joke").opt_arg("language", language.as_ref()),
            Self::GetTime => ToolCall::new("get_current_time"),
            Self::GetDate => ToolCall::new("get_current_date"),
            Self::OpenSomething { target } => {
                ToolCall::new("open_application_or_website").arg("target", target)
            }
            Self::OpenWithSearch { target, query } => ToolCall::new("search_site")
                .arg("target", target)
                .arg("query", query),
            Self::PlayMusic { song } => ToolCall::new("play_music_on_youtube").arg("song_name", song),
            Self::WebSearch { query } => ToolCall::new("search_web").arg("query", query),
            Self::ResearchTopic { query } => ToolCall::new("research_topic").arg("query", query),
            Self::Wikipedia { query } => ToolCall::new("search_wikipedia").arg("query", query),
            Self::Weather { location } => {
                ToolCall::new("get_weather").opt_arg("location", location.as_ref())
            }
            Self::WhatsappMsg { contact, msg } => ToolCall::new("send_whatsapp_message")
                .arg("contact", contact)
                .arg("message", msg),
            Self::SystemControl { action } => {
                ToolCall::new("control_system_power").arg("action", action)
            }
            Self::SystemCommand { command } => {
                ToolCall::new("execute_system_command").arg("command", command)
            }
            Self::VisionControl { action, mode } => ToolCall::new("control_vision_system")
                .arg("action", action)
                .opt_arg("mode", mode.as_ref()),
            Self::VisionCapture => ToolCall::new("capture_photo"),
            Self::VisionDescribe => ToolCall::new("describe_scene"),
            Self::KeyboardType { text } => ToolCall::new("type_text").arg("text", text),
            Self::VolumeUp => ToolCall::new("control_system_volume").arg("direction", "up"),
            Self::VolumeDown => ToolCall::new("control_system_volume").arg("direction", "down"),
            Self::VolumeMute => ToolCall::new("control_system_volume").arg("direction", "mute"),
            Self::Download { url } => ToolCall::new("download_file").arg("url", url),
            Self::Remember { note } => ToolCall::new("save_note").arg("note", note),
            Self::Recall => ToolCall::new("get_notes"),
            Self::MemorySet { key, value } => ToolCall::new("set_preference")
                .arg("key", key)
                .arg("value", value),
            Self::ToolCall {
                tool_name,
                arguments,
            } => ToolCall {
                tool_name: tool_name.clone(),
                arguments: arguments.clone(),
            },
            Self::Greeting
            | Self::Farewell
            | Self::Exit
            | Self::Identity
            | Self::StartLearning { .. }
            | Self::StopLearning
            | Self::ExecuteSkill { .. }
            | Self::Unknown { .. } => return None,
        };
        Some(call)
    }

    /// Convert a decoded JSON object into an intent.
    ///
    /// Objects with a known `type` tag decode into that variant; an object
    /// without a tag but with `tool_name` becomes a [`Intent::ToolCall`], with
    /// non-string argument values rendered as JSON text. Anything else
    /// (unknown tag, missing fields, blank required values) yields `None`.
    pub fn from_value(value: serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.contains_key("type") {
            let intent: Intent = serde_json::from_value(value).ok()?;
            return intent.is_well_formed().then_some(intent);
        }

        let tool_name = object.get("tool_name")?.as_str()?.to_string();
        let arguments = object
            .get("arguments")
            .and_then(|a| a.as_object())
            .map(|args| {
                args.iter()
                    .map(|(k, v)| {
                        let rendered = match v {
                            serde_json::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), rendered)
                    })
                    .collect()
            })
            .unwrap_or_default();
        let intent = Intent::ToolCall {
            tool_name,
            arguments,
        };
        intent.is_well_formed().then_some(intent)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_tag())
    }
}

/// Fixed description of the intent shapes, embedded in learned-tier prompts.
pub const INTENT_SCHEMA: &str = r#"- {"type": "greeting"}
- {"type": "farewell"}
- {"type": "exit"}
- {"type": "identity"}
- {"type": "joke", "language": "<optional language>"}
- {"type": "get_time"}
- {"type": "get_date"}
- {"type": "open_something", "target": "<app or website>"}
- {"type": "open_with_search", "target": "<website>", "query": "<text>"}
- {"type": "play_music", "song": "<name>"}
- {"type": "web_search", "query": "<text>"}
- {"type": "research_topic", "query": "<complex topic>"}
- {"type": "wikipedia", "query": "<topic>"}
- {"type": "weather", "location": "<optional city>"}
- {"type": "whatsapp_msg", "contact": "<name>", "msg": "<message>"}
- {"type": "system_control", "action": "shutdown" | "restart" | "sleep"}
- {"type": "system_command", "command": "<shell command>"}
- {"type": "vision_control", "action": "start" | "stop", "mode": "monitoring" | "mouse" | "drawing" | "keyboard" | "gestures" | "counting"}
- {"type": "vision_capture"}
- {"type": "vision_describe"}
- {"type": "keyboard_type", "text": "<text>"}
- {"type": "volume_up"} / {"type": "volume_down"} / {"type": "volume_mute"}
- {"type": "download", "url": "<url>"}
- {"type": "remember", "note": "<text>"}
- {"type": "recall"}
- {"type": "memory_set", "key": "<key>", "value": "<value>"}
- {"type": "start_learning", "skill_name": "<name>"}
- {"type": "stop_learning"}
- {"type": "execute_skill", "skill_name": "<name>"}
- {"tool_name": "<tool from the catalog>", "arguments": {"<param>": "<value>"}}
- {"type": "unknown"}"#;
