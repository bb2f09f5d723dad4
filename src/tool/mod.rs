//! Tool system: named actions with declared parameters and runtime registration.
//!
//! Each action implements the [`Tool`] trait and is registered in a
//! [`ToolRegistry`]. Live collaborators a tool needs at call time
//! (configuration, the vision subsystem, a text generator) are declared as
//! [`Injected`] parameters and supplied by the dispatcher via a
//! [`ToolContext`], never by the caller.

pub mod context;

use std::collections::HashMap;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use context::{
    ContextProviders, Desktop, PowerAction, SystemDesktop, ToolContext, VisionHandle,
    VolumeDirection,
};

/// Errors raised by tool invocations.
#[derive(Debug, Error, Diagnostic)]
pub enum ToolError {
    #[error("argument mismatch for tool \"{tool}\": {detail}")]
    #[diagnostic(
        code(steward::tool::argument_mismatch),
        help("Check the tool catalog (`steward tools`) for the parameters this tool accepts.")
    )]
    ArgumentMismatch { tool: String, detail: String },

    #[error("tool \"{tool}\" failed: {message}")]
    #[diagnostic(code(steward::tool::execution))]
    Execution { tool: String, message: String },

    #[error("tool \"{tool}\" needs {name}, which is not available")]
    #[diagnostic(
        code(steward::tool::missing_context),
        help("Enable the subsystem this tool depends on (vision, language model).")
    )]
    MissingContext { tool: String, name: String },
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

impl ToolError {
    pub fn execution(tool: &str, message: impl std::fmt::Display) -> Self {
        Self::Execution {
            tool: tool.into(),
            message: message.to_string(),
        }
    }
}

/// Danger level of a tool, ordered from least to most dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DangerLevel {
    /// No side effects, read-only or pure computation.
    Safe,
    /// Minor side effects or external reads that merit awareness.
    Cautious,
    /// Significant side effects (desktop input, downloads, stored notes).
    Dangerous,
    /// Power state changes and arbitrary execution. Always confirmed first.
    Critical,
}

impl DangerLevel {
    pub fn requires_confirmation(self) -> bool {
        self == Self::Critical
    }
}

impl std::fmt::Display for DangerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Cautious => write!(f, "Cautious"),
            Self::Dangerous => write!(f, "Dangerous"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// Reserved parameters the dispatcher fills from live system context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Injected {
    /// The assistant configuration.
    Config,
    /// Handle to the vision subsystem.
    Vision,
    /// Text-generation callback.
    Generator,
}

impl Injected {
    pub const ALL: [Injected; 3] = [Self::Config, Self::Vision, Self::Generator];

    /// The reserved parameter name.
    pub fn param_name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Vision => "vision_system",
            Self::Generator => "llm_generator",
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        Self::ALL.iter().any(|i| i.param_name() == name)
    }
}

/// Description of a tool's interface.
#[derive(Debug, Clone)]
pub struct ToolSignature {
    /// Unique name of the tool.
    pub name: String,
    /// What this tool does.
    pub description: String,
    /// Caller-supplied parameters.
    pub parameters: Vec<ToolParam>,
    /// Reserved parameters filled by the dispatcher.
    pub injected: Vec<Injected>,
    pub danger: DangerLevel,
}

/// A single parameter in a tool's signature.
#[derive(Debug, Clone)]
pub struct ToolParam {
    /// Parameter name.
    pub name: String,
    /// What this parameter controls.
    pub description: String,
    /// Whether this parameter must be provided.
    pub required: bool,
}

impl ToolParam {
    pub fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
        }
    }
}

impl ToolSignature {
    /// Check caller arguments against the declared parameters.
    ///
    /// Missing required parameters and parameters the tool does not declare
    /// are both argument mismatches.
    pub fn check_arguments(&self, input: &ToolInput) -> ToolResult<()> {
        if let Some(missing) = self
            .parameters
            .iter()
            .find(|p| p.required && input.get(&p.name).is_none_or(|v| v.trim().is_empty()))
        {
            return Err(ToolError::ArgumentMismatch {
                tool: self.name.clone(),
                detail: format!("missing required parameter: {}", missing.name),
            });
        }

        let mut unexpected: Vec<&str> = input
            .params
            .keys()
            .map(String::as_str)
            .filter(|k| !self.parameters.iter().any(|p| p.name == *k))
            .collect();
        if !unexpected.is_empty() {
            unexpected.sort_unstable();
            return Err(ToolError::ArgumentMismatch {
                tool: self.name.clone(),
                detail: format!("unexpected parameter: {}", unexpected.join(", ")),
            });
        }
        Ok(())
    }
}

/// Input to a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolInput {
    /// Named parameters.
    pub params: HashMap<String, String>,
}

impl ToolInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Get a parameter value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    /// Get a required parameter, returning an argument mismatch if missing.
    pub fn require(&self, name: &str, tool_name: &str) -> ToolResult<&str> {
        self.get(name).ok_or(ToolError::ArgumentMismatch {
            tool: tool_name.into(),
            detail: format!("missing required parameter: {name}"),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ToolInput {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A named action the assistant can perform.
pub trait Tool: Send + Sync {
    /// Describe this tool's interface.
    fn signature(&self) -> ToolSignature;

    /// Run the tool. The returned text is shown to the user.
    fn execute(&self, ctx: &ToolContext, input: ToolInput) -> ToolResult<String>;
}

/// Registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. If a tool with the same name exists, it is replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let sig = tool.signature();
        self.tools.insert(sig.name.clone(), tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All registered tool signatures, sorted by name.
    pub fn list(&self) -> Vec<ToolSignature> {
        let mut sigs: Vec<ToolSignature> = self.tools.values().map(|t| t.signature()).collect();
        sigs.sort_by(|a, b| a.name.cmp(&b.name));
        sigs
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}
