//! Live collaborators handed to tools.
//!
//! [`ContextProviders`] holds everything the dispatcher can inject; for each
//! call it builds a [`ToolContext`] carrying only what the tool declared.
//! [`Desktop`] and [`VisionHandle`] are the seams to the operating system and
//! the camera worker.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::AssistantConfig;
use crate::llm::InferenceBackend;

use super::{Injected, ToolError, ToolResult};

/// Handle to the camera/gesture worker.
pub trait VisionHandle: Send + Sync {
    /// Start (or switch) the worker into `mode`.
    fn start(&self, mode: &str) -> io::Result<()>;
    fn stop(&self) -> io::Result<()>;
    fn is_running(&self) -> bool;
    /// Save the current frame; returns where it was written.
    fn capture(&self) -> io::Result<PathBuf>;
    /// Describe what the camera currently sees.
    fn describe(&self) -> io::Result<String>;
}

/// Direction for volume control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeDirection {
    Up,
    Down,
    Mute,
}

impl FromStr for VolumeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" | "increase" => Ok(Self::Up),
            "down" | "decrease" => Ok(Self::Down),
            "mute" => Ok(Self::Mute),
            other => Err(format!("unknown volume direction \"{other}\"")),
        }
    }
}

/// Machine power-state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Restart,
    Sleep,
}

impl FromStr for PowerAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shutdown" | "shut down" | "poweroff" => Ok(Self::Shutdown),
            "restart" | "reboot" => Ok(Self::Restart),
            "sleep" | "suspend" => Ok(Self::Sleep),
            other => Err(format!("unknown power action \"{other}\"")),
        }
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::Restart => write!(f, "restart"),
            Self::Sleep => write!(f, "sleep"),
        }
    }
}

/// Desktop side effects.
pub trait Desktop: Send + Sync {
    fn open_url(&self, url: &str) -> io::Result<()>;
    /// Start an application from its launch command line.
    fn launch(&self, command: &str) -> io::Result<()>;
    fn type_text(&self, text: &str) -> io::Result<()>;
    fn volume(&self, direction: VolumeDirection) -> io::Result<()>;
    fn power(&self, action: PowerAction) -> io::Result<()>;
}

/// [`Desktop`] backed by the usual freedesktop command-line utilities.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDesktop;

impl SystemDesktop {
    fn spawn(program: &str, args: &[&str]) -> io::Result<()> {
        tracing::debug!(program, ?args, "spawning desktop command");
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
    }

    fn run(program: &str, args: &[&str]) -> io::Result<()> {
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("{program} exited with {status}")))
        }
    }
}

impl Desktop for SystemDesktop {
    fn open_url(&self, url: &str) -> io::Result<()> {
        if cfg!(target_os = "macos") {
            Self::spawn("open", &[url])
        } else {
            Self::spawn("xdg-open", &[url])
        }
    }

    fn launch(&self, command: &str) -> io::Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty launch command"))?;
        let args: Vec<&str> = parts.collect();
        Self::spawn(program, &args)
    }

    fn type_text(&self, text: &str) -> io::Result<()> {
        Self::run("xdotool", &["type", "--delay", "20", "--", text])
    }

    fn volume(&self, direction: VolumeDirection) -> io::Result<()> {
        let args: &[&str] = match direction {
            VolumeDirection::Up => &["set-sink-volume", "@DEFAULT_SINK@", "+10%"],
            VolumeDirection::Down => &["set-sink-volume", "@DEFAULT_SINK@", "-10%"],
            VolumeDirection::Mute => &["set-sink-mute", "@DEFAULT_SINK@", "toggle"],
        };
        Self::run("pactl", args)
    }

    fn power(&self, action: PowerAction) -> io::Result<()> {
        let verb = match action {
            PowerAction::Shutdown => "poweroff",
            PowerAction::Restart => "reboot",
            PowerAction::Sleep => "suspend",
        };
        Self::run("systemctl", &[verb])
    }
}

/// Everything the dispatcher is able to inject.
#[derive(Clone)]
pub struct ContextProviders {
    pub config: Arc<AssistantConfig>,
    pub vision: Option<Arc<dyn VisionHandle>>,
    pub generator: Option<Arc<dyn InferenceBackend>>,
}

impl ContextProviders {
    pub fn new(config: Arc<AssistantConfig>) -> Self {
        Self {
            config,
            vision: None,
            generator: None,
        }
    }

    pub fn with_vision(mut self, vision: Arc<dyn VisionHandle>) -> Self {
        self.vision = Some(vision);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn InferenceBackend>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the context for a tool declaring `injected`.
    ///
    /// Declared injections with no live provider stay absent; the tool sees
    /// [`ToolError::MissingContext`] when it asks for one.
    pub fn context_for(&self, injected: &[Injected]) -> ToolContext {
        let mut ctx = ToolContext::empty();
        for &wanted in injected {
            match wanted {
                Injected::Config => ctx.config = Some(Arc::clone(&self.config)),
                Injected::Vision => ctx.vision = self.vision.clone(),
                Injected::Generator => ctx.generator = self.generator.clone(),
            }
        }
        ctx
    }

    /// Declared injections that have no live provider.
    pub fn unavailable(&self, injected: &[Injected]) -> Vec<Injected> {
        injected
            .iter()
            .copied()
            .filter(|i| match i {
                Injected::Config => false,
                Injected::Vision => self.vision.is_none(),
                Injected::Generator => self.generator.is_none(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ContextProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProviders")
            .field("vision", &self.vision.is_some())
            .field("generator", &self.generator.is_some())
            .finish()
    }
}

/// Per-call context: only the injections the tool declared are present.
#[derive(Clone, Default)]
pub struct ToolContext {
    config: Option<Arc<AssistantConfig>>,
    vision: Option<Arc<dyn VisionHandle>>,
    generator: Option<Arc<dyn InferenceBackend>>,
}

impl ToolContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn config(&self, tool: &str) -> ToolResult<&AssistantConfig> {
        self.config.as_deref().ok_or_else(|| missing(tool, Injected::Config))
    }

    pub fn vision(&self, tool: &str) -> ToolResult<&dyn VisionHandle> {
        self.vision.as_deref().ok_or_else(|| missing(tool, Injected::Vision))
    }

    pub fn generator(&self, tool: &str) -> ToolResult<&dyn InferenceBackend> {
        self.generator
            .as_deref()
            .ok_or_else(|| missing(tool, Injected::Generator))
    }
}

fn missing(tool: &str, what: Injected) -> ToolError {
    ToolError::MissingContext {
        tool: tool.into(),
        name: what.param_name().into(),
    }
}
