//! Power state, shell commands, volume and keyboard input.
//!
//! Power and shell are [`DangerLevel::Critical`]: the dispatcher confirms
//! them before they run.

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::tool::{
    DangerLevel, Desktop, PowerAction, Tool, ToolContext, ToolError, ToolInput, ToolParam,
    ToolResult, ToolSignature, VolumeDirection,
};

use super::io_failure;

/// Maximum captured stdout+stderr (64 KB).
const MAX_OUTPUT_SIZE: usize = 64 * 1024;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct PowerTool {
    desktop: Arc<dyn Desktop>,
}

impl PowerTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for PowerTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "control_system_power".into(),
            description: "Shut down, restart or put the machine to sleep.".into(),
            parameters: vec![ToolParam::required(
                "action",
                "One of shutdown, restart, sleep.",
            )],
            injected: vec![],
            danger: DangerLevel::Critical,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "control_system_power";
        let action: PowerAction = input
            .require("action", NAME)?
            .parse()
            .map_err(|detail| ToolError::ArgumentMismatch {
                tool: NAME.into(),
                detail,
            })?;
        self.desktop.power(action).map_err(io_failure(NAME))?;
        Ok(match action {
            PowerAction::Shutdown => "Shutting down the system.",
            PowerAction::Restart => "Restarting the system.",
            PowerAction::Sleep => "Putting the system to sleep.",
        }
        .into())
    }
}

/// Run a shell command with a timeout and a captured-output limit.
pub struct ShellTool;

impl ShellTool {
    /// Drain a pipe on its own thread, keeping at most [`MAX_OUTPUT_SIZE`] bytes.
    fn drain<R: Read + Send + 'static>(stream: Option<R>) -> JoinHandle<String> {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let mut truncated = false;
            if let Some(mut s) = stream {
                let mut chunk = [0u8; 8192];
                loop {
                    match s.read(&mut chunk) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let room = MAX_OUTPUT_SIZE - buf.len();
                            if n > room {
                                truncated = true;
                            }
                            buf.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            }
            let mut text = String::from_utf8_lossy(&buf).trim_end().to_string();
            if truncated {
                text.push_str("... [truncated]");
            }
            text
        })
    }
}

impl Tool for ShellTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "execute_system_command".into(),
            description: "Run a shell command (30 s timeout, 64 KB output limit).".into(),
            parameters: vec![
                ToolParam::required("command", "Shell command to run."),
                ToolParam::optional("timeout", "Timeout in seconds (default: 30)."),
            ],
            injected: vec![],
            danger: DangerLevel::Critical,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "execute_system_command";
        let command = input.require("command", NAME)?;
        let timeout_secs: u64 = input
            .get("timeout")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::execution(NAME, format!("failed to spawn shell: {e}")))?;

        let stdout = Self::drain(child.stdout.take());
        let stderr = Self::drain(child.stderr.take());

        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::execution(
                        NAME,
                        format!("command timed out after {timeout_secs}s: {command}"),
                    ));
                }
                Ok(None) => thread::sleep(Duration::from_millis(50)),
                Err(e) => {
                    return Err(ToolError::execution(
                        NAME,
                        format!("failed to wait on command: {e}"),
                    ));
                }
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        tracing::info!(command, code = ?status.code(), "shell command finished");

        if status.success() {
            Ok(if stdout.is_empty() {
                format!("Ran: {command}")
            } else {
                stdout
            })
        } else {
            let code = status.code().unwrap_or(-1);
            let detail = if stderr.is_empty() { stdout } else { stderr };
            Err(ToolError::execution(
                NAME,
                format!("exit code {code}: {detail}"),
            ))
        }
    }
}

pub struct VolumeTool {
    desktop: Arc<dyn Desktop>,
}

impl VolumeTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for VolumeTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "control_system_volume".into(),
            description: "Raise, lower or mute the system volume.".into(),
            parameters: vec![ToolParam::required("direction", "One of up, down, mute.")],
            injected: vec![],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "control_system_volume";
        let direction: VolumeDirection = input
            .require("direction", NAME)?
            .parse()
            .map_err(|detail| ToolError::ArgumentMismatch {
                tool: NAME.into(),
                detail,
            })?;
        self.desktop.volume(direction).map_err(io_failure(NAME))?;
        Ok(match direction {
            VolumeDirection::Up => "Volume up.",
            VolumeDirection::Down => "Volume down.",
            VolumeDirection::Mute => "Volume muted.",
        }
        .into())
    }
}

pub struct TypeTextTool {
    desktop: Arc<dyn Desktop>,
}

impl TypeTextTool {
    pub fn new(desktop: Arc<dyn Desktop>) -> Self {
        Self { desktop }
    }
}

impl Tool for TypeTextTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "type_text".into(),
            description: "Type text into the focused window.".into(),
            parameters: vec![ToolParam::required("text", "Text to type.")],
            injected: vec![],
            danger: DangerLevel::Dangerous,
        }
    }

    fn execute(&self, _ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        let text = input.require("text", "type_text")?;
        self.desktop
            .type_text(text)
            .map_err(io_failure("type_text"))?;
        Ok(format!("Typed: {text}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::RecordingDesktop;

    #[test]
    fn power_parses_action() {
        let desktop = Arc::new(RecordingDesktop::default());
        let tool = PowerTool::new(desktop.clone());
        let out = tool
            .execute(&ToolContext::empty(), ToolInput::new().with_param("action", "reboot"))
            .unwrap();
        assert_eq!(out, "Restarting the system.");
        assert_eq!(desktop.calls(), vec!["power restart"]);

        let err = tool
            .execute(&ToolContext::empty(), ToolInput::new().with_param("action", "explode"))
            .unwrap_err();
        assert!(matches!(err, ToolError::ArgumentMismatch { .. }));
        assert_eq!(desktop.calls().len(), 1);
    }

    #[test]
    fn critical_tools_are_marked() {
        let desktop: Arc<dyn Desktop> = Arc::new(RecordingDesktop::default());
        assert!(PowerTool::new(desktop.clone()).signature().danger.requires_confirmation());
        assert!(ShellTool.signature().danger.requires_confirmation());
        assert!(!VolumeTool::new(desktop).signature().danger.requires_confirmation());
    }

    #[cfg(unix)]
    #[test]
    fn shell_captures_stdout() {
        let out = ShellTool
            .execute(
                &ToolContext::empty(),
                ToolInput::new().with_param("command", "echo hello"),
            )
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn shell_reports_failure_with_code() {
        let err = ShellTool
            .execute(
                &ToolContext::empty(),
                ToolInput::new().with_param("command", "echo oops >&2; exit 3"),
            )
            .unwrap_err();
        assert_eq!(err.to_string(), "tool \"execute_system_command\" failed: exit code 3: oops");
    }

    #[cfg(unix)]
    #[test]
    fn shell_times_out() {
        let err = ShellTool
            .execute(
                &ToolContext::empty(),
                ToolInput::new()
                    .with_param("command", "sleep 5")
                    .with_param("timeout", "0"),
            )
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_output_beyond_the_pipe_buffer_is_truncated() {
        let out = ShellTool
            .execute(
                &ToolContext::empty(),
                ToolInput::new()
                    .with_param("command", "head -c 200000 /dev/zero | tr '\\0' a")
                    .with_param("timeout", "10"),
            )
            .unwrap();
        assert!(out.ends_with("... [truncated]"));
        assert_eq!(out.len(), MAX_OUTPUT_SIZE + "... [truncated]".len());
        assert!(out.starts_with("aaaa"));
    }

    #[test]
    fn volume_and_typing_reach_desktop() {
        let desktop = Arc::new(RecordingDesktop::default());
        VolumeTool::new(desktop.clone())
            .execute(&ToolContext::empty(), ToolInput::new().with_param("direction", "mute"))
            .unwrap();
        TypeTextTool::new(desktop.clone())
            .execute(&ToolContext::empty(), ToolInput::new().with_param("text", "hi"))
            .unwrap();
        assert_eq!(desktop.calls(), vec!["volume Mute", "type hi"]);
    }
}
