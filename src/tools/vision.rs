//! Camera worker control, photo capture and scene description.

use crate::tool::{
    DangerLevel, Injected, Tool, ToolContext, ToolError, ToolInput, ToolParam, ToolResult,
    ToolSignature,
};

const DEFAULT_MODE: &str = "monitoring";

pub struct VisionControlTool;

impl Tool for VisionControlTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "control_vision_system".into(),
            description: "Start or stop the vision system, optionally in a given mode.".into(),
            parameters: vec![
                ToolParam::required("action", "start or stop."),
                ToolParam::optional(
                    "mode",
                    "monitoring, keyboard, mouse, drawing, gestures or counting.",
                ),
            ],
            injected: vec![Injected::Vision],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, ctx: &ToolContext, input: ToolInput) -> ToolResult<String> {
        const NAME: &str = "control_vision_system";
        let action = input.require("action", NAME)?.trim().to_lowercase();
        let vision = ctx.vision(NAME)?;
        match action.as_str() {
            "start" => {
                let mode = input.get("mode").map(str::trim).filter(|m| !m.is_empty());
                let mode = mode.unwrap_or(DEFAULT_MODE);
                vision.start(mode).map_err(|e| ToolError::execution(NAME, e))?;
                Ok(format!("Vision system started in {mode} mode."))
            }
            "stop" => {
                vision.stop().map_err(|e| ToolError::execution(NAME, e))?;
                Ok("Vision system stopped.".into())
            }
            other => Err(ToolError::ArgumentMismatch {
                tool: NAME.into(),
                detail: format!("invalid vision action \"{other}\""),
            }),
        }
    }
}

pub struct CapturePhotoTool;

impl Tool for CapturePhotoTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "capture_photo".into(),
            description: "Take a photo with the camera.".into(),
            parameters: vec![],
            injected: vec![Injected::Vision],
            danger: DangerLevel::Cautious,
        }
    }

    fn execute(&self, ctx: &ToolContext, _input: ToolInput) -> ToolResult<String> {
        let path = ctx
            .vision("capture_photo")?
            .capture()
            .map_err(|e| ToolError::execution("capture_photo", format!("Failed to capture photo: {e}")))?;
        Ok(format!("Photo captured and saved as {}", path.display()))
    }
}

pub struct DescribeSceneTool;

impl Tool for DescribeSceneTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "describe_scene".into(),
            description: "Describe what the camera currently sees.".into(),
            parameters: vec![],
            injected: vec![Injected::Vision],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, ctx: &ToolContext, _input: ToolInput) -> ToolResult<String> {
        ctx.vision("describe_scene")?
            .describe()
            .map_err(|e| ToolError::execution("describe_scene", e))
    }
}
