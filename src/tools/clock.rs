//! Current time and date.

use chrono::{DateTime, Local, TimeZone};

use crate::tool::{DangerLevel, Tool, ToolContext, ToolInput, ToolResult, ToolSignature};

/// "The time is 03:04 PM."
pub fn spoken_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("The time is {}.", now.format("%I:%M %p"))
}

/// "Today is October 19, 2026."
pub fn spoken_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("Today is {}.", now.format("%B %d, %Y"))
}

pub struct TimeTool;

impl Tool for TimeTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "get_current_time".into(),
            description: "Tell the current local time.".into(),
            parameters: vec![],
            injected: vec![],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, _ctx: &ToolContext, _input: ToolInput) -> ToolResult<String> {
        Ok(spoken_time(&Local::now()))
    }
}

pub struct DateTool;

impl Tool for DateTool {
    fn signature(&self) -> ToolSignature {
        ToolSignature {
            name: "get_current_date".into(),
            description: "Tell today's date.".into(),
            parameters: vec![],
            injected: vec![],
            danger: DangerLevel::Safe,
        }
    }

    fn execute(&self, _ctx: &ToolContext, _input: ToolInput) -> ToolResult<String> {
        Ok(spoken_date(&Local::now()))
    }
}
