//! Policy veto for prohibited power actions and shell commands.

use crate::config::ComplianceSettings;
use crate::intent::Intent;
use crate::tool::PowerAction;

use super::Capability;

#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    prohibited_actions: Vec<String>,
    prohibited_commands: Vec<String>,
}

impl ComplianceEngine {
    pub fn new(settings: &ComplianceSettings) -> Self {
        Self {
            prohibited_actions: settings
                .prohibited_actions
                .iter()
                .map(|a| canonical_action(a))
                .collect(),
            prohibited_commands: settings
                .prohibited_commands
                .iter()
                .map(|c| c.to_lowercase())
                .collect(),
        }
    }

    fn action_allowed(&self, action: &str) -> bool {
        !self.prohibited_actions.contains(&canonical_action(action))
    }

    fn command_allowed(&self, command: &str) -> bool {
        let command = command.to_lowercase();
        !self
            .prohibited_commands
            .iter()
            .any(|fragment| command.contains(fragment.as_str()))
    }
}

/// Power aliases ("poweroff", "reboot") collapse onto the action they run.
fn canonical_action(action: &str) -> String {
    match action.parse::<PowerAction>() {
        Ok(power) => power.to_string(),
        Err(_) => action.trim().to_lowercase(),
    }
}

impl Capability for ComplianceEngine {
    fn name(&self) -> &str {
        "compliance"
    }

    fn check_compliance(&self, intent: &Intent) -> bool {
        match intent {
            Intent::SystemControl { action } => self.action_allowed(action),
            Intent::SystemCommand { command } => self.command_allowed(command),
            Intent::ToolCall {
                tool_name,
                arguments,
            } => match tool_name.as_str() {
                "control_system_power" => arguments
                    .get("action")
                    .is_none_or(|a| self.action_allowed(a)),
                "execute_system_command" => arguments
                    .get("command")
                    .is_none_or(|c| self.command_allowed(c)),
                _ => true,
            },
            _ => true,
        }
    }
}
