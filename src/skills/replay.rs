//! Skill replay.

use std::time::Duration;

use crate::intent::Intent;
use crate::store::SkillStore;

/// Progress callbacks during a replay.
#[derive(Debug)]
pub enum ReplayStep<'a> {
    /// The skill was found and is about to run.
    Begin { name: &'a str, total: usize },
    /// Run one stored step.
    Step { index: usize, intent: &'a Intent },
}

/// How a replay ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayReport {
    Completed { name: String, steps: usize },
    NotFound { name: String },
    LoadFailed { name: String, error: String },
}

impl ReplayReport {
    pub fn message(&self) -> String {
        match self {
            Self::Completed { .. } => "Skill execution complete.".into(),
            Self::NotFound { name } => format!("I don't know the skill {name} yet."),
            Self::LoadFailed { name, error } => {
                format!("I couldn't load the skill {name}: {error}")
            }
        }
    }
}

/// "Executing skill: <name>"
pub fn begin_message(name: &str) -> String {
    format!("Executing skill: {name}")
}

/// Fetch `name` and hand each step, in stored order, to `on_step`,
/// sleeping `pause` between consecutive steps.
pub fn replay<F>(store: &dyn SkillStore, name: &str, pause: Duration, mut on_step: F) -> ReplayReport
where
    F: FnMut(ReplayStep<'_>),
{
    let name = name.trim();
    let steps = match store.get_skill(name) {
        Ok(Some(steps)) if !steps.is_empty() => steps,
        Ok(_) => {
            tracing::info!(skill = name, "skill not found");
            return ReplayReport::NotFound { name: name.into() };
        }
        Err(e) => {
            tracing::warn!(skill = name, error = %e, "failed to load skill");
            return ReplayReport::LoadFailed {
                name: name.into(),
                error: e.to_string(),
            };
        }
    };

    tracing::info!(skill = name, steps = steps.len(), "replaying skill");
    on_step(ReplayStep::Begin {
        name,
        total: steps.len(),
    });
    for (index, intent) in steps.iter().enumerate() {
        if index > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        on_step(ReplayStep::Step { index, intent });
    }
    ReplayReport::Completed {
        name: name.into(),
        steps: steps.len(),
    }
}
