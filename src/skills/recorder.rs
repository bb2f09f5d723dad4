//! The skill recording state machine.

use std::sync::Arc;

use crate::intent::Intent;
use crate::store::{SkillStore, normalize_skill_name};

use super::is_recordable;

/// Phrases that end a recording session, matched against the raw utterance.
const STOP_PHRASES: &[&str] = &["stop learning", "save skill"];

/// Recorder state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording { name: String, steps: Vec<Intent> },
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Recording { name, steps } => {
                write!(f, "Recording({name}, {} steps)", steps.len())
            }
        }
    }
}

/// What a recorder transition did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillEvent {
    /// Idle → Recording.
    Started { name: String },
    /// A step was appended.
    Captured { name: String, count: usize },
    /// An excluded intent arrived while recording.
    Ignored { intent_type: String },
    /// Recording → Idle with the steps persisted.
    Saved { name: String, count: usize },
    /// Persisting failed; the session is kept so the user can retry.
    SaveFailed { name: String, error: String },
    /// A start arrived while already recording.
    AlreadyRecording { name: String },
    /// A stop arrived while idle.
    NotRecording,
    /// The requested skill name was unusable.
    Rejected { reason: String },
}

impl SkillEvent {
    /// User-facing text for this event.
    pub fn message(&self) -> String {
        match self {
            Self::Started { name } => format!(
                "Listening. Show me what to do for {name}. Say 'stop learning' when done."
            ),
            Self::Captured { count, .. } => format!("Step {count} recorded."),
            Self::Ignored { .. } => "That isn't something I can record as a step.".into(),
            Self::Saved { name, count } => {
                let unit = if *count == 1 { "step" } else { "steps" };
                format!("I have learned the skill {name} with {count} {unit}.")
            }
            Self::SaveFailed { name, error } => format!(
                "I couldn't save the skill {name}: {error}. Say 'stop learning' to try again."
            ),
            Self::AlreadyRecording { name } => {
                format!("I'm already learning {name}. Say 'stop learning' when done.")
            }
            Self::NotRecording => "I'm not learning anything right now.".into(),
            Self::Rejected { reason } => format!("I can't learn that: {reason}."),
        }
    }
}

/// Captures resolved intents into a named skill.
///
/// While recording, every intent the recorder consumes is withheld from
/// dispatch; the caller checks [`SkillRecorder::observe`]'s return value.
pub struct SkillRecorder {
    state: RecorderState,
    store: Arc<dyn SkillStore>,
}

impl SkillRecorder {
    pub fn new(store: Arc<dyn SkillStore>) -> Self {
        Self {
            state: RecorderState::Idle,
            store,
        }
    }

    pub fn state(&self) -> &RecorderState {
        &self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    /// Feed one resolved intent and the normalized text it came from.
    ///
    /// Returns `None` when the recorder does not consume the intent (idle and
    /// not a learning command, or an `execute_skill` request), in which case
    /// the caller handles it normally.
    pub fn observe(&mut self, text: &str, intent: &Intent) -> Option<SkillEvent> {
        if matches!(intent, Intent::ExecuteSkill { .. }) {
            return None;
        }
        match &self.state {
            RecorderState::Idle => match intent {
                Intent::StartLearning { skill_name } => Some(self.start(skill_name)),
                Intent::StopLearning => Some(SkillEvent::NotRecording),
                _ => None,
            },
            RecorderState::Recording { name, .. } => {
                let name = name.clone();
                if is_stop_signal(text, intent) {
                    return Some(self.finish());
                }
                if matches!(intent, Intent::StartLearning { .. }) {
                    return Some(SkillEvent::AlreadyRecording { name });
                }
                if !is_recordable(intent) {
                    return Some(SkillEvent::Ignored {
                        intent_type: intent.type_tag().to_string(),
                    });
                }
                Some(self.capture(intent.clone()))
            }
        }
    }

    /// Save an unfinished session before the assistant stops.
    ///
    /// Returns `None` when idle.
    pub fn close(&mut self) -> Option<SkillEvent> {
        if !self.is_recording() {
            return None;
        }
        tracing::info!("closing skill session on exit");
        Some(self.finish())
    }

    fn start(&mut self, skill_name: &str) -> SkillEvent {
        match normalize_skill_name(skill_name) {
            Ok(name) => {
                tracing::info!(skill = %name, "skill recording started");
                self.state = RecorderState::Recording {
                    name: name.clone(),
                    steps: Vec::new(),
                };
                SkillEvent::Started { name }
            }
            Err(e) => SkillEvent::Rejected {
                reason: e.to_string(),
            },
        }
    }

    fn capture(&mut self, intent: Intent) -> SkillEvent {
        match &mut self.state {
            RecorderState::Recording { name, steps } => {
                tracing::debug!(skill = %name, step = %intent, "skill step captured");
                steps.push(intent);
                SkillEvent::Captured {
                    name: name.clone(),
                    count: steps.len(),
                }
            }
            RecorderState::Idle => SkillEvent::NotRecording,
        }
    }

    fn finish(&mut self) -> SkillEvent {
        let RecorderState::Recording { name, steps } = &self.state else {
            return SkillEvent::NotRecording;
        };
        match self.store.put_skill(name, steps) {
            Ok(()) => {
                let event = SkillEvent::Saved {
                    name: name.clone(),
                    count: steps.len(),
                };
                tracing::info!(skill = %name, steps = steps.len(), "skill saved");
                self.state = RecorderState::Idle;
                event
            }
            Err(e) => {
                tracing::warn!(skill = %name, error = %e, "failed to save skill");
                SkillEvent::SaveFailed {
                    name: name.clone(),
                    error: e.to_string(),
                }
            }
        }
    }
}

impl std::fmt::Debug for SkillRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRecorder")
            .field("state", &self.state)
            .finish()
    }
}

fn is_stop_signal(text: &str, intent: &Intent) -> bool {
    if matches!(intent, Intent::StopLearning) {
        return true;
    }
    let text = text.to_lowercase();
    STOP_PHRASES.iter().any(|p| text.contains(p))
}
