//! Taught skills: named intent sequences recorded from the user and
//! replayed later as one command.
//!
//! Recording is a two-state machine (Idle → Recording → Idle) driven by
//! [`SkillRecorder`]; replay is a plain loop in [`replay`] that hands each
//! stored step to a caller-supplied runner.

pub mod recorder;
pub mod replay;

use crate::intent::Intent;

pub use recorder::{RecorderState, SkillEvent, SkillRecorder};
pub use replay::{ReplayReport, ReplayStep, begin_message, replay};

/// Whether `intent` may be captured as a skill step.
///
/// Greetings, learning starts and unresolved input are never recorded.
pub fn is_recordable(intent: &Intent) -> bool {
    !matches!(
        intent,
        Intent::Greeting | Intent::StartLearning { .. } | Intent::Unknown { .. }
    )
}
