//! Persistence collaborators for skills, notes and preferences.
//!
//! Two backends implement the same traits:
//!
//! - [`MemStore`]: concurrent hashmaps (DashMap), lost on exit
//! - [`DurableStore`]: ACID tables in a redb file
//!
//! Components receive an explicitly constructed store as
//! `Arc<dyn AssistantStore>`; there is no global instance.

pub mod durable;
pub mod mem;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use crate::error::{StoreError, StoreResult};
use crate::intent::Intent;

pub use durable::DurableStore;
pub use mem::MemStore;

/// Named, replayable intent sequences.
///
/// Names are case-normalized by the store; a name maps to at most one
/// sequence and re-putting a name replaces it.
pub trait SkillStore: Send + Sync {
    fn put_skill(&self, name: &str, steps: &[Intent]) -> StoreResult<()>;
    fn get_skill(&self, name: &str) -> StoreResult<Option<Vec<Intent>>>;
    /// All skill names, sorted.
    fn list_skills(&self) -> StoreResult<Vec<String>>;
    /// Returns whether the skill existed.
    fn delete_skill(&self, name: &str) -> StoreResult<bool>;
}

/// Free-form notes and key/value preferences.
pub trait NoteStore: Send + Sync {
    fn save_note(&self, text: &str) -> StoreResult<()>;
    /// Up to `limit` notes, newest first.
    fn recent_notes(&self, limit: usize) -> StoreResult<Vec<Note>>;
    fn set_preference(&self, key: &str, value: &str) -> StoreResult<()>;
    fn get_preference(&self, key: &str) -> StoreResult<Option<String>>;
}

/// Everything the assistant persists.
pub trait AssistantStore: SkillStore + NoteStore {
    fn as_skill_store(&self) -> &dyn SkillStore;
    fn into_skill_store(self: Arc<Self>) -> Arc<dyn SkillStore>;
}

impl<T: SkillStore + NoteStore + 'static> AssistantStore for T {
    fn as_skill_store(&self) -> &dyn SkillStore {
        self
    }

    fn into_skill_store(self: Arc<Self>) -> Arc<dyn SkillStore> {
        self
    }
}

/// A remembered note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn now(text: &str) -> Self {
        Self {
            text: text.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Canonical storage key for a skill name: trimmed, inner whitespace
/// collapsed, lower-case.
pub fn normalize_skill_name(name: &str) -> StoreResult<String> {
    let normalized = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        return Err(StoreError::InvalidName { name: name.into() });
    }
    Ok(normalized)
}
