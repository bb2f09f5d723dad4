//! In-memory store backed by DashMap.
//!
//! Used by tests and by `--data-dir`-less throwaway sessions. All data is
//! lost on process exit.

use std::sync::Mutex;

use dashmap::DashMap;

use crate::intent::Intent;

use super::{Note, NoteStore, SkillStore, StoreResult, normalize_skill_name};

/// Concurrent in-memory store using sharded hashmaps.
#[derive(Debug, Default)]
pub struct MemStore {
    skills: DashMap<String, Vec<Intent>>,
    preferences: DashMap<String, String>,
    notes: Mutex<Vec<Note>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored skills.
    pub fn skill_count(&self) -> usize {
        self.skills.len()
    }
}

impl SkillStore for MemStore {
    fn put_skill(&self, name: &str, steps: &[Intent]) -> StoreResult<()> {
        let key = normalize_skill_name(name)?;
        self.skills.insert(key, steps.to_vec());
        Ok(())
    }

    fn get_skill(&self, name: &str) -> StoreResult<Option<Vec<Intent>>> {
        let key = normalize_skill_name(name)?;
        Ok(self.skills.get(&key).map(|v| v.value().clone()))
    }

    fn list_skills(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.skills.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn delete_skill(&self, name: &str) -> StoreResult<bool> {
        let key = normalize_skill_name(name)?;
        Ok(self.skills.remove(&key).is_some())
    }
}

impl NoteStore for MemStore {
    fn save_note(&self, text: &str) -> StoreResult<()> {
        self.notes
            .lock()
            .expect("note list lock poisoned")
            .push(Note::now(text));
        Ok(())
    }

    fn recent_notes(&self, limit: usize) -> StoreResult<Vec<Note>> {
        let notes = self.notes.lock().expect("note list lock poisoned");
        Ok(notes.iter().rev().take(limit).cloned().collect())
    }

    fn set_preference(&self, key: &str, value: &str) -> StoreResult<()> {
        self.preferences.insert(key.to_lowercase(), value.to_string());
        Ok(())
    }

    fn get_preference(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .preferences
            .get(&key.to_lowercase())
            .map(|v| v.value().clone()))
    }
}
