//! ACID-durable store backed by redb.
//!
//! Skills are stored as JSON arrays of intent records, notes under a
//! monotonically increasing sequence number, preferences as plain strings.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::intent::Intent;

use super::{Note, NoteStore, SkillStore, StoreResult, normalize_skill_name};

/// Skill name → JSON-encoded `Vec<Intent>`.
const SKILLS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("skills");
/// Sequence number → JSON-encoded `Note`.
const NOTES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("notes");
/// Preference key → value.
const PREFS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("preferences");

fn redb_err<E: std::fmt::Display>(op: &'static str) -> impl FnOnce(E) -> StoreError {
    move |e| StoreError::Redb {
        message: format!("{op} failed: {e}"),
    }
}

fn serde_err(e: serde_json::Error) -> StoreError {
    StoreError::Serialization {
        message: e.to_string(),
    }
}

/// ACID-durable store using redb.
///
/// All writes go through transactions. Reads use MVCC snapshots.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create the store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("steward.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;

        // Create every table up front so read transactions never miss one.
        let txn = db.begin_write().map_err(redb_err("begin_write"))?;
        {
            txn.open_table(SKILLS_TABLE).map_err(redb_err("open_table"))?;
            txn.open_table(NOTES_TABLE).map_err(redb_err("open_table"))?;
            txn.open_table(PREFS_TABLE).map_err(redb_err("open_table"))?;
        }
        txn.commit().map_err(redb_err("commit"))?;

        tracing::debug!(path = %db_path.display(), "opened durable store");
        Ok(Self { db: Arc::new(db) })
    }
}

impl SkillStore for DurableStore {
    fn put_skill(&self, name: &str, steps: &[Intent]) -> StoreResult<()> {
        let key = normalize_skill_name(name)?;
        let bytes = serde_json::to_vec(steps).map_err(serde_err)?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(SKILLS_TABLE).map_err(redb_err("open_table"))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))
    }

    fn get_skill(&self, name: &str) -> StoreResult<Option<Vec<Intent>>> {
        let key = normalize_skill_name(name)?;
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(SKILLS_TABLE).map_err(redb_err("open_table"))?;
        let Some(guard) = table.get(key.as_str()).map_err(redb_err("get"))? else {
            return Ok(None);
        };
        serde_json::from_slice(guard.value())
            .map(Some)
            .map_err(serde_err)
    }

    fn list_skills(&self) -> StoreResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(SKILLS_TABLE).map_err(redb_err("open_table"))?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(redb_err("iter"))? {
            let (key, _) = entry.map_err(redb_err("iter"))?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    fn delete_skill(&self, name: &str) -> StoreResult<bool> {
        let key = normalize_skill_name(name)?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        let existed = {
            let mut table = txn.open_table(SKILLS_TABLE).map_err(redb_err("open_table"))?;
            let removed = table.remove(key.as_str()).map_err(redb_err("remove"))?;
            removed.is_some()
        };
        txn.commit().map_err(redb_err("commit"))?;
        Ok(existed)
    }
}

impl NoteStore for DurableStore {
    fn save_note(&self, text: &str) -> StoreResult<()> {
        let bytes = serde_json::to_vec(&Note::now(text)).map_err(serde_err)?;
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(NOTES_TABLE).map_err(redb_err("open_table"))?;
            let next = table
                .last()
                .map_err(redb_err("last"))?
                .map(|(k, _)| k.value() + 1)
                .unwrap_or(0);
            table
                .insert(next, bytes.as_slice())
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))
    }

    fn recent_notes(&self, limit: usize) -> StoreResult<Vec<Note>> {
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(NOTES_TABLE).map_err(redb_err("open_table"))?;
        let mut notes = Vec::new();
        for entry in table.iter().map_err(redb_err("iter"))?.rev().take(limit) {
            let (_, value) = entry.map_err(redb_err("iter"))?;
            notes.push(serde_json::from_slice(value.value()).map_err(serde_err)?);
        }
        Ok(notes)
    }

    fn set_preference(&self, key: &str, value: &str) -> StoreResult<()> {
        let key = key.to_lowercase();
        let txn = self.db.begin_write().map_err(redb_err("begin_write"))?;
        {
            let mut table = txn.open_table(PREFS_TABLE).map_err(redb_err("open_table"))?;
            table
                .insert(key.as_str(), value)
                .map_err(redb_err("insert"))?;
        }
        txn.commit().map_err(redb_err("commit"))
    }

    fn get_preference(&self, key: &str) -> StoreResult<Option<String>> {
        let key = key.to_lowercase();
        let txn = self.db.begin_read().map_err(redb_err("begin_read"))?;
        let table = txn.open_table(PREFS_TABLE).map_err(redb_err("open_table"))?;
        let value = table.get(key.as_str()).map_err(redb_err("get"))?;
        Ok(value.map(|guard| guard.value().to_string()))
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}
