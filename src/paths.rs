//! XDG-compliant path resolution for steward.
//!
//! Config lives under `$XDG_CONFIG_HOME/steward/`, skills/notes under
//! `$XDG_DATA_HOME/steward/`, and the audit log under `$XDG_STATE_HOME/steward/`.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(steward::paths::no_home),
        help("Set the HOME environment variable or pass --config and --data-dir explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(steward::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Directories the assistant reads from and writes to.
#[derive(Debug, Clone)]
pub struct StewardPaths {
    /// `$XDG_CONFIG_HOME/steward/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/steward/`
    pub data_dir: PathBuf,
    /// `$XDG_STATE_HOME/steward/`
    pub state_dir: PathBuf,
}

impl StewardPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("steward");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("steward");

        let state_dir = std::env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/state"))
            .join("steward");

        Ok(Self {
            config_dir,
            data_dir,
            state_dir,
        })
    }

    /// Paths rooted at a single directory (used by `--data-dir` and tests).
    pub fn rooted(root: &Path) -> Self {
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
            state_dir: root.join("state"),
        }
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.state_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Path to the assistant config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory holding the redb database with skills, notes and preferences.
    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    /// Where `download_file` saves.
    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    /// Append-only JSONL audit log written by the provenance capability.
    pub fn provenance_log(&self) -> PathBuf {
        self.state_dir.join("provenance.jsonl")
    }
}
