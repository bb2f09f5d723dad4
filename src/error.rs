//! Rich diagnostic error types for the steward assistant core.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Expected, user-facing results of a
//! command (not understood, blocked, cancelled, tool failure) are not errors:
//! they travel as [`Outcome`](crate::dispatch::Outcome) values instead.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::config::ConfigError;
pub use crate::llm::LlmError;
pub use crate::paths::PathError;
pub use crate::tool::ToolError;

/// Top-level error type for the assistant.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum StewardError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("I/O error: {source}")]
    #[diagnostic(
        code(steward::store::io),
        help(
            "A filesystem operation failed. Check that the data directory exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("redb transaction error: {message}")]
    #[diagnostic(
        code(steward::store::redb),
        help(
            "The embedded database encountered a transaction error. \
             This may indicate corruption; try running with a fresh data directory."
        )
    )]
    Redb { message: String },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(steward::store::serde),
        help(
            "Failed to serialize or deserialize stored data. \
             This usually means the stored format changed between versions; \
             re-record the affected skill."
        )
    )]
    Serialization { message: String },

    #[error("invalid skill name: \"{name}\"")]
    #[diagnostic(
        code(steward::store::invalid_name),
        help("Skill names must contain at least one non-whitespace character.")
    )]
    InvalidName { name: String },
}

/// Result alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result alias for top-level operations.
pub type StewardResult<T> = std::result::Result<T, StewardError>;
