// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # steward
//!
//! A personal command-assistant core: free text in, typed intents through a
//! policy chain, actions out.
//!
//! ## Architecture
//!
//! - **Intent resolution** (`intent`): ordered pattern rules, escalating to an
//!   Ollama-hosted model for unknown or politely phrased commands
//! - **Capability chain** (`capability`): privacy, compliance, provenance and
//!   cost hooks run in registration order; compliance can veto
//! - **Dispatch** (`dispatch`): confirmation for dangerous tools, context
//!   injection, and a failure boundary around every handler
//! - **Skills** (`skills`): record a sequence of intents under a name and
//!   replay it later
//! - **Storage** (`store`): in-memory or redb-backed skills, notes and
//!   preferences
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use steward::assistant::{Assistant, Flow};
//! use steward::config::AssistantConfig;
//! use steward::message::StdoutSink;
//!
//! let assistant = Assistant::builder(AssistantConfig::default())
//!     .output(Arc::new(StdoutSink))
//!     .build();
//! assistant.start();
//! if assistant.handle_utterance("steward, what time is it") == Flow::Exit {
//!     assistant.shutdown();
//! }
//! ```

pub mod assistant;
pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod intent;
pub mod llm;
pub mod message;
pub mod paths;
pub mod skills;
pub mod speech;
pub mod store;
pub mod tool;
pub mod tools;
