//! Cross-cutting policy hooks around every utterance.
//!
//! A [`Capability`] overrides any subset of a fixed hook set; the
//! [`CapabilityChain`] invokes each hook on every enabled capability in
//! registration order, threading transformed values forward. Compliance
//! checks short-circuit on the first veto.
//!
//! The chain itself has no side effects beyond calling hooks. Each pass runs
//! against a snapshot of the enabled set taken when the pass starts, so
//! enabling or disabling a capability never affects a pass in flight.

pub mod compliance;
pub mod cost;
pub mod privacy;
pub mod provenance;

use std::sync::{Arc, RwLock};

use crate::dispatch::Outcome;
use crate::intent::Intent;

pub use compliance::ComplianceEngine;
pub use cost::CostOptimizer;
pub use privacy::PrivacyManager;
pub use provenance::{ActionProvenance, AuditRecord, AuditSink, JsonlAuditLog};

/// A named, independently switchable policy unit.
///
/// Every hook has a pass-through default.
pub trait Capability: Send + Sync {
    fn name(&self) -> &str;

    fn on_start(&self) {}

    fn on_shutdown(&self) {}

    /// Rewrite raw input before resolution.
    fn on_input_received(&self, text: String) -> String {
        text
    }

    /// Rewrite the resolved intent.
    fn on_intent_parsed(&self, intent: Intent) -> Intent {
        intent
    }

    /// `false` vetoes the intent.
    fn check_compliance(&self, _intent: &Intent) -> bool {
        true
    }

    /// Rewrite a reply before it is surfaced.
    fn on_output_generation(&self, text: String) -> String {
        text
    }

    /// Observe the final outcome of a dispatched intent.
    fn on_outcome(&self, _intent: &Intent, _outcome: &Outcome) {}
}

/// Result of a compliance pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplianceVerdict {
    Allowed,
    /// Vetoed by the named capability.
    Blocked { by: String },
}

impl ComplianceVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

struct Entry {
    capability: Arc<dyn Capability>,
    enabled: bool,
}

/// Ordered capability registry and hook orchestrator.
#[derive(Default)]
pub struct CapabilityChain {
    entries: RwLock<Vec<Entry>>,
}

impl CapabilityChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capability. Registration order is hook order.
    pub fn register(&self, capability: Arc<dyn Capability>) {
        tracing::debug!(capability = capability.name(), "registered capability");
        self.entries
            .write()
            .expect("capability chain lock poisoned")
            .push(Entry {
                capability,
                enabled: true,
            });
    }

    /// Enable or disable by name. Returns `false` if no capability has that name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut entries = self.entries.write().expect("capability chain lock poisoned");
        match entries.iter_mut().find(|e| e.capability.name() == name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Registered capability names with their enabled flag, in order.
    pub fn list(&self) -> Vec<(String, bool)> {
        self.entries
            .read()
            .expect("capability chain lock poisoned")
            .iter()
            .map(|e| (e.capability.name().to_string(), e.enabled))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("capability chain lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enabled capabilities, in order, as of now.
    fn snapshot(&self) -> Vec<Arc<dyn Capability>> {
        self.entries
            .read()
            .expect("capability chain lock poisoned")
            .iter()
            .filter(|e| e.enabled)
            .map(|e| Arc::clone(&e.capability))
            .collect()
    }

    pub fn start(&self) {
        for cap in self.snapshot() {
            cap.on_start();
        }
    }

    pub fn shutdown(&self) {
        for cap in self.snapshot() {
            cap.on_shutdown();
        }
    }

    pub fn process_input(&self, text: String) -> String {
        self.snapshot()
            .iter()
            .fold(text, |text, cap| cap.on_input_received(text))
    }

    pub fn process_intent(&self, intent: Intent) -> Intent {
        self.snapshot()
            .iter()
            .fold(intent, |intent, cap| cap.on_intent_parsed(intent))
    }

    /// Ask each capability in order; the first veto ends the pass.
    pub fn check_compliance(&self, intent: &Intent) -> ComplianceVerdict {
        for cap in self.snapshot() {
            if !cap.check_compliance(intent) {
                tracing::warn!(capability = cap.name(), intent = %intent, "action blocked");
                return ComplianceVerdict::Blocked {
                    by: cap.name().to_string(),
                };
            }
        }
        ComplianceVerdict::Allowed
    }

    pub fn process_output(&self, text: String) -> String {
        self.snapshot()
            .iter()
            .fold(text, |text, cap| cap.on_output_generation(text))
    }

    pub fn observe_outcome(&self, intent: &Intent, outcome: &Outcome) {
        for cap in self.snapshot() {
            cap.on_outcome(intent, outcome);
        }
    }
}

impl std::fmt::Debug for CapabilityChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityChain")
            .field("capabilities", &self.list())
            .finish()
    }
}
