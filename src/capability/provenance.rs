//! Append-only audit trail of parsed intents and their outcomes.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::Outcome;
use crate::intent::Intent;

use super::Capability;
use super::privacy::anonymize;

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub intent: serde_json::Value,
    /// `parsed`, or the outcome kind once dispatch finished.
    pub outcome: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub user: String,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn append(&self, record: &AuditRecord) -> io::Result<()>;
}

/// Writes one JSON record per line, appending to a file.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let mut line = serde_json::to_string(record).map_err(io::Error::other)?;
        line.push('\n');
        let _guard = self.lock.lock().expect("audit log lock poisoned");
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

/// Records every parsed intent and every final outcome.
///
/// Write failures are logged and swallowed.
pub struct ActionProvenance {
    sink: Arc<dyn AuditSink>,
}

impl ActionProvenance {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    fn record(&self, intent: &Intent, outcome: &str, detail: Option<String>) {
        let record = AuditRecord {
            timestamp: Utc::now(),
            intent: self.intent_value(intent),
            outcome: outcome.to_string(),
            detail: detail.map(|d| anonymize(&d)),
            user: "primary_user".into(),
        };
        if let Err(e) = self.sink.append(&record) {
            tracing::warn!(error = %e, outcome, "failed to write audit record");
        }
    }

    fn intent_value(&self, intent: &Intent) -> serde_json::Value {
        let raw = serde_json::to_string(intent).unwrap_or_default();
        serde_json::from_str(&anonymize(&raw))
            .unwrap_or_else(|_| serde_json::json!({ "type": intent.type_tag() }))
    }
}

impl Capability for ActionProvenance {
    fn name(&self) -> &str {
        "provenance"
    }

    fn on_intent_parsed(&self, intent: Intent) -> Intent {
        self.record(&intent, "parsed", None);
        intent
    }

    fn on_outcome(&self, intent: &Intent, outcome: &Outcome) {
        self.record(intent, outcome.kind(), Some(outcome.message()));
    }
}

impl std::fmt::Debug for ActionProvenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionProvenance").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl AuditSink for Broken {
        fn append(&self, _record: &AuditRecord) -> io::Result<()> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn writes_jsonl_with_pii_scrubbed() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = Arc::new(JsonlAuditLog::new(dir.path().join("state/audit.jsonl")));
        let provenance = ActionProvenance::new(log.clone());

        let intent = Intent::WhatsappMsg {
            contact: "ada@example.org".into(),
            msg: "hi".into(),
        };
        let returned = provenance.on_intent_parsed(intent.clone());
        assert_eq!(returned, intent);
        provenance.on_outcome(
            &intent,
            &Outcome::Completed {
                tool: "send_whatsapp_message".into(),
                message: "sent".into(),
            },
        );

        let content = std::fs::read_to_string(log.path()).unwrap();
        let records: Vec<AuditRecord> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].outcome, "parsed");
        assert_eq!(records[0].intent["contact"], "[EMAIL]");
        assert_eq!(records[1].outcome, "completed");
        assert!(!content.contains("ada@example.org"));
    }

    #[test]
    fn write_failure_does_not_propagate() {
        let provenance = ActionProvenance::new(Arc::new(Broken));
        let out = provenance.on_intent_parsed(Intent::GetTime);
        assert_eq!(out, Intent::GetTime);
    }
}
