//! PII scrubbing.

use std::sync::LazyLock;

use regex::Regex;

use super::Capability;

static PII_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(), "[SSN]"),
        (
            Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap(),
            "[EMAIL]",
        ),
        (Regex::new(r"\b\d{3}-\d{3}-\d{4}\b").unwrap(), "[PHONE]"),
        (Regex::new(r"\b\d{10}\b").unwrap(), "[PHONE]"),
    ]
});

/// Replace social security numbers, e-mail addresses and phone numbers with
/// placeholder tags.
pub fn anonymize(text: &str) -> String {
    PII_PATTERNS
        .iter()
        .fold(text.to_string(), |acc, (re, tag)| {
            re.replace_all(&acc, *tag).into_owned()
        })
}

/// Keeps PII out of the pipeline when configured to.
///
/// By default input passes through untouched (a message to an e-mail
/// address needs the address); audit records are scrubbed separately.
#[derive(Debug, Clone, Default)]
pub struct PrivacyManager {
    scrub_input: bool,
}

impl PrivacyManager {
    pub fn new(scrub_input: bool) -> Self {
        Self { scrub_input }
    }
}

impl Capability for PrivacyManager {
    fn name(&self) -> &str {
        "privacy"
    }

    fn on_input_received(&self, text: String) -> String {
        if self.scrub_input {
            anonymize(&text)
        } else {
            text
        }
    }
}
