//! Two-tier resolution: pattern rules first, learned model second.

use std::sync::LazyLock;

use regex::Regex;

use super::{Intent, LearnedResolver, PatternResolver};

static RE_AND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i) and ").unwrap());

const POLITENESS_MARKERS: &[&str] = &["please", "could you"];

/// Composes the pattern and learned tiers with the escalation policy.
#[derive(Debug)]
pub struct IntentPipeline {
    wake_word: String,
    pattern: PatternResolver,
    learned: Option<LearnedResolver>,
}

impl IntentPipeline {
    pub fn new(wake_word: impl Into<String>, pattern: PatternResolver) -> Self {
        Self {
            wake_word: wake_word.into().to_lowercase(),
            pattern,
            learned: None,
        }
    }

    /// Attach a learned tier for escalation.
    pub fn with_learned(mut self, learned: LearnedResolver) -> Self {
        self.learned = Some(learned);
        self
    }

    pub fn has_learned(&self) -> bool {
        self.learned.is_some()
    }

    /// Lower-case, trim, drop trailing punctuation and the wake-word prefix.
    pub fn normalize(&self, text: &str) -> String {
        let lower = text.trim().to_lowercase();
        let mut rest = lower.as_str();
        if !self.wake_word.is_empty() {
            if let Some(stripped) = rest.strip_prefix(self.wake_word.as_str()) {
                if stripped.is_empty() || !stripped.starts_with(char::is_alphanumeric) {
                    rest = stripped.trim_start_matches([',', ':', '!']);
                }
            }
        }
        rest.trim()
            .trim_end_matches(['?', '!', '.'])
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resolve only with the deterministic tier.
    pub fn resolve_pattern(&self, text: &str) -> Intent {
        self.pattern.resolve(&self.normalize(text))
    }

    /// Resolve `text` to an intent. Never fails.
    ///
    /// The learned tier sees `text` as typed, so quoted messages keep their
    /// casing.
    pub fn resolve(&self, text: &str) -> Intent {
        let normalized = self.normalize(text);
        let pattern_intent = self.pattern.resolve(&normalized);

        if !needs_escalation(&pattern_intent, &normalized) {
            return pattern_intent;
        }
        let Some(learned) = &self.learned else {
            return pattern_intent;
        };

        tracing::info!(
            pattern = %pattern_intent,
            "escalating utterance to learned resolver"
        );
        match learned.resolve(text.trim()) {
            Some(intent) => intent,
            None => pattern_intent,
        }
    }
}

/// Unknown intents escalate, as do `open` commands phrased politely.
fn needs_escalation(intent: &Intent, normalized: &str) -> bool {
    match intent {
        Intent::Unknown { .. } => true,
        Intent::OpenSomething { .. } => {
            let after_open = normalized.strip_prefix("open ").unwrap_or(normalized);
            let words: Vec<&str> = after_open
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect();
            POLITENESS_MARKERS.iter().any(|marker| {
                let marker: Vec<&str> = marker.split(' ').collect();
                words.windows(marker.len()).any(|w| w == marker.as_slice())
            })
        }
        _ => false,
    }
}

/// Split a composite utterance on the literal connective " and ".
///
/// Sub-commands keep the order they were spoken in; empty pieces are dropped.
/// A piece that completes an `open X and send/play/search ...` or
/// `search X and play` command stays attached to the clause before it.
pub fn split_composite(text: &str) -> Vec<String> {
    let mut parts: Vec<String> = Vec::new();
    for piece in RE_AND.split(text).map(str::trim).filter(|p| !p.is_empty()) {
        if let Some(prev) = parts.last_mut() {
            if completes(&prev.to_lowercase(), &piece.to_lowercase()) {
                prev.push_str(" and ");
                prev.push_str(piece);
                continue;
            }
        }
        parts.push(piece.to_string());
    }
    parts
}

fn completes(prev: &str, piece: &str) -> bool {
    if prev.contains(" and ") {
        return false;
    }
    let open_follow_up = prev.contains("open ")
        && ["send ", "play ", "search "]
            .iter()
            .any(|verb| piece.starts_with(verb));
    let search_then_play = prev.contains("search ") && piece == "play";
    open_follow_up || search_then_play
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::llm::{InferenceBackend, LlmResult};

    struct Counting {
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
        reply: &'static str,
    }

    impl InferenceBackend for Counting {
        fn generate(&self, prompt: &str, _system: Option<&str>) -> LlmResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.to_string())
        }
    }

    fn pipeline(reply: &'static str) -> (IntentPipeline, Arc<AtomicUsize>) {
        let (p, calls, _) = pipeline_with_prompts(reply);
        (p, calls)
    }

    fn pipeline_with_prompts(
        reply: &'static str,
    ) -> (IntentPipeline, Arc<AtomicUsize>, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let backend = Counting {
            calls: Arc::clone(&calls),
            prompts: Arc::clone(&prompts),
            reply,
        };
        let pattern = PatternResolver::new("steward", vec!["notepad".into()]);
        let learned = LearnedResolver::new(Arc::new(backend), &[]);
        (
            IntentPipeline::new("steward", pattern).with_learned(learned),
            calls,
            prompts,
        )
    }

    #[test]
    fn normalize_strips_wake_word_and_punctuation() {
        let (p, _) = pipeline("{}");
        assert_eq!(p.normalize("Steward, open   Notepad!"), "open notepad");
        assert_eq!(p.normalize("stewardship rocks"), "stewardship rocks");
        assert_eq!(p.normalize("  What time is it?  "), "what time is it");
    }

    #[test]
    fn pattern_hits_never_call_model() {
        let (p, calls) = pipeline("{\"type\": \"greeting\"}");
        assert_eq!(p.resolve("what time is it"), Intent::GetTime);
        assert_eq!(
            p.resolve("open notepad"),
            Intent::OpenSomething {
                target: "notepad".into()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn polite_open_escalates() {
        let (p, calls) = pipeline("{\"type\": \"open_something\", \"target\": \"youtube\"}");
        let intent = p.resolve("open youtube please");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            intent,
            Intent::OpenSomething {
                target: "youtube".into()
            }
        );
    }

    #[test]
    fn politeness_markers_match_whole_words() {
        let (p, calls) = pipeline("{}");
        p.resolve("open pleased app");
        p.resolve("open couldyou");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        p.resolve("open the mail, please");
        p.resolve("open could you the browser");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn learned_tier_sees_the_utterance_as_typed() {
        let (p, _, prompts) = pipeline_with_prompts("{}");
        p.resolve("Tell Alice that Dinner is at Eight");
        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("\"Tell Alice that Dinner is at Eight\""));
    }

    #[test]
    fn unknown_escalates_and_falls_back() {
        let (p, calls) = pipeline("no idea");
        assert_eq!(p.resolve("blorp zap"), Intent::unknown("blorp zap"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn without_learned_tier_pattern_result_stands() {
        let p = IntentPipeline::new("steward", PatternResolver::new("steward", vec![]));
        assert!(!p.has_learned());
        assert_eq!(
            p.resolve("open youtube please"),
            Intent::OpenSomething {
                target: "youtube".into()
            }
        );
    }

    #[test]
    fn composite_splits_in_order() {
        assert_eq!(
            split_composite("open notepad and what time is it AND play jazz"),
            vec!["open notepad", "what time is it", "play jazz"]
        );
        assert_eq!(split_composite("get time"), vec!["get time"]);
    }

    #[test]
    fn composite_open_rules_stay_whole() {
        assert_eq!(
            split_composite("open whatsapp and send hi to mom"),
            vec!["open whatsapp and send hi to mom"]
        );
        assert_eq!(
            split_composite("search lofi and play"),
            vec!["search lofi and play"]
        );
    }
}
