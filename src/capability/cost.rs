//! Input size and token budget control.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};

use crate::config::CostSettings;

use super::Capability;

const TRUNCATION_MARKER: &str = "... [TRUNCATED]";

/// Truncates oversized input and tracks estimated token use per day.
#[derive(Debug)]
pub struct CostOptimizer {
    max_input_chars: usize,
    daily_token_limit: u64,
    tokens_today: AtomicU64,
    warned: AtomicBool,
    day: Mutex<NaiveDate>,
}

impl CostOptimizer {
    pub fn new(settings: &CostSettings) -> Self {
        Self {
            max_input_chars: settings.max_input_chars,
            daily_token_limit: settings.daily_token_limit,
            tokens_today: AtomicU64::new(0),
            warned: AtomicBool::new(false),
            day: Mutex::new(Utc::now().date_naive()),
        }
    }

    /// Estimated tokens spent today.
    pub fn tokens_today(&self) -> u64 {
        self.tokens_today.load(Ordering::Relaxed)
    }

    /// Whether today's budget is exhausted.
    pub fn over_budget(&self) -> bool {
        self.tokens_today() > self.daily_token_limit
    }

    /// Add `tokens` to today's total, resetting at the day boundary.
    pub fn track_usage(&self, tokens: u64) {
        let today = Utc::now().date_naive();
        {
            let mut day = self.day.lock().expect("cost day lock poisoned");
            if *day != today {
                *day = today;
                self.tokens_today.store(0, Ordering::Relaxed);
                self.warned.store(false, Ordering::Relaxed);
            }
        }
        let total = self.tokens_today.fetch_add(tokens, Ordering::Relaxed) + tokens;
        if total > self.daily_token_limit && !self.warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                total,
                limit = self.daily_token_limit,
                "daily token limit exceeded"
            );
        }
    }

    fn truncate(&self, text: String) -> String {
        match text.char_indices().nth(self.max_input_chars) {
            Some((cut, _)) => {
                tracing::info!(
                    chars = text.chars().count(),
                    limit = self.max_input_chars,
                    "truncating oversized input"
                );
                format!("{}{TRUNCATION_MARKER}", &text[..cut])
            }
            None => text,
        }
    }
}

/// Rough token estimate: about four characters per token.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() as u64).div_ceil(4)
}

impl Capability for CostOptimizer {
    fn name(&self) -> &str {
        "cost"
    }

    fn on_input_received(&self, text: String) -> String {
        let text = self.truncate(text);
        self.track_usage(estimate_tokens(&text));
        text
    }

    fn on_output_generation(&self, text: String) -> String {
        self.track_usage(estimate_tokens(&text));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer(max_input_chars: usize, daily_token_limit: u64) -> CostOptimizer {
        CostOptimizer::new(&CostSettings {
            max_input_chars,
            daily_token_limit,
        })
    }

    #[test]
    fn short_input_untouched() {
        let cost = optimizer(10, 1000);
        assert_eq!(cost.on_input_received("hello".into()), "hello");
    }

    #[test]
    fn long_input_truncated_on_char_boundary() {
        let cost = optimizer(3, 1000);
        assert_eq!(
            cost.on_input_received("héllo".into()),
            format!("hél{TRUNCATION_MARKER}")
        );
    }

    #[test]
    fn usage_accumulates_past_limit() {
        let cost = optimizer(100, 2);
        cost.on_input_received("abcdefgh".into());
        assert_eq!(cost.tokens_today(), 2);
        assert!(!cost.over_budget());
        cost.on_output_generation("x".into());
        assert!(cost.over_budget());
    }

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }
}
