//! Ticker extraction from broker alert text.
//!
//! An alert only counts when it mentions the scan marker ("bbauto", any case).
//! Candidate tickers are maximal runs of 1–5 uppercase ASCII letters bounded by
//! word boundaries; alert vocabulary and the marker itself are filtered out.

use std::collections::{BTreeSet, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Symbol;

/// Marker substring that identifies scan alerts (matched case-insensitively).
pub const ALERT_MARKER: &str = "bbauto";

/// Uppercase words that appear in alert text but are never tickers.
pub const STOPWORDS: &[&str] = &[
    "ALERT", "NEW", "SYMBOL", "WAS", "ADDED", "TO", "BBAUTO", "FROM", "THE", "IN", "AT", "ON",
    "BY", "FOR", "WITH",
];

fn ticker_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[A-Z]{1,5}\b").expect("static ticker regex"))
}

/// Pulls ticker symbols out of alert subject/body text.
#[derive(Debug, Clone)]
pub struct TickerExtractor {
    marker: String,
    stopwords: HashSet<String>,
}

impl Default for TickerExtractor {
    fn default() -> Self {
        Self::new(ALERT_MARKER, STOPWORDS.iter().copied())
    }
}

impl TickerExtractor {
    pub fn new<'a>(marker: &str, stopwords: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            marker: marker.to_lowercase(),
            stopwords: stopwords.into_iter().map(str::to_string).collect(),
        }
    }

    /// True when the text carries the scan marker.
    pub fn is_alert(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.marker)
    }

    /// Extract the set of tickers from `text`. Empty unless the marker is present.
    pub fn extract(&self, text: &str) -> BTreeSet<Symbol> {
        if !self.is_alert(text) {
            return BTreeSet::new();
        }

        ticker_pattern()
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|word| !self.stopwords.contains(*word))
            .filter_map(|word| Symbol::parse(word).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(items: &[&str]) -> BTreeSet<Symbol> {
        items.iter().map(|s| Symbol::parse(s).unwrap()).collect()
    }

    #[test]
    fn ignores_text_without_marker() {
        let ex = TickerExtractor::default();
        assert!(ex.extract("New symbol AAPL was added to scan").is_empty());
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        let ex = TickerExtractor::default();
        assert_eq!(ex.extract("BBAuto: TSLA"), symbols(&["TSLA"]));
        assert_eq!(ex.extract("bbauto: TSLA"), symbols(&["TSLA"]));
    }

    #[test]
    fn filters_alert_vocabulary() {
        let ex = TickerExtractor::default();
        let text = "Alert: NEW SYMBOL AAPL WAS ADDED TO BBAUTO FROM THE scan, also MSFT";
        assert_eq!(ex.extract(text), symbols(&["AAPL", "MSFT"]));
    }

    #[test]
    fn skips_runs_longer_than_five_letters() {
        let ex = TickerExtractor::default();
        assert_eq!(ex.extract("BBAuto ABCDEF GE"), symbols(&["GE"]));
    }

    #[test]
    fn lowercase_and_mixed_words_are_not_tickers() {
        let ex = TickerExtractor::default();
        assert_eq!(ex.extract("BBAuto Nvda nvda AMD"), symbols(&["AMD"]));
    }

    #[test]
    fn deduplicates() {
        let ex = TickerExtractor::default();
        assert_eq!(ex.extract("BBAuto AMD AMD AMD"), symbols(&["AMD"]));
    }

    #[test]
    fn requires_word_boundaries() {
        let ex = TickerExtractor::default();
        // "AAPL2" has no boundary between L and 2; "X_Y" joins via underscore.
        assert_eq!(ex.extract("BBAuto AAPL2 X_Y IBM."), symbols(&["IBM"]));
    }
}
