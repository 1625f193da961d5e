//! Property tests for extraction and queue invariants.
//!
//! Uses proptest to verify:
//! 1. Text without the alert marker never yields symbols
//! 2. Marker text yields exactly the embedded non-stopword symbols, deduplicated
//! 3. Merging the same symbols twice leaves the scanner file unchanged
//! 4. Watchlist never holds a symbol twice

use std::collections::BTreeSet;

use proptest::prelude::*;
use tickerflow_core::extract::{TickerExtractor, STOPWORDS};
use tickerflow_core::{LimitPrice, QueueKind, QueuePaths, QueueStore, Symbol};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_ticker() -> impl Strategy<Value = String> {
    "[A-Z]{1,5}".prop_filter("stopword", |s| !STOPWORDS.contains(&s.as_str()))
}

fn arb_tickers() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_ticker(), 0..8)
}

fn arb_noise() -> impl Strategy<Value = String> {
    "[a-z0-9 ,.:!]{0,40}"
}

// ── 1-2. Extraction ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn no_marker_no_symbols(text in "[A-Za-z0-9 ,.:!]{0,120}") {
        prop_assume!(!text.to_lowercase().contains("bbauto"));
        let extractor = TickerExtractor::default();
        prop_assert!(extractor.extract(&text).is_empty());
    }

    #[test]
    fn marker_text_yields_embedded_symbols(
        tickers in arb_tickers(),
        noise in arb_noise(),
    ) {
        let text = format!("Alert: New symbol: {} was added to BBAuto {noise}", tickers.join(", "));
        let extractor = TickerExtractor::default();
        let found: BTreeSet<String> = extractor
            .extract(&text)
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        let expected: BTreeSet<String> = tickers.into_iter().collect();
        prop_assert_eq!(found, expected);
    }
}

// ── 3-4. Queue store ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn append_unique_is_idempotent(
        existing in arb_tickers(),
        incoming in arb_tickers(),
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = QueueStore::new(QueuePaths::in_dir(dir.path()));
        std::fs::write(&store.paths().scanner, existing.join("\n")).unwrap();

        let symbols: Vec<Symbol> = incoming.iter().map(|s| Symbol::parse(s).unwrap()).collect();
        store.append_unique(QueueKind::Scanner, &symbols).unwrap();
        let once = std::fs::read_to_string(&store.paths().scanner).unwrap_or_default();
        store.append_unique(QueueKind::Scanner, &symbols).unwrap();
        let twice = std::fs::read_to_string(&store.paths().scanner).unwrap_or_default();
        prop_assert_eq!(&once, &twice);

        let loaded = store.load(QueueKind::Scanner).unwrap();
        for symbol in &symbols {
            prop_assert!(loaded.contains(symbol));
        }
    }

    #[test]
    fn watchlist_has_no_duplicates(
        tickers in arb_tickers(),
        price in 1.0..500.0_f64,
    ) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = QueueStore::new(QueuePaths::in_dir(dir.path()));
        let price = LimitPrice::new(price).unwrap();
        for ticker in tickers.iter().chain(tickers.iter()) {
            store.add_to_watchlist(Symbol::parse(ticker).unwrap(), price).unwrap();
        }
        let distinct: BTreeSet<&String> = tickers.iter().collect();
        prop_assert_eq!(store.count(QueueKind::Watchlist).unwrap(), distinct.len());
    }
}
