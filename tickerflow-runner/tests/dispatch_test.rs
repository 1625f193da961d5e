//! Integration tests for order dispatch, account refresh and the trade desk.
//!
//! Tests:
//! 1. A watchlist of N entries produces N order attempts and ends empty
//! 2. Pauses: short after a placed order, long after any failure
//! 3. Malformed lines never become orders
//! 4. Account refresh mirrors held symbols into the open-positions file
//! 5. The trade desk dispatches only when the watchlist changes

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::*;
use tickerflow_core::RecordingSleeper;
use tickerflow_runner::{
    resolve_account_hash, AccountRefresher, BrokerError, BrokerPosition, DispatchSettings,
    OrderDispatcher, QuoteSnapshot, TradeDesk,
};

fn dispatcher(
    broker: &Arc<FakeBroker>,
    store: &Arc<tickerflow_core::QueueStore>,
    sleeper: &Arc<RecordingSleeper>,
) -> OrderDispatcher {
    OrderDispatcher::new(
        broker.clone(),
        Arc::clone(store),
        sleeper.clone(),
        "HASH-2",
        DispatchSettings::default(),
    )
}

#[test]
fn every_entry_is_attempted_once_and_watchlist_cleared() {
    let (_dir, store) = temp_store();
    write(&store.paths().watchlist, "AAPL 187.50\nMSFT 410.25\nNVDA 95.10\n");
    let broker = Arc::new(FakeBroker::default());
    let sleeper = Arc::new(RecordingSleeper::new());

    let summary = dispatcher(&broker, &store, &sleeper).dispatch_watchlist().unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!(summary.placed, 3);
    assert_eq!(broker.ordered_symbols(), vec!["AAPL", "MSFT", "NVDA"]);
    assert_eq!(read(&store.paths().watchlist), "");
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(3); 3]);
}

#[test]
fn order_payload_is_single_share_limit_at_two_decimals() {
    let (_dir, store) = temp_store();
    write(&store.paths().watchlist, "amd 12.3\n");
    let broker = Arc::new(FakeBroker::default());
    let sleeper = Arc::new(RecordingSleeper::new());

    dispatcher(&broker, &store, &sleeper).dispatch_watchlist().unwrap();

    let orders = broker.orders();
    assert_eq!(orders.len(), 1);
    let json = serde_json::to_value(&orders[0]).unwrap();
    assert_eq!(json["price"], "12.30");
    assert_eq!(json["orderLegCollection"][0]["quantity"], 1);
    assert_eq!(json["orderLegCollection"][0]["instrument"]["symbol"], "AMD");
    assert_eq!(json["duration"], "GOOD_TILL_CANCEL");
}

#[test]
fn failures_pause_longer_and_are_not_retried() {
    let (_dir, store) = temp_store();
    write(&store.paths().watchlist, "AAPL 1.00\nMSFT 2.00\nNVDA 3.00\n");
    let broker = Arc::new(FakeBroker {
        statuses: HashMap::from([("MSFT".to_string(), 400)]),
        transport_failures: ["NVDA".to_string()].into_iter().collect(),
        ..FakeBroker::default()
    });
    let sleeper = Arc::new(RecordingSleeper::new());

    let summary = dispatcher(&broker, &store, &sleeper).dispatch_watchlist().unwrap();

    assert_eq!(summary.attempted, 3);
    assert_eq!((summary.placed, summary.rejected, summary.errored), (1, 1, 1));
    assert_eq!(broker.orders().len(), 3);
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(10),
            Duration::from_secs(10)
        ]
    );
    assert_eq!(read(&store.paths().watchlist), "");
}

#[test]
fn malformed_lines_are_skipped() {
    let (_dir, store) = temp_store();
    write(&store.paths().watchlist, "MSFT\nNVDA abc\nAAPL 5.00\n");
    let broker = Arc::new(FakeBroker::default());
    let sleeper = Arc::new(RecordingSleeper::new());

    let summary = dispatcher(&broker, &store, &sleeper).dispatch_watchlist().unwrap();

    assert_eq!(summary.malformed, 2);
    assert_eq!(summary.attempted, 1);
    assert_eq!(broker.ordered_symbols(), vec!["AAPL"]);
    assert_eq!(
        sleeper.recorded(),
        vec![Duration::from_secs(10), Duration::from_secs(3)]
    );
    assert_eq!(read(&store.paths().watchlist), "");
}

#[test]
fn empty_watchlist_places_nothing() {
    let (_dir, store) = temp_store();
    let broker = Arc::new(FakeBroker::default());
    let sleeper = Arc::new(RecordingSleeper::new());
    let summary = dispatcher(&broker, &store, &sleeper).dispatch_watchlist().unwrap();
    assert_eq!(summary, Default::default());
    assert!(broker.orders().is_empty());
}

// ── Account refresh ──────────────────────────────────────────────────

fn position(symbol: &str, qty: f64, avg: f64) -> BrokerPosition {
    BrokerPosition {
        symbol: symbol.into(),
        long_quantity: qty,
        short_quantity: 0.0,
        average_price: avg,
    }
}

#[test]
fn resolves_hash_by_account_number() {
    let broker = FakeBroker::default();
    assert_eq!(resolve_account_hash(&broker, "12345678").unwrap(), "HASH-2");
    let err = resolve_account_hash(&broker, "99999999").unwrap_err();
    assert!(matches!(err, BrokerError::AccountNotFound(ref masked) if masked == "*******999"));
}

#[test]
fn refresh_writes_held_symbols_and_prices_positions() {
    let (_dir, store) = temp_store();
    let broker = Arc::new(FakeBroker {
        positions: vec![position("AAPL", 10.0, 150.0), position("FREE", 5.0, 0.0)],
        quotes: HashMap::from([(
            "AAPL".to_string(),
            QuoteSnapshot {
                last_price: Some(165.0),
                mark: None,
            },
        )]),
        ..FakeBroker::default()
    });

    let snapshot = AccountRefresher::new(broker, Arc::clone(&store), "HASH-2")
        .refresh()
        .unwrap();

    assert_eq!(snapshot.masked_account, "*******678");
    assert_eq!(snapshot.positions[0].unrealized_pnl(), 150.0);
    assert!((snapshot.positions[0].pnl_percent() - 10.0).abs() < 1e-9);
    assert_eq!(snapshot.positions[1].pnl_percent(), 0.0);
    assert_eq!(read(&store.paths().open_positions), "AAPL\nFREE\n");
}

#[test]
fn refresh_without_positions_clears_file() {
    let (_dir, store) = temp_store();
    write(&store.paths().open_positions, "OLD\n");
    let broker = Arc::new(FakeBroker::default());

    AccountRefresher::new(broker, Arc::clone(&store), "HASH-2")
        .refresh()
        .unwrap();

    assert_eq!(read(&store.paths().open_positions), "");
}

// ── Trade desk ───────────────────────────────────────────────────────

#[test]
fn desk_dispatches_on_startup_and_on_change_only() {
    let (_dir, store) = temp_store();
    write(&store.paths().watchlist, "AAPL 10.00\n");
    let broker = Arc::new(FakeBroker::default());
    let sleeper = Arc::new(RecordingSleeper::new());
    let mut desk = TradeDesk::new(
        dispatcher(&broker, &store, &sleeper),
        AccountRefresher::new(broker.clone(), Arc::clone(&store), "HASH-2"),
        Arc::clone(&store),
        sleeper.clone(),
        Duration::from_secs(60),
    );

    let startup = desk.startup().unwrap();
    assert_eq!(startup.placed, 1);

    // Nothing new: no dispatch
    assert!(desk.tick().is_none());
    assert_eq!(broker.orders().len(), 1);

    std::thread::sleep(Duration::from_millis(20));
    write(&store.paths().watchlist, "MSFT 20.00\n");
    let summary = desk.tick().unwrap();
    assert_eq!(summary.placed, 1);
    assert_eq!(broker.ordered_symbols(), vec!["AAPL", "MSFT"]);
    assert_eq!(read(&store.paths().watchlist), "");
}
