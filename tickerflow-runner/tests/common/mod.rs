//! Shared fakes for runner integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tickerflow_core::{
    LimitPrice, OrderRequest, QueuePaths, QueueStore, Symbol, SymbolValidator, ValidationResult,
};
use tickerflow_runner::{
    AccountDetails, AlertFilter, AlertMessage, Balances, BrokerError, BrokerPosition, Brokerage,
    LinkedAccount, MailError, MailboxConnector, MailboxSession, OrderResponse, QuoteSnapshot,
};

pub fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

pub fn temp_store() -> (TempDir, Arc<QueueStore>) {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(QueueStore::new(QueuePaths::in_dir(dir.path())));
    (dir, store)
}

pub fn write(path: &std::path::Path, content: &str) {
    std::fs::write(path, content).unwrap();
}

pub fn read(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap_or_default()
}

// ── Validator ────────────────────────────────────────────────────────

/// Accepts symbols listed in `accept` at a fixed price; rejects everything else.
#[derive(Default)]
pub struct ScriptedValidator {
    pub accept: HashMap<String, f64>,
    pub calls: Mutex<Vec<Symbol>>,
}

impl ScriptedValidator {
    pub fn accepting(pairs: &[(&str, f64)]) -> Self {
        Self {
            accept: pairs.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Symbol> {
        self.calls.lock().unwrap().clone()
    }
}

impl SymbolValidator for ScriptedValidator {
    fn validate(&self, symbol: &Symbol) -> ValidationResult {
        self.calls.lock().unwrap().push(symbol.clone());
        match self.accept.get(symbol.as_str()) {
            Some(price) => ValidationResult::Valid {
                report: tickerflow_core::ValidationReport {
                    symbol: symbol.clone(),
                    date: chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
                    close: price + 2.0,
                    open: *price,
                    low: *price,
                    ema_fast: 2.0,
                    ema_slow: 1.0,
                    band_upper: price + 1.0,
                    band_middle: *price,
                    bars_since_crossover: Some(3),
                    checks: tickerflow_core::ValidationChecks {
                        ema_trend: true,
                        bullish_bar: true,
                        above_upper_band: true,
                    },
                },
                limit_price: LimitPrice::new(*price).unwrap(),
            },
            None => ValidationResult::DataUnavailable {
                symbol: symbol.clone(),
                reason: "scripted rejection".into(),
            },
        }
    }
}

// ── Mailbox ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MailLog {
    pub seen: Vec<u32>,
    pub archived: Vec<u32>,
    pub closed: usize,
}

/// In-memory mailbox; optionally stalls inside `fetch_unseen`.
pub struct FakeMailbox {
    pub messages: Vec<AlertMessage>,
    pub stall: Option<Duration>,
    pub log: Arc<Mutex<MailLog>>,
    pub connects: AtomicUsize,
}

impl FakeMailbox {
    pub fn new(messages: Vec<AlertMessage>) -> Self {
        Self {
            messages,
            stall: None,
            log: Arc::new(Mutex::new(MailLog::default())),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn stalling(messages: Vec<AlertMessage>, stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::new(messages)
        }
    }

    pub fn seen(&self) -> Vec<u32> {
        self.log.lock().unwrap().seen.clone()
    }

    pub fn archived(&self) -> Vec<u32> {
        self.log.lock().unwrap().archived.clone()
    }
}

pub fn alert(id: u32, subject: &str, body: &str) -> AlertMessage {
    AlertMessage {
        id,
        subject: subject.into(),
        body: body.into(),
    }
}

struct FakeSession {
    messages: Vec<AlertMessage>,
    stall: Option<Duration>,
    log: Arc<Mutex<MailLog>>,
}

impl MailboxSession for FakeSession {
    fn fetch_unseen(&mut self, _filter: &AlertFilter) -> Result<Vec<AlertMessage>, MailError> {
        if let Some(stall) = self.stall {
            std::thread::sleep(stall);
        }
        let seen: HashSet<u32> = self.log.lock().unwrap().seen.iter().copied().collect();
        Ok(self
            .messages
            .iter()
            .filter(|m| !seen.contains(&m.id))
            .cloned()
            .collect())
    }

    fn mark_seen(&mut self, id: u32) -> Result<(), MailError> {
        self.log.lock().unwrap().seen.push(id);
        Ok(())
    }

    fn archive(&mut self, id: u32) -> Result<(), MailError> {
        self.log.lock().unwrap().archived.push(id);
        Ok(())
    }

    fn close(self: Box<Self>) {
        self.log.lock().unwrap().closed += 1;
    }
}

impl MailboxConnector for FakeMailbox {
    fn connect(&self) -> Result<Box<dyn MailboxSession>, MailError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            messages: self.messages.clone(),
            stall: self.stall,
            log: Arc::clone(&self.log),
        }))
    }
}

// ── Brokerage ────────────────────────────────────────────────────────

/// Records orders; answers with a scripted status per symbol (default 201).
#[derive(Default)]
pub struct FakeBroker {
    pub statuses: HashMap<String, u16>,
    pub transport_failures: HashSet<String>,
    pub positions: Vec<BrokerPosition>,
    pub quotes: HashMap<String, QuoteSnapshot>,
    pub orders: Mutex<Vec<OrderRequest>>,
}

impl FakeBroker {
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn ordered_symbols(&self) -> Vec<String> {
        self.orders()
            .iter()
            .map(|o| o.order_leg_collection[0].instrument.symbol.clone())
            .collect()
    }
}

impl Brokerage for FakeBroker {
    fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, BrokerError> {
        Ok(vec![
            LinkedAccount {
                account_number: "11111111".into(),
                hash_value: "HASH-1".into(),
            },
            LinkedAccount {
                account_number: "12345678".into(),
                hash_value: "HASH-2".into(),
            },
        ])
    }

    fn account_details(&self, _account_hash: &str) -> Result<AccountDetails, BrokerError> {
        Ok(AccountDetails {
            account_number: "12345678".into(),
            account_type: "MARGIN".into(),
            balances: Balances {
                cash_balance: 1000.0,
                liquidation_value: 5000.0,
            },
            positions: self.positions.clone(),
        })
    }

    fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, QuoteSnapshot>, BrokerError> {
        Ok(symbols
            .iter()
            .filter_map(|s| self.quotes.get(s).map(|q| (s.clone(), *q)))
            .collect())
    }

    fn place_order(
        &self,
        _account_hash: &str,
        order: &OrderRequest,
    ) -> Result<OrderResponse, BrokerError> {
        self.orders.lock().unwrap().push(order.clone());
        let symbol = &order.order_leg_collection[0].instrument.symbol;
        if self.transport_failures.contains(symbol) {
            return Err(BrokerError::Transport("connection reset".into()));
        }
        let status = self.statuses.get(symbol).copied().unwrap_or(201);
        Ok(OrderResponse {
            status,
            location: (status == 201).then(|| format!("/orders/{symbol}-1")),
            body: if status == 201 { String::new() } else { "rejected".into() },
        })
    }
}
