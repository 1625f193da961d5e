//! TickerFlow Core: domain types, alert extraction, queue storage, indicators, validation.
//!
//! This crate contains the decision logic of the signal-to-order pipeline:
//! - Domain types (symbols, bars, watchlist entries, order payloads, positions)
//! - Ticker extraction from broker alert text
//! - File-backed queues (scanner, open positions, watchlist)
//! - Indicators (EMA, Bollinger Bands, crossover age)
//! - Market data provider trait with a Yahoo Finance implementation
//! - Retry policy with an injectable sleeper
//! - Technical validator (EMA trend + bullish bar + upper-band breakout)

pub mod data;
pub mod domain;
pub mod extract;
pub mod indicators;
pub mod queue;
pub mod retry;
pub mod validator;

pub use domain::{
    Bar, EntryError, LimitPrice, OrderOutcome, OrderRequest, PositionSnapshot, Symbol,
    SymbolError, WatchlistEntry,
};
pub use extract::TickerExtractor;
pub use queue::{QueueError, QueueKind, QueuePaths, QueueStore, WatchlistLine};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use validator::{
    SymbolValidator, TechnicalValidator, ValidationChecks, ValidationReport, ValidationResult,
    ValidatorConfig,
};
