//! Order dispatcher: watchlist entries → BUY LIMIT orders.
//!
//! Each entry gets exactly one attempt. A placed order is followed by a short
//! pause, anything else by a longer one, and the entry is consumed either way.
//! After a sweep the watchlist file is truncated.

use std::sync::Arc;
use std::time::Duration;

use tickerflow_core::{
    EntryError, OrderOutcome, OrderRequest, QueueError, QueueKind, QueueStore, Sleeper,
    WatchlistEntry,
};
use tracing::{error, info, warn};

use crate::broker::Brokerage;

/// Order size and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub quantity: u32,
    pub success_pause: Duration,
    pub failure_pause: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            quantity: 1,
            success_pause: Duration::from_secs(3),
            failure_pause: Duration::from_secs(10),
        }
    }
}

/// Tally of one watchlist sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Orders sent to the brokerage (or attempted and failed in transport).
    pub attempted: usize,
    pub placed: usize,
    pub rejected: usize,
    pub errored: usize,
    /// Lines that never became an order.
    pub malformed: usize,
}

pub struct OrderDispatcher {
    broker: Arc<dyn Brokerage>,
    store: Arc<QueueStore>,
    sleeper: Arc<dyn Sleeper>,
    account_hash: String,
    settings: DispatchSettings,
}

impl OrderDispatcher {
    pub fn new(
        broker: Arc<dyn Brokerage>,
        store: Arc<QueueStore>,
        sleeper: Arc<dyn Sleeper>,
        account_hash: impl Into<String>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            broker,
            store,
            sleeper,
            account_hash: account_hash.into(),
            settings,
        }
    }

    /// Submit one BUY LIMIT order. Does not pause.
    pub fn place_order(&self, entry: &WatchlistEntry) -> OrderOutcome {
        let order = OrderRequest::buy_limit(entry, self.settings.quantity);
        info!(symbol = %entry.symbol, limit_price = %entry.limit_price, "placing limit order");

        match self.broker.place_order(&self.account_hash, &order) {
            Ok(resp) if resp.is_success() => {
                let order_id = resp.order_id();
                info!(
                    symbol = %entry.symbol,
                    order_id = order_id.as_deref().unwrap_or("N/A"),
                    "order placed"
                );
                OrderOutcome::Placed { order_id }
            }
            Ok(resp) => {
                error!(
                    symbol = %entry.symbol,
                    status = resp.status,
                    body = %resp.body,
                    "order rejected"
                );
                OrderOutcome::Rejected {
                    status: resp.status,
                    body: resp.body,
                }
            }
            Err(e) => {
                error!(symbol = %entry.symbol, error = %e, "order submission failed");
                OrderOutcome::Error(e.to_string())
            }
        }
    }

    /// Place one order per watchlist line, then truncate the watchlist.
    ///
    /// Lines without a price are skipped with a warning. Lines with a bad
    /// symbol or price count as failures and get the failure pause.
    pub fn dispatch_watchlist(&self) -> Result<DispatchSummary, QueueError> {
        let lines = self.store.watchlist_lines()?;
        let mut summary = DispatchSummary::default();
        if lines.is_empty() {
            info!("watchlist is empty, no orders to place");
            return Ok(summary);
        }

        info!(count = lines.len(), "processing watchlist");
        for line in &lines {
            let entry = match &line.parsed {
                Ok(entry) => entry,
                Err(EntryError::MissingPrice(raw)) => {
                    warn!(line = line.line_no, raw = %raw, "invalid line format");
                    summary.malformed += 1;
                    continue;
                }
                Err(e) => {
                    error!(
                        line = line.line_no,
                        raw = %line.raw,
                        error = %e,
                        "invalid watchlist entry"
                    );
                    summary.malformed += 1;
                    self.sleeper.sleep(self.settings.failure_pause);
                    continue;
                }
            };

            summary.attempted += 1;
            match self.place_order(entry) {
                OrderOutcome::Placed { .. } => {
                    summary.placed += 1;
                    self.sleeper.sleep(self.settings.success_pause);
                }
                OrderOutcome::Rejected { .. } => {
                    summary.rejected += 1;
                    self.sleeper.sleep(self.settings.failure_pause);
                }
                OrderOutcome::Error(_) => {
                    summary.errored += 1;
                    self.sleeper.sleep(self.settings.failure_pause);
                }
            }
        }

        info!("clearing watchlist after processing all orders");
        self.store.clear(QueueKind::Watchlist)?;
        info!(
            placed = summary.placed,
            rejected = summary.rejected,
            errored = summary.errored,
            malformed = summary.malformed,
            "watchlist sweep complete"
        );
        Ok(summary)
    }
}
