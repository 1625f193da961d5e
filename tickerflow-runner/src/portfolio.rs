//! Account refresh: balances, positions with P&L, and the open-positions file.

use std::sync::Arc;

use thiserror::Error;
use tickerflow_core::{PositionSnapshot, QueueError, QueueKind, QueueStore, Symbol};
use tracing::{debug, info, warn};

use crate::broker::{mask_account, BrokerError, Brokerage};

#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Account state after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioSnapshot {
    pub masked_account: String,
    pub account_type: String,
    pub cash_balance: f64,
    pub liquidation_value: f64,
    pub positions: Vec<PositionSnapshot>,
}

impl PortfolioSnapshot {
    pub fn total_unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(PositionSnapshot::unrealized_pnl).sum()
    }
}

/// Find the API hash for a plain account number.
pub fn resolve_account_hash(
    broker: &dyn Brokerage,
    account_number: &str,
) -> Result<String, BrokerError> {
    broker
        .linked_accounts()?
        .into_iter()
        .find(|account| account.account_number == account_number)
        .map(|account| account.hash_value)
        .ok_or_else(|| BrokerError::AccountNotFound(mask_account(account_number)))
}

/// Pulls the account snapshot and mirrors held symbols into the open-positions queue.
pub struct AccountRefresher {
    broker: Arc<dyn Brokerage>,
    store: Arc<QueueStore>,
    account_hash: String,
}

impl AccountRefresher {
    pub fn new(
        broker: Arc<dyn Brokerage>,
        store: Arc<QueueStore>,
        account_hash: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            store,
            account_hash: account_hash.into(),
        }
    }

    /// Fetch balances, positions and quotes; overwrite the open-positions file.
    ///
    /// Quote failures are not fatal: affected positions are priced at 0.
    pub fn refresh(&self) -> Result<PortfolioSnapshot, PortfolioError> {
        let details = self.broker.account_details(&self.account_hash)?;

        let symbols: Vec<String> = details.positions.iter().map(|p| p.symbol.clone()).collect();
        let quotes = match self.broker.quotes(&symbols) {
            Ok(quotes) => quotes,
            Err(e) => {
                warn!(error = %e, "could not fetch quotes");
                Default::default()
            }
        };

        let positions: Vec<PositionSnapshot> = details
            .positions
            .iter()
            .map(|p| PositionSnapshot {
                symbol: p.symbol.clone(),
                quantity: p.net_quantity(),
                average_price: p.average_price,
                current_price: quotes.get(&p.symbol).map_or(0.0, |q| q.price()),
            })
            .collect();

        let held: Vec<Symbol> = positions
            .iter()
            .filter_map(|p| match Symbol::parse(&p.symbol) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    debug!(symbol = %p.symbol, error = %e, "position is not an equity ticker");
                    None
                }
            })
            .collect();
        if held.is_empty() {
            self.store.clear(QueueKind::OpenPositions)?;
        } else {
            self.store.replace(QueueKind::OpenPositions, &held)?;
        }

        let snapshot = PortfolioSnapshot {
            masked_account: mask_account(&details.account_number),
            account_type: details.account_type,
            cash_balance: details.balances.cash_balance,
            liquidation_value: details.balances.liquidation_value,
            positions,
        };
        log_snapshot(&snapshot);
        Ok(snapshot)
    }
}

fn log_snapshot(snapshot: &PortfolioSnapshot) {
    info!(
        account = %snapshot.masked_account,
        account_type = %snapshot.account_type,
        cash_balance = format_args!("{:.2}", snapshot.cash_balance),
        liquidation_value = format_args!("{:.2}", snapshot.liquidation_value),
        "account refreshed"
    );
    if snapshot.positions.is_empty() {
        info!("no positions available");
    }
    for p in &snapshot.positions {
        info!(
            symbol = %p.symbol,
            quantity = p.quantity,
            average_price = format_args!("{:.2}", p.average_price),
            pnl = format_args!("{:+.2}", p.unrealized_pnl()),
            pnl_percent = format_args!("{:+.2}", p.pnl_percent()),
            "position"
        );
    }
}
