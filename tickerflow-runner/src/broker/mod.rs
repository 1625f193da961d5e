//! Brokerage collaborator: linked accounts, account details, quotes, order placement.

mod schwab;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickerflow_core::OrderRequest;

pub use schwab::SchwabClient;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("brokerage transport error: {0}")]
    Transport(String),

    #[error("brokerage returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected brokerage response: {0}")]
    Decode(String),

    #[error("account {0} not found in linked accounts")]
    AccountNotFound(String),
}

/// Account number and the opaque hash the API uses to address it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccount {
    pub account_number: String,
    pub hash_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub cash_balance: f64,
    pub liquidation_value: f64,
}

/// One raw position line as reported by the brokerage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub long_quantity: f64,
    pub short_quantity: f64,
    pub average_price: f64,
}

impl BrokerPosition {
    pub fn net_quantity(&self) -> f64 {
        self.long_quantity - self.short_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountDetails {
    pub account_number: String,
    pub account_type: String,
    pub balances: Balances,
    pub positions: Vec<BrokerPosition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteSnapshot {
    pub last_price: Option<f64>,
    pub mark: Option<f64>,
}

impl QuoteSnapshot {
    /// Last trade price, falling back to the mark. 0.0 when neither is usable.
    pub fn price(&self) -> f64 {
        self.last_price
            .filter(|p| *p != 0.0)
            .or(self.mark)
            .unwrap_or(0.0)
    }
}

/// Raw result of an order submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderResponse {
    pub status: u16,
    /// `Location` header, which carries the new order's URL when present.
    pub location: Option<String>,
    pub body: String,
}

impl OrderResponse {
    pub fn is_success(&self) -> bool {
        matches!(self.status, 200 | 201)
    }

    /// Trailing path segment of the `Location` header.
    pub fn order_id(&self) -> Option<String> {
        self.location
            .as_deref()
            .map(|loc| loc.rsplit('/').next().unwrap_or(loc).to_string())
            .filter(|id| !id.is_empty())
    }
}

/// Brokerage API as seen by the pipeline.
pub trait Brokerage: Send + Sync {
    fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, BrokerError>;

    /// Balances and positions for the account addressed by `account_hash`.
    fn account_details(&self, account_hash: &str) -> Result<AccountDetails, BrokerError>;

    fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, QuoteSnapshot>, BrokerError>;

    fn place_order(
        &self,
        account_hash: &str,
        order: &OrderRequest,
    ) -> Result<OrderResponse, BrokerError>;
}

/// `*******123`: all but the last three digits hidden.
pub fn mask_account(account_number: &str) -> String {
    let chars: Vec<char> = account_number.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(3)..].iter().collect();
    format!("*******{tail}")
}
