//! Brokerage order payloads and order outcomes.
//!
//! The payload mirrors the brokerage's JSON order schema: a single-leg
//! equity order with string-encoded price.

use serde::{Deserialize, Serialize};

use super::watchlist::WatchlistEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    Normal,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Duration {
    GoodTillCancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStrategyType {
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Instruction {
    Buy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    Equity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderInstrument {
    pub symbol: String,
    pub asset_type: AssetType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLeg {
    pub instruction: Instruction,
    pub quantity: u32,
    pub instrument: OrderInstrument,
}

/// Order request as submitted to the brokerage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_type: OrderType,
    pub session: Session,
    pub duration: Duration,
    pub order_strategy_type: OrderStrategyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub order_leg_collection: Vec<OrderLeg>,
}

impl OrderRequest {
    /// Single-leg BUY limit order, good till cancelled, normal session.
    pub fn buy_limit(entry: &WatchlistEntry, quantity: u32) -> Self {
        Self {
            order_type: OrderType::Limit,
            session: Session::Normal,
            duration: Duration::GoodTillCancel,
            order_strategy_type: OrderStrategyType::Single,
            price: Some(entry.limit_price.to_string()),
            order_leg_collection: vec![OrderLeg {
                instruction: Instruction::Buy,
                quantity,
                instrument: OrderInstrument {
                    symbol: entry.symbol.to_string(),
                    asset_type: AssetType::Equity,
                },
            }],
        }
    }
}

/// Result of one order attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderOutcome {
    /// Accepted (HTTP 200/201). The id comes from the `Location` header when present.
    Placed { order_id: Option<String> },
    /// The brokerage answered with a non-success status.
    Rejected { status: u16, body: String },
    /// Transport failure or malformed input; the order never reached the brokerage.
    Error(String),
}

impl OrderOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed { .. })
    }
}
