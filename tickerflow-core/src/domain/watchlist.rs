//! Watchlist entries: a validated symbol paired with its limit price.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::symbol::{Symbol, SymbolError};

/// Why a watchlist line could not be turned into an entry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryError {
    #[error("line '{0}' has no limit price")]
    MissingPrice(String),

    #[error("invalid symbol in line '{line}': {source}")]
    InvalidSymbol {
        line: String,
        #[source]
        source: SymbolError,
    },

    #[error("invalid limit price '{0}'")]
    InvalidPrice(String),
}

/// Positive, finite limit price in dollars.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct LimitPrice(f64);

impl LimitPrice {
    pub fn new(value: f64) -> Result<Self, EntryError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(EntryError::InvalidPrice(value.to_string()))
        }
    }

    pub fn parse(input: &str) -> Result<Self, EntryError> {
        let value: f64 = input
            .trim()
            .parse()
            .map_err(|_| EntryError::InvalidPrice(input.trim().to_string()))?;
        Self::new(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Two-decimal fixed format, as written to the watchlist file and order payloads.
impl Display for LimitPrice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl TryFrom<f64> for LimitPrice {
    type Error = EntryError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<LimitPrice> for f64 {
    fn from(value: LimitPrice) -> Self {
        value.0
    }
}

/// A symbol that passed validation and awaits order placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub symbol: Symbol,
    pub limit_price: LimitPrice,
}

impl WatchlistEntry {
    pub fn new(symbol: Symbol, limit_price: LimitPrice) -> Self {
        Self {
            symbol,
            limit_price,
        }
    }

    /// Parse a `SYMBOL PRICE` line. Extra tokens after the price are ignored.
    pub fn parse_line(line: &str) -> Result<Self, EntryError> {
        let trimmed = line.trim();
        let mut tokens = trimmed.split_whitespace();
        let symbol_token = tokens
            .next()
            .ok_or_else(|| EntryError::MissingPrice(trimmed.to_string()))?;
        let price_token = tokens
            .next()
            .ok_or_else(|| EntryError::MissingPrice(trimmed.to_string()))?;

        let symbol = Symbol::parse(symbol_token).map_err(|source| EntryError::InvalidSymbol {
            line: trimmed.to_string(),
            source,
        })?;
        let limit_price = LimitPrice::parse(price_token)?;
        Ok(Self::new(symbol, limit_price))
    }

    /// Render as a watchlist file line (without newline).
    pub fn to_line(&self) -> String {
        format!("{} {}", self.symbol, self.limit_price)
    }
}
