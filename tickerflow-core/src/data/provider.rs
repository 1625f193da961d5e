//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over daily price sources so the validator
//! can be exercised against canned series in tests.

use chrono::{Months, NaiveDate};
use thiserror::Error;

use crate::domain::{Bar, Symbol};

/// Structured error types for market data fetches.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("no price data returned for {symbol}")]
    Empty { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,
}

impl DataError {
    /// Whether the fetch is worth another attempt. Everything except an
    /// empty result, an unknown symbol and a tripped breaker.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::SymbolNotFound { .. } | Self::Empty { .. } | Self::CircuitBreakerTripped
        )
    }
}

/// Trait for daily price providers.
///
/// Implementations return bars ordered oldest to newest. An empty result is
/// reported as `DataError::Empty`, never as `Ok(vec![])`.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily OHLC bars for a symbol over an inclusive date range.
    fn fetch(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, DataError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool;
}

/// Inclusive date range covering the last `months` months up to `today`.
pub fn history_window(today: NaiveDate, months: u32) -> (NaiveDate, NaiveDate) {
    let start = today
        .checked_sub_months(Months::new(months))
        .unwrap_or(NaiveDate::MIN);
    (start, today)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_classification() {
        assert!(DataError::Timeout("x".into()).is_retryable());
        assert!(DataError::NetworkUnreachable("x".into()).is_retryable());
        assert!(DataError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(DataError::Http { status: 503 }.is_retryable());
        assert!(DataError::Http { status: 400 }.is_retryable());
        assert!(DataError::ResponseFormatChanged("<html>".into()).is_retryable());
        assert!(!DataError::SymbolNotFound { symbol: "ZZZZ".into() }.is_retryable());
        assert!(!DataError::Empty { symbol: "ZZZZ".into() }.is_retryable());
        assert!(!DataError::CircuitBreakerTripped.is_retryable());
    }

    #[test]
    fn six_month_window() {
        let today = NaiveDate::from_ymd_opt(2024, 8, 31).unwrap();
        let (start, end) = history_window(today, 6);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(end, today);
    }
}
