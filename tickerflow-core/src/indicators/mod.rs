//! Indicator implementations used by the technical validator.
//!
//! Indicators are pure functions: bar history in, numeric series out, one
//! value per bar. Warmup positions hold `f64::NAN`.
//!
//! Multi-series indicators (Bollinger) are exposed as separate named
//! instances per band, keeping the single-series `Indicator` trait unchanged.

pub mod bollinger;
pub mod crossover;
pub mod ema;

pub use bollinger::{Bollinger, BollingerBand};
pub use crossover::bars_since_cross_above;
pub use ema::{ema_of_series, Ema};

use crate::domain::Bar;

/// Trait for indicators.
///
/// Indicators take a full bar series and produce an output series of the
/// same length. The first `lookback()` values are `f64::NAN`.
///
/// No indicator value at bar t may depend on price data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ema_21", "bollinger_upper_20_2").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Create synthetic bars from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first bar),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
