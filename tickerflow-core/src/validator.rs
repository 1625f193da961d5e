//! Technical validator: EMA trend, bullish bar, and upper-band breakout.
//!
//! A symbol is accepted when, on the most recent daily bar:
//! - EMA(fast) > EMA(slow)
//! - close > open
//! - close > upper Bollinger band
//!
//! All comparisons are strict. The limit price of an accepted symbol is the
//! bar's low. Bars since the fast EMA crossed above the slow one are reported
//! but never gate acceptance.

use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::data::{history_window, DataError, DataProvider};
use crate::domain::{Bar, LimitPrice, Symbol};
use crate::indicators::{bars_since_cross_above, ema_of_series, Bollinger, Indicator};
use crate::retry::{RetryPolicy, Sleeper};

/// Rule parameters and history/retry settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub band_period: usize,
    pub band_width: f64,
    /// Months of daily history requested per symbol.
    pub history_months: u32,
    pub retry: RetryPolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            fast_period: 21,
            slow_period: 100,
            band_period: 20,
            band_width: 2.0,
            history_months: 6,
            retry: RetryPolicy::fixed(2, Duration::from_secs(1)),
        }
    }
}

impl ValidatorConfig {
    /// Check parameter sanity. Returns a description of the first problem.
    pub fn check(&self) -> Result<(), String> {
        if self.fast_period == 0 {
            return Err("fast_period must be at least 1".into());
        }
        if self.fast_period >= self.slow_period {
            return Err(format!(
                "fast_period ({}) must be shorter than slow_period ({})",
                self.fast_period, self.slow_period
            ));
        }
        if self.band_period < 2 {
            return Err("band_period must be at least 2".into());
        }
        if !(self.band_width.is_finite() && self.band_width > 0.0) {
            return Err(format!("band_width must be positive, got {}", self.band_width));
        }
        if self.history_months == 0 {
            return Err("history_months must be at least 1".into());
        }
        Ok(())
    }
}

/// The three sub-checks evaluated on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationChecks {
    pub ema_trend: bool,
    pub bullish_bar: bool,
    pub above_upper_band: bool,
}

impl ValidationChecks {
    pub fn all_pass(&self) -> bool {
        self.ema_trend && self.bullish_bar && self.above_upper_band
    }
}

/// Metrics computed for one symbol on its most recent bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub symbol: Symbol,
    pub date: NaiveDate,
    pub close: f64,
    pub open: f64,
    pub low: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub band_upper: f64,
    pub band_middle: f64,
    /// Only computed when the EMA trend check passes.
    pub bars_since_crossover: Option<usize>,
    pub checks: ValidationChecks,
}

/// Outcome of validating one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Valid {
        report: ValidationReport,
        limit_price: LimitPrice,
    },
    Invalid(ValidationReport),
    DataUnavailable {
        symbol: Symbol,
        reason: String,
    },
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    pub fn limit_price(&self) -> Option<LimitPrice> {
        match self {
            Self::Valid { limit_price, .. } => Some(*limit_price),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Valid { report, .. } | Self::Invalid(report) => Some(report),
            Self::DataUnavailable { .. } => None,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            Self::Valid { report, .. } | Self::Invalid(report) => &report.symbol,
            Self::DataUnavailable { symbol, .. } => symbol,
        }
    }
}

impl Display for ValidationResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid { limit_price, .. } => write!(f, "PASSED (limit {limit_price})"),
            Self::Invalid(_) => write!(f, "FAILED"),
            Self::DataUnavailable { reason, .. } => write!(f, "DATA UNAVAILABLE ({reason})"),
        }
    }
}

/// Anything that can accept or reject a symbol.
pub trait SymbolValidator: Send + Sync {
    fn validate(&self, symbol: &Symbol) -> ValidationResult;
}

/// Validator backed by a market data provider.
pub struct TechnicalValidator {
    provider: Arc<dyn DataProvider>,
    sleeper: Arc<dyn Sleeper>,
    config: ValidatorConfig,
}

impl TechnicalValidator {
    pub fn new(
        provider: Arc<dyn DataProvider>,
        sleeper: Arc<dyn Sleeper>,
        config: ValidatorConfig,
    ) -> Self {
        Self {
            provider,
            sleeper,
            config,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Fetch history ending at `today` and evaluate the rule.
    pub fn validate_as_of(&self, symbol: &Symbol, today: NaiveDate) -> ValidationResult {
        info!(%symbol, provider = self.provider.name(), "validating");

        if !self.provider.is_available() {
            warn!(%symbol, provider = self.provider.name(), "data provider unavailable");
            return ValidationResult::DataUnavailable {
                symbol: symbol.clone(),
                reason: format!("{} is not accepting requests", self.provider.name()),
            };
        }

        let bars = match self.fetch_history(symbol, today) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(%symbol, error = %e, "no usable price history");
                return ValidationResult::DataUnavailable {
                    symbol: symbol.clone(),
                    reason: e.to_string(),
                };
            }
        };
        info!(%symbol, bars = bars.len(), "downloaded price history");

        let result = evaluate(symbol, &bars, &self.config);
        log_result(&result);
        result
    }

    fn fetch_history(&self, symbol: &Symbol, today: NaiveDate) -> Result<Vec<Bar>, DataError> {
        let (start, end) = history_window(today, self.config.history_months);
        let max_attempts = self.config.retry.max_attempts.max(1);
        self.config.retry.run(
            self.sleeper.as_ref(),
            |attempt| {
                info!(%symbol, attempt, max_attempts, "downloading history");
                self.provider.fetch(symbol, start, end)
            },
            DataError::is_retryable,
        )
    }
}

impl SymbolValidator for TechnicalValidator {
    fn validate(&self, symbol: &Symbol) -> ValidationResult {
        self.validate_as_of(symbol, chrono::Local::now().date_naive())
    }
}

/// Apply the rule to a bar series ordered oldest to newest.
///
/// Fewer bars than the slow EMA period, or any indicator still undefined on
/// the last bar, yields `DataUnavailable`.
pub fn evaluate(symbol: &Symbol, bars: &[Bar], config: &ValidatorConfig) -> ValidationResult {
    let unavailable = |reason: String| ValidationResult::DataUnavailable {
        symbol: symbol.clone(),
        reason,
    };

    if bars.len() < config.slow_period {
        return unavailable(format!(
            "{} bars available, {} required",
            bars.len(),
            config.slow_period
        ));
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ema_fast_series = ema_of_series(&closes, config.fast_period);
    let ema_slow_series = ema_of_series(&closes, config.slow_period);
    let band_period = config.band_period.max(2);
    let upper = Bollinger::upper(band_period, config.band_width).compute(bars);
    let middle = Bollinger::middle(band_period, config.band_width).compute(bars);

    let last = bars.len() - 1;
    let latest = &bars[last];
    let ema_fast = ema_fast_series[last];
    let ema_slow = ema_slow_series[last];
    let band_upper = upper[last];
    let band_middle = middle[last];

    let values = [
        latest.close,
        latest.open,
        latest.low,
        ema_fast,
        ema_slow,
        band_upper,
        band_middle,
    ];
    if values.iter().any(|v| !v.is_finite()) {
        return unavailable("indicator values undefined on latest bar".into());
    }

    let checks = ValidationChecks {
        ema_trend: ema_fast > ema_slow,
        bullish_bar: latest.is_bullish(),
        above_upper_band: latest.close > band_upper,
    };

    let bars_since_crossover = if checks.ema_trend {
        bars_since_cross_above(&ema_fast_series, &ema_slow_series)
    } else {
        None
    };

    let report = ValidationReport {
        symbol: symbol.clone(),
        date: latest.date,
        close: latest.close,
        open: latest.open,
        low: latest.low,
        ema_fast,
        ema_slow,
        band_upper,
        band_middle,
        bars_since_crossover,
        checks,
    };

    if !checks.all_pass() {
        return ValidationResult::Invalid(report);
    }

    match LimitPrice::new(latest.low) {
        Ok(limit_price) => ValidationResult::Valid {
            report,
            limit_price,
        },
        Err(e) => unavailable(format!("latest low is not a usable limit price: {e}")),
    }
}

fn pass_fail(ok: bool) -> &'static str {
    if ok {
        "PASS"
    } else {
        "FAIL"
    }
}

fn log_result(result: &ValidationResult) {
    let Some(report) = result.report() else {
        return;
    };
    let symbol = &report.symbol;
    let crossover = report
        .bars_since_crossover
        .map_or_else(|| "N/A".to_string(), |n| format!("{n} bars"));

    info!(
        %symbol,
        date = %report.date,
        close = format_args!("{:.2}", report.close),
        open = format_args!("{:.2}", report.open),
        low = format_args!("{:.2}", report.low),
        ema_fast = format_args!("{:.2}", report.ema_fast),
        ema_slow = format_args!("{:.2}", report.ema_slow),
        band_upper = format_args!("{:.2}", report.band_upper),
        band_middle = format_args!("{:.2}", report.band_middle),
        bars_since_crossover = %crossover,
        "validation metrics"
    );
    info!(
        %symbol,
        ema_trend = pass_fail(report.checks.ema_trend),
        bullish_bar = pass_fail(report.checks.bullish_bar),
        above_upper_band = pass_fail(report.checks.above_upper_band),
        status = %result,
        "validation checks"
    );
}
