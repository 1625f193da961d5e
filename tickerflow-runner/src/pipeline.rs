//! Scan pipeline: alerts → scanner queue → validation → watchlist.
//!
//! Each cycle reloads the open-positions snapshot, runs the alert fetch stage
//! under its timeout, then validates at most one scanner entry. Scanner entries
//! already held are dropped before the first eligible one is picked. Every
//! picked entry leaves the scanner queue whatever the validation outcome.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use tickerflow_core::{
    LimitPrice, QueueError, QueueKind, QueueStore, Sleeper, Symbol, SymbolValidator,
    ValidationResult,
};
use tracing::{error, info, warn};

use crate::alerts::{AlertIngestor, FetchOutcome};
use crate::shutdown::Shutdown;

/// What happened to the entry picked in a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Passed validation and was added to the watchlist.
    Accepted(LimitPrice),
    /// Passed validation but the watchlist already had it.
    AlreadyWatched,
    Rejected,
    DataUnavailable(String),
    /// Passed validation but the watchlist write failed. The entry is still consumed.
    WatchlistWriteFailed(String),
}

/// Result of one PROCESS_ONE step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessReport {
    /// Held symbols dropped from the scanner queue without validation.
    pub skipped_held: Vec<Symbol>,
    pub processed: Option<(Symbol, Verdict)>,
}

/// Summary of a full cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub fetch: Option<FetchOutcome>,
    pub scanner_count: usize,
    pub process: Option<ProcessReport>,
}

pub struct Pipeline {
    store: Arc<QueueStore>,
    validator: Arc<dyn SymbolValidator>,
    ingestor: Option<AlertIngestor>,
    sleeper: Arc<dyn Sleeper>,
    poll_interval: Duration,
    open_positions: BTreeSet<Symbol>,
}

impl Pipeline {
    pub fn new(
        store: Arc<QueueStore>,
        validator: Arc<dyn SymbolValidator>,
        sleeper: Arc<dyn Sleeper>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            validator,
            ingestor: None,
            sleeper,
            poll_interval,
            open_positions: BTreeSet::new(),
        }
    }

    /// Attach the alert fetch stage. Without one, cycles only drain the scanner queue.
    pub fn with_ingestor(mut self, ingestor: AlertIngestor) -> Self {
        self.ingestor = Some(ingestor);
        self
    }

    pub fn open_positions(&self) -> &BTreeSet<Symbol> {
        &self.open_positions
    }

    /// Re-read the open-positions file. On failure the previous snapshot is kept.
    pub fn reload_open_positions(&mut self) {
        match self.store.load(QueueKind::OpenPositions) {
            Ok(positions) => {
                info!(count = positions.len(), "loaded open positions");
                self.open_positions = positions;
            }
            Err(e) => error!(
                error = %e,
                "could not reload open positions, keeping previous snapshot"
            ),
        }
    }

    /// Remove scanner lines that can never be validated.
    fn prune_scanner(&self) {
        match self.store.prune_malformed(QueueKind::Scanner) {
            Ok(dropped) if !dropped.is_empty() => {
                info!(count = dropped.len(), "dropped malformed scanner lines");
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "could not prune scanner queue"),
        }
    }

    fn consume(&self, symbol: &Symbol) {
        if let Err(e) = self.store.remove_symbol(QueueKind::Scanner, symbol) {
            error!(%symbol, error = %e, "could not remove ticker from scanner");
        }
    }

    /// Take the first scanner entry that is not already held and validate it.
    ///
    /// Only a failure to read the scanner queue is returned. Write failures are
    /// logged and the picked entry still counts as consumed.
    pub fn process_one(&self) -> Result<ProcessReport, QueueError> {
        let mut report = ProcessReport::default();
        let mut picked = None;

        for symbol in self.store.load_ordered(QueueKind::Scanner)? {
            info!(%symbol, "checking ticker");
            if self.open_positions.contains(&symbol) {
                info!(%symbol, "skipping, already in open positions");
                self.consume(&symbol);
                report.skipped_held.push(symbol);
                continue;
            }
            picked = Some(symbol);
            break;
        }

        let Some(symbol) = picked else {
            return Ok(report);
        };

        info!(%symbol, "processing ticker from scanner");
        let verdict = match self.validator.validate(&symbol) {
            ValidationResult::Valid { limit_price, .. } => {
                match self.store.add_to_watchlist(symbol.clone(), limit_price) {
                    Ok(true) => Verdict::Accepted(limit_price),
                    Ok(false) => Verdict::AlreadyWatched,
                    Err(e) => {
                        error!(%symbol, error = %e, "error adding ticker to watchlist");
                        Verdict::WatchlistWriteFailed(e.to_string())
                    }
                }
            }
            ValidationResult::Invalid(_) => {
                info!(%symbol, "does not meet all validation criteria, not adding to watchlist");
                Verdict::Rejected
            }
            ValidationResult::DataUnavailable { reason, .. } => {
                warn!(%symbol, %reason, "no usable data, not adding to watchlist");
                Verdict::DataUnavailable(reason)
            }
        };
        self.consume(&symbol);

        report.processed = Some((symbol, verdict));
        Ok(report)
    }

    /// One full cycle. Failures are logged and never escape.
    pub fn run_cycle(&mut self, today: NaiveDate) -> CycleReport {
        self.reload_open_positions();

        let fetch = self
            .ingestor
            .as_ref()
            .map(|ingestor| ingestor.fetch_alerts(today));
        self.prune_scanner();

        let scanner_count = match self.store.count(QueueKind::Scanner) {
            Ok(count) => count,
            Err(e) => {
                error!(error = %e, "could not read scanner queue");
                0
            }
        };
        info!(count = scanner_count, "stocks found in scanner");

        let process = match self.process_one() {
            Ok(report) => {
                info!("scanner processing completed");
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "scanner processing failed");
                None
            }
        };

        CycleReport {
            fetch,
            scanner_count,
            process,
        }
    }

    /// Poll until shutdown, one cycle per interval.
    pub fn run(&mut self, shutdown: &Shutdown) {
        info!(interval_secs = self.poll_interval.as_secs(), "scanner active");
        while !shutdown.is_triggered() {
            self.run_cycle(chrono::Local::now().date_naive());
            if !shutdown.wait(self.poll_interval, self.sleeper.as_ref()) {
                break;
            }
        }
        info!("scanner processor stopped");
    }
}
