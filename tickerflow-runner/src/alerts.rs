//! Alert fetch stage: mailbox → ticker extraction → scanner queue, under a hard timeout.
//!
//! The mailbox work runs on a detached worker thread. The caller waits up to
//! the configured timeout; past it the worker is abandoned and told to stop.
//! An abandoned worker checks its cancel flag before each message, so it never
//! writes to the scanner queue after the deadline has been reported, and the
//! messages it did not reach stay unseen for the next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{Days, NaiveDate};
use tickerflow_core::{QueueKind, QueueStore, TickerExtractor};
use tracing::{debug, error, info, warn};

use crate::mailbox::{AlertFilter, MailError, MailboxConnector};

/// What one fetch stage accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub messages: usize,
    pub symbols_added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed(FetchSummary),
    TimedOut,
    Failed(String),
}

/// Sender/subject criteria plus how far back to look.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSource {
    pub from_address: String,
    pub subject_contains: String,
    pub lookback_days: u32,
}

impl AlertSource {
    pub fn filter_for(&self, today: NaiveDate) -> AlertFilter {
        AlertFilter {
            from_address: self.from_address.clone(),
            subject_contains: self.subject_contains.clone(),
            since: today
                .checked_sub_days(Days::new(u64::from(self.lookback_days)))
                .unwrap_or(today),
        }
    }
}

/// Pulls alert mail into the scanner queue.
pub struct AlertIngestor {
    connector: Arc<dyn MailboxConnector>,
    store: Arc<QueueStore>,
    extractor: Arc<TickerExtractor>,
    source: AlertSource,
    timeout: Duration,
}

impl AlertIngestor {
    pub fn new(
        connector: Arc<dyn MailboxConnector>,
        store: Arc<QueueStore>,
        extractor: Arc<TickerExtractor>,
        source: AlertSource,
        timeout: Duration,
    ) -> Self {
        Self {
            connector,
            store,
            extractor,
            source,
            timeout,
        }
    }

    /// Run one fetch stage. Never blocks longer than the configured timeout.
    pub fn fetch_alerts(&self, today: NaiveDate) -> FetchOutcome {
        let cancelled = Arc::new(AtomicBool::new(false));
        let task = AlertTask {
            connector: Arc::clone(&self.connector),
            store: Arc::clone(&self.store),
            extractor: Arc::clone(&self.extractor),
            filter: self.source.filter_for(today),
            cancelled: Arc::clone(&cancelled),
        };

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("alert-fetch".into())
            .spawn(move || {
                // The receiver is gone once the caller has timed out
                let _ = tx.send(task.run());
            });
        if let Err(e) = spawned {
            error!(error = %e, "could not start alert fetch");
            return FetchOutcome::Failed(e.to_string());
        }

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(summary)) => {
                debug!(
                    messages = summary.messages,
                    added = summary.symbols_added,
                    "alert fetch complete"
                );
                FetchOutcome::Completed(summary)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "email check skipped");
                FetchOutcome::Failed(e.to_string())
            }
            Err(RecvTimeoutError::Timeout) => {
                cancelled.store(true, Ordering::SeqCst);
                warn!(
                    timeout_secs = self.timeout.as_secs_f64(),
                    "email check timed out, continuing with scanner processing"
                );
                FetchOutcome::TimedOut
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("alert fetch worker exited without reporting");
                FetchOutcome::Failed("alert fetch worker exited without reporting".into())
            }
        }
    }
}

struct AlertTask {
    connector: Arc<dyn MailboxConnector>,
    store: Arc<QueueStore>,
    extractor: Arc<TickerExtractor>,
    filter: AlertFilter,
    cancelled: Arc<AtomicBool>,
}

impl AlertTask {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn run(self) -> Result<FetchSummary, MailError> {
        let mut session = self.connector.connect()?;
        let messages = match session.fetch_unseen(&self.filter) {
            Ok(messages) => messages,
            Err(e) => {
                session.close();
                return Err(e);
            }
        };

        let mut summary = FetchSummary::default();
        for (index, message) in messages.iter().enumerate() {
            if self.is_cancelled() {
                debug!(remaining = messages.len() - index, "alert fetch abandoned");
                break;
            }

            let symbols = self.extractor.extract(&message.full_text());
            if !symbols.is_empty() {
                match self.store.append_unique(QueueKind::Scanner, &symbols) {
                    Ok(added) => {
                        summary.symbols_added += added;
                        let list: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
                        info!(
                            tickers = %list.join(", "),
                            "signal received, ticker(s) added to scanner"
                        );
                    }
                    Err(e) => {
                        // Leave the message unseen so the next cycle retries it
                        error!(id = message.id, error = %e, "error updating scanner queue");
                        continue;
                    }
                }
            }

            if let Err(e) = session.mark_seen(message.id) {
                warn!(id = message.id, error = %e, "could not flag alert as seen");
            }
            if let Err(e) = session.archive(message.id) {
                warn!(id = message.id, error = %e, "could not archive alert");
            }
            summary.messages += 1;
        }

        session.close();
        Ok(summary)
    }
}
