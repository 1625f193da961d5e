//! Trade desk loop: dispatch the watchlist when it changes, refresh the account.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tickerflow_core::{QueueKind, QueueStore, Sleeper};
use tracing::{error, info};

use crate::dispatcher::{DispatchSummary, OrderDispatcher};
use crate::portfolio::AccountRefresher;
use crate::shutdown::Shutdown;

pub struct TradeDesk {
    dispatcher: OrderDispatcher,
    refresher: AccountRefresher,
    store: Arc<QueueStore>,
    sleeper: Arc<dyn Sleeper>,
    refresh_interval: Duration,
    last_modified: Option<SystemTime>,
}

impl TradeDesk {
    pub fn new(
        dispatcher: OrderDispatcher,
        refresher: AccountRefresher,
        store: Arc<QueueStore>,
        sleeper: Arc<dyn Sleeper>,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            dispatcher,
            refresher,
            store,
            sleeper,
            refresh_interval,
            last_modified: None,
        }
    }

    fn watchlist_path(&self) -> PathBuf {
        self.store.paths().path(QueueKind::Watchlist).to_path_buf()
    }

    fn watchlist_modified(&self) -> Option<SystemTime> {
        std::fs::metadata(self.watchlist_path())
            .and_then(|m| m.modified())
            .ok()
    }

    fn watchlist_has_entries(&self) -> bool {
        match self.store.is_empty(QueueKind::Watchlist) {
            Ok(empty) => !empty,
            Err(e) => {
                error!(error = %e, "could not read watchlist");
                false
            }
        }
    }

    fn dispatch(&self) -> Option<DispatchSummary> {
        match self.dispatcher.dispatch_watchlist() {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(error = %e, "error processing watchlist");
                None
            }
        }
    }

    fn refresh_account(&self) {
        if let Err(e) = self.refresher.refresh() {
            error!(error = %e, "account refresh failed");
        }
    }

    /// Initial refresh, then dispatch whatever is already waiting.
    pub fn startup(&mut self) -> Option<DispatchSummary> {
        info!("fetching initial account information");
        self.refresh_account();

        let summary = if self.watchlist_has_entries() {
            info!("found items in watchlist, processing orders");
            let summary = self.dispatch();
            self.refresh_account();
            summary
        } else {
            info!("watchlist is empty");
            None
        };
        self.last_modified = self.watchlist_modified();
        summary
    }

    /// One refresh period: dispatch if the watchlist changed and is non-empty, then refresh.
    pub fn tick(&mut self) -> Option<DispatchSummary> {
        let mut summary = None;
        if let Some(modified) = self.watchlist_modified() {
            if self.last_modified != Some(modified) {
                if self.watchlist_has_entries() {
                    info!("detected changes in watchlist, processing orders");
                    summary = self.dispatch();
                }
                // Record the post-dispatch state so our own truncation is not a change
                self.last_modified = self.watchlist_modified();
            }
        }

        self.refresh_account();
        self.log_watchlist_status();
        summary
    }

    fn log_watchlist_status(&self) {
        match self.store.load_ordered(QueueKind::Watchlist) {
            Ok(symbols) if !symbols.is_empty() => {
                let list: Vec<&str> = symbols.iter().map(|s| s.as_str()).collect();
                info!(symbols = %list.join(", "), "watchlist");
            }
            Ok(_) => info!("watchlist is empty"),
            Err(e) => error!(error = %e, "error reading watchlist"),
        }
    }

    pub fn run(&mut self, shutdown: &Shutdown) {
        self.startup();
        while shutdown.wait(self.refresh_interval, self.sleeper.as_ref()) {
            self.tick();
        }
        info!("trade desk stopped");
    }
}
