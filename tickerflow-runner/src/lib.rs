//! TickerFlow Runner: the long-running loops around `tickerflow-core`.
//!
//! This crate provides:
//! - TOML configuration with environment-only secrets
//! - Mailbox collaborator (IMAP) and the timeout-guarded alert fetch stage
//! - Brokerage collaborator (Schwab Trader API)
//! - Scan pipeline: one validation per cycle, watchlist promotion
//! - Order dispatcher and account refresh
//! - Trade desk loop and Ctrl-C shutdown

pub mod alerts;
pub mod broker;
pub mod config;
pub mod desk;
pub mod dispatcher;
pub mod mailbox;
pub mod pipeline;
pub mod portfolio;
pub mod shutdown;

pub use alerts::{AlertIngestor, AlertSource, FetchOutcome, FetchSummary};
pub use broker::{
    mask_account, AccountDetails, Balances, BrokerError, BrokerPosition, Brokerage, LinkedAccount,
    OrderResponse, QuoteSnapshot, SchwabClient,
};
pub use config::{ConfigError, PipelineConfig, BROKER_TOKEN_ENV, MAIL_PASSWORD_ENV};
pub use desk::TradeDesk;
pub use dispatcher::{DispatchSettings, DispatchSummary, OrderDispatcher};
pub use mailbox::{
    AlertFilter, AlertMessage, ImapConnector, ImapCredentials, MailError, MailboxConnector,
    MailboxSession,
};
pub use pipeline::{CycleReport, Pipeline, ProcessReport, Verdict};
pub use portfolio::{resolve_account_hash, AccountRefresher, PortfolioError, PortfolioSnapshot};
pub use shutdown::Shutdown;
