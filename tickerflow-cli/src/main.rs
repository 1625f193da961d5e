//! TickerFlow CLI: scan, trade, validate, and positions commands.
//!
//! Commands:
//! - `scan`: pull alert mail into the scanner queue and validate one symbol per cycle
//! - `trade`: dispatch the watchlist as BUY LIMIT orders and keep the account refreshed
//! - `validate`: run the technical rule against symbols without touching any queue
//! - `positions`: refresh the open positions file once and print the account summary

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tickerflow_core::data::{CircuitBreaker, YahooProvider};
use tickerflow_core::{
    QueueStore, Sleeper, Symbol, SymbolValidator, TechnicalValidator, ThreadSleeper,
    TickerExtractor, ValidationResult,
};
use tickerflow_runner::config::secret_from_env;
use tickerflow_runner::{
    resolve_account_hash, AccountRefresher, AlertIngestor, AlertSource, Brokerage,
    DispatchSettings, ImapConnector, ImapCredentials, OrderDispatcher, Pipeline, PipelineConfig,
    SchwabClient, Shutdown, TradeDesk, BROKER_TOKEN_ENV, MAIL_PASSWORD_ENV,
};
use tracing::{info, Level};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(
    name = "tickerflow",
    about = "TickerFlow CLI: scan alerts, validate breakouts, place watchlist orders"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at DEBUG instead of INFO.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scan pipeline until Ctrl-C.
    Scan {
        /// Skip the mailbox and only drain the existing scanner queue.
        #[arg(long)]
        no_mail: bool,
    },

    /// Run the trade desk until Ctrl-C.
    Trade,

    /// Validate symbols and print the verdicts. Queues are left untouched.
    Validate {
        /// Symbols to check (e.g., AAPL MSFT).
        #[arg(required = true)]
        symbols: Vec<String>,
    },

    /// Refresh the open positions file once.
    Positions,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    init_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Scan { no_mail } => run_scan(&config, no_mail),
        Commands::Trade => run_trade(&config),
        Commands::Validate { symbols } => run_validate(&config, &symbols),
        Commands::Positions => run_positions(&config),
    }
}

fn init_logging(config: &PipelineConfig, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(Arc::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn build_validator(
    config: &PipelineConfig,
    sleeper: Arc<dyn Sleeper>,
) -> Result<TechnicalValidator> {
    let breaker = Arc::new(CircuitBreaker::default_provider());
    let provider = YahooProvider::new(breaker, config.socket_timeout())?;
    Ok(TechnicalValidator::new(
        Arc::new(provider),
        sleeper,
        config.validator_config(),
    ))
}

fn build_broker(config: &PipelineConfig) -> Result<Arc<dyn Brokerage>> {
    if config.broker.account_number.trim().is_empty() {
        bail!("broker.account_number must be set in the config file");
    }
    let token = secret_from_env(BROKER_TOKEN_ENV)?;
    let client = SchwabClient::new(&config.broker.base_url, token, config.socket_timeout())?;
    Ok(Arc::new(client))
}

fn run_scan(config: &PipelineConfig, no_mail: bool) -> Result<()> {
    let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper);
    let store = Arc::new(QueueStore::new(config.queue_paths()));
    let validator = build_validator(config, Arc::clone(&sleeper))?;

    let mut pipeline = Pipeline::new(
        Arc::clone(&store),
        Arc::new(validator),
        Arc::clone(&sleeper),
        config.poll_interval(),
    );

    if no_mail {
        info!("mailbox disabled; draining scanner queue only");
    } else {
        let mail = &config.mail;
        let credentials = ImapCredentials {
            username: mail.username.clone(),
            password: secret_from_env(MAIL_PASSWORD_ENV)?,
        };
        let connector = ImapConnector::new(
            &mail.host,
            mail.port,
            &mail.folder,
            &mail.archive_folder,
            credentials,
            config.socket_timeout(),
        );
        let source = AlertSource {
            from_address: mail.from_address.clone(),
            subject_contains: mail.subject_contains.clone(),
            lookback_days: mail.lookback_days,
        };
        let ingestor = AlertIngestor::new(
            Arc::new(connector),
            Arc::clone(&store),
            Arc::new(TickerExtractor::default()),
            source,
            Duration::from_secs(mail.fetch_timeout_secs),
        );
        pipeline = pipeline.with_ingestor(ingestor);
    }

    let shutdown = Shutdown::new();
    shutdown.install_ctrl_c()?;
    pipeline.run(&shutdown);
    Ok(())
}

fn run_trade(config: &PipelineConfig) -> Result<()> {
    let broker = build_broker(config)?;
    let hash = resolve_account_hash(broker.as_ref(), &config.broker.account_number)?;

    let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper);
    let store = Arc::new(QueueStore::new(config.queue_paths()));
    let settings = DispatchSettings {
        quantity: config.broker.order_quantity,
        success_pause: Duration::from_secs(config.broker.success_pause_secs),
        failure_pause: Duration::from_secs(config.broker.failure_pause_secs),
    };

    let dispatcher = OrderDispatcher::new(
        Arc::clone(&broker),
        Arc::clone(&store),
        Arc::clone(&sleeper),
        hash.clone(),
        settings,
    );
    let refresher = AccountRefresher::new(Arc::clone(&broker), Arc::clone(&store), hash);
    let mut desk = TradeDesk::new(
        dispatcher,
        refresher,
        store,
        sleeper,
        Duration::from_secs(config.broker.refresh_interval_secs),
    );

    let shutdown = Shutdown::new();
    shutdown.install_ctrl_c()?;
    desk.run(&shutdown);
    Ok(())
}

fn run_validate(config: &PipelineConfig, symbols: &[String]) -> Result<()> {
    let parsed = symbols
        .iter()
        .map(|s| Symbol::parse(s))
        .collect::<Result<Vec<_>, _>>()?;

    let validator = build_validator(config, Arc::new(ThreadSleeper))?;

    let mut passed = 0;
    for symbol in &parsed {
        let result = validator.validate(symbol);
        print_result(&result);
        if result.is_valid() {
            passed += 1;
        }
    }
    println!();
    println!("{passed}/{} passed", parsed.len());
    Ok(())
}

fn print_result(result: &ValidationResult) {
    println!("{:<6} {result}", result.symbol().to_string());
    if let Some(report) = result.report() {
        println!(
            "       close {:.2}  open {:.2}  low {:.2}",
            report.close, report.open, report.low
        );
        println!(
            "       ema_fast {:.2}  ema_slow {:.2}  upper {:.2}",
            report.ema_fast, report.ema_slow, report.band_upper
        );
    }
}

fn run_positions(config: &PipelineConfig) -> Result<()> {
    let broker = build_broker(config)?;
    let hash = resolve_account_hash(broker.as_ref(), &config.broker.account_number)?;
    let store = Arc::new(QueueStore::new(config.queue_paths()));

    let snapshot = AccountRefresher::new(broker, store, hash).refresh()?;

    println!("Account:           {}", snapshot.masked_account);
    println!("Type:              {}", snapshot.account_type);
    println!("Cash balance:      ${:.2}", snapshot.cash_balance);
    println!("Liquidation value: ${:.2}", snapshot.liquidation_value);
    println!("Positions:         {}", snapshot.positions.len());
    for p in &snapshot.positions {
        println!(
            "  {:<6} qty {:>8.2}  avg {:>10.2}  last {:>10.2}",
            p.symbol, p.quantity, p.average_price, p.current_price
        );
    }
    println!("Unrealized P&L:    ${:.2}", snapshot.total_unrealized_pnl());
    Ok(())
}
