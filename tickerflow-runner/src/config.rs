//! Pipeline configuration loaded from TOML.
//!
//! Every key has a default, so an empty file (or no file) yields a working
//! configuration pointed at the standard queue files in the current directory.
//! Credentials never live in the file: the mail password and broker token are
//! read from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickerflow_core::{QueuePaths, RetryPolicy, ValidatorConfig};

/// Environment variable holding the IMAP password (an app password for Gmail).
pub const MAIL_PASSWORD_ENV: &str = "TICKERFLOW_MAIL_PASSWORD";

/// Environment variable holding the brokerage OAuth access token.
pub const BROKER_TOKEN_ENV: &str = "TICKERFLOW_BROKER_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingSecret(&'static str),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Seconds between scan cycles.
    pub poll_interval_secs: u64,
    /// Upper bound on any single network read or write.
    pub socket_timeout_secs: u64,
    /// Optional file that receives a copy of the log output.
    pub log_file: Option<PathBuf>,
    pub paths: PathsConfig,
    pub mail: MailConfig,
    pub validator: ValidatorSettings,
    pub broker: BrokerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
            socket_timeout_secs: 15,
            log_file: None,
            paths: PathsConfig::default(),
            mail: MailConfig::default(),
            validator: ValidatorSettings::default(),
            broker: BrokerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub scanner: PathBuf,
    pub open_positions: PathBuf,
    pub watchlist: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let paths = QueuePaths::default();
        Self {
            scanner: paths.scanner,
            open_positions: paths.open_positions,
            watchlist: paths.watchlist,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub folder: String,
    /// Folder processed alerts are moved to.
    pub archive_folder: String,
    pub from_address: String,
    pub subject_contains: String,
    /// Only messages received on or after `today - lookback_days` are fetched.
    pub lookback_days: u32,
    /// Hard wall-clock limit on one fetch stage.
    pub fetch_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".into(),
            port: 993,
            username: String::new(),
            folder: "INBOX".into(),
            archive_folder: "[Gmail]/Trash".into(),
            from_address: "alerts@thinkorswim.com".into(),
            subject_contains: "BBAuto".into(),
            lookback_days: 1,
            fetch_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorSettings {
    pub fast_period: usize,
    pub slow_period: usize,
    pub band_period: usize,
    pub band_width: f64,
    pub history_months: u32,
    pub max_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            fast_period: 21,
            slow_period: 100,
            band_period: 20,
            band_width: 2.0,
            history_months: 6,
            max_attempts: 2,
            retry_delay_secs: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    pub base_url: String,
    /// Plain account number; resolved to the API's account hash at startup.
    pub account_number: String,
    pub order_quantity: u32,
    pub success_pause_secs: u64,
    pub failure_pause_secs: u64,
    /// Seconds between account refreshes in the trade desk loop.
    pub refresh_interval_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.schwabapi.com".into(),
            account_number: String::new(),
            order_quantity: 1,
            success_pause_secs: 3,
            failure_pause_secs: 10,
            refresh_interval_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and check a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be at least 1".into()));
        }
        if self.socket_timeout_secs == 0 {
            return Err(ConfigError::Invalid("socket_timeout_secs must be at least 1".into()));
        }
        if self.mail.fetch_timeout_secs == 0 {
            return Err(ConfigError::Invalid("mail.fetch_timeout_secs must be at least 1".into()));
        }
        if self.broker.order_quantity == 0 {
            return Err(ConfigError::Invalid("broker.order_quantity must be at least 1".into()));
        }
        self.validator_config().check().map_err(ConfigError::Invalid)
    }

    pub fn queue_paths(&self) -> QueuePaths {
        QueuePaths {
            scanner: self.paths.scanner.clone(),
            open_positions: self.paths.open_positions.clone(),
            watchlist: self.paths.watchlist.clone(),
        }
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        let v = &self.validator;
        ValidatorConfig {
            fast_period: v.fast_period,
            slow_period: v.slow_period,
            band_period: v.band_period,
            band_width: v.band_width,
            history_months: v.history_months,
            retry: RetryPolicy::fixed(v.max_attempts, Duration::from_secs(v.retry_delay_secs)),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_secs(self.socket_timeout_secs)
    }
}

/// Read a required secret from the environment.
pub fn secret_from_env(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingSecret(var)),
    }
}
