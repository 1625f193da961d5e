//! Schwab Trader API client (blocking HTTP, bearer token).
//!
//! Token acquisition and refresh happen outside this process; the client is
//! handed a valid access token.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tickerflow_core::OrderRequest;
use tracing::debug;

use super::{
    AccountDetails, Balances, BrokerError, BrokerPosition, Brokerage, LinkedAccount, OrderResponse,
    QuoteSnapshot,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountEnvelope {
    securities_account: SecuritiesAccount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecuritiesAccount {
    account_number: String,
    #[serde(rename = "type", default)]
    account_type: String,
    #[serde(default)]
    current_balances: RawBalances,
    #[serde(default)]
    positions: Vec<RawPosition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBalances {
    #[serde(default)]
    cash_balance: f64,
    #[serde(default)]
    liquidation_value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    instrument: RawInstrument,
    #[serde(default)]
    long_quantity: f64,
    #[serde(default)]
    short_quantity: f64,
    #[serde(default)]
    average_price: f64,
}

#[derive(Debug, Deserialize)]
struct RawInstrument {
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct RawQuoteEntry {
    #[serde(default)]
    quote: RawQuote,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuote {
    last_price: Option<f64>,
    mark: Option<f64>,
}

pub struct SchwabClient {
    client: reqwest::blocking::Client,
    base_url: String,
    access_token: String,
}

impl SchwabClient {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BrokerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BrokerError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, BrokerError> {
        debug!(path, "brokerage GET");
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .map_err(transport)?;

        let status = resp.status();
        let body = resp.text().map_err(transport)?;
        if !status.is_success() {
            return Err(BrokerError::Api {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| BrokerError::Decode(format!("{path}: {e}")))
    }
}

fn transport(e: reqwest::Error) -> BrokerError {
    BrokerError::Transport(e.to_string())
}

/// The account list arrives either as a bare array or wrapped in `{"accounts": [...]}`.
fn parse_linked_accounts(value: Value) -> Result<Vec<LinkedAccount>, BrokerError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(ref map) if map.contains_key("error") => {
            return Err(BrokerError::Decode(format!("API error: {value}")));
        }
        Value::Object(mut map) => match map.remove("accounts") {
            Some(accounts) => accounts,
            None => Value::Array(vec![Value::Object(map)]),
        },
        other => {
            return Err(BrokerError::Decode(format!(
                "unexpected linked accounts payload: {other}"
            )))
        }
    };
    serde_json::from_value(list).map_err(|e| BrokerError::Decode(format!("linked accounts: {e}")))
}

fn parse_account_details(value: Value) -> Result<AccountDetails, BrokerError> {
    let envelope: AccountEnvelope = serde_json::from_value(value)
        .map_err(|e| BrokerError::Decode(format!("account details: {e}")))?;
    let account = envelope.securities_account;
    Ok(AccountDetails {
        account_number: account.account_number,
        account_type: account.account_type,
        balances: Balances {
            cash_balance: account.current_balances.cash_balance,
            liquidation_value: account.current_balances.liquidation_value,
        },
        positions: account
            .positions
            .into_iter()
            .map(|p| BrokerPosition {
                symbol: p.instrument.symbol,
                long_quantity: p.long_quantity,
                short_quantity: p.short_quantity,
                average_price: p.average_price,
            })
            .collect(),
    })
}

fn parse_quotes(value: Value) -> Result<HashMap<String, QuoteSnapshot>, BrokerError> {
    let Value::Object(map) = value else {
        return Ok(HashMap::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(symbol, entry)| {
            let entry: RawQuoteEntry = serde_json::from_value(entry).ok()?;
            Some((
                symbol,
                QuoteSnapshot {
                    last_price: entry.quote.last_price,
                    mark: entry.quote.mark,
                },
            ))
        })
        .collect())
}

impl Brokerage for SchwabClient {
    fn linked_accounts(&self) -> Result<Vec<LinkedAccount>, BrokerError> {
        parse_linked_accounts(self.get_json("/trader/v1/accounts/accountNumbers", &[])?)
    }

    fn account_details(&self, account_hash: &str) -> Result<AccountDetails, BrokerError> {
        let path = format!("/trader/v1/accounts/{account_hash}");
        parse_account_details(self.get_json(&path, &[("fields", "positions")])?)
    }

    fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, QuoteSnapshot>, BrokerError> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }
        let joined = symbols.join(",");
        parse_quotes(self.get_json("/marketdata/v1/quotes", &[("symbols", &joined)])?)
    }

    fn place_order(
        &self,
        account_hash: &str,
        order: &OrderRequest,
    ) -> Result<OrderResponse, BrokerError> {
        let path = format!("/trader/v1/accounts/{account_hash}/orders");
        debug!(path = %path, "brokerage POST order");
        let resp = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.access_token)
            .json(order)
            .send()
            .map_err(transport)?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.text().unwrap_or_default();
        Ok(OrderResponse {
            status,
            location,
            body,
        })
    }
}
