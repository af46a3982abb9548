//! HTTP feed against a history API (actions) and a chain API (tables, balances).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::ActionFeed;
use crate::config::{ChainConfig, EndpointConfig};
use crate::error::EngineError;
use crate::ledger::record::parse_quantity;
use crate::ledger::{ActionsPage, RawTransfer};
use crate::pool_state::PoolStateSnapshot;

const INITIAL_BACKOFF_MS: u64 = 100;
const MAX_BACKOFF_MS: u64 = 10_000;

/// Actions stay untyped so one bad entry cannot sink the whole page.
#[derive(Debug, Deserialize)]
struct GetActionsResponse {
    #[serde(default)]
    actions: Vec<Value>,
}

fn text_at(value: &Value, path: &[&str]) -> String {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Map one history action onto the wire record. Missing or non-string
/// fields come through empty and are rejected by `TransferRecord::try_from`.
fn raw_transfer(action: &Value) -> RawTransfer {
    let timestamp = match action.get("@timestamp") {
        Some(Value::String(ts)) => ts.clone(),
        _ => text_at(action, &["timestamp"]),
    };
    RawTransfer {
        trx_id: text_at(action, &["trx_id"]),
        timestamp,
        from: text_at(action, &["act", "data", "from"]),
        to: text_at(action, &["act", "data", "to"]),
        quantity: text_at(action, &["act", "data", "quantity"]),
        memo: text_at(action, &["act", "data", "memo"]),
    }
}

#[derive(Debug, Deserialize)]
struct TableRows {
    #[serde(default)]
    rows: Vec<Value>,
}

/// Amount from a table cell: an asset string, a numeric string or a number.
fn amount_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_quantity(s).map(|(amount, _)| amount),
        _ => None,
    }
}

fn field_amount(row: &Value, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| row.get(*name).and_then(amount_of))
}

pub struct HttpFeed {
    http: Client,
    endpoints: EndpointConfig,
    chain: ChainConfig,
}

impl HttpFeed {
    pub fn new(endpoints: EndpointConfig, chain: ChainConfig) -> Result<Self, EngineError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(endpoints.timeout_ms))
            .build()
            .map_err(|e| EngineError::InvalidConfig(format!("http client: {}", e)))?;
        Ok(Self { http, endpoints, chain })
    }

    fn history_urls(&self) -> Vec<String> {
        std::iter::once(&self.endpoints.history_url)
            .chain(self.endpoints.fallback_history_urls.iter())
            .map(|u| u.trim_end_matches('/').to_string())
            .collect()
    }

    fn chain_urls(&self) -> Vec<String> {
        std::iter::once(&self.endpoints.chain_url)
            .chain(self.endpoints.fallback_chain_urls.iter())
            .map(|u| u.trim_end_matches('/').to_string())
            .collect()
    }

    /// Try every URL in order, `max_retries + 1` rounds, with capped
    /// exponential backoff between attempts.
    async fn call<T, F>(&self, source: &str, urls: &[String], build: F) -> Result<T, EngineError>
    where
        T: DeserializeOwned,
        F: Fn(&Client, &str) -> RequestBuilder,
    {
        let rounds = self.endpoints.max_retries as usize + 1;
        let max_attempts = rounds * urls.len();
        let mut backoff_ms = INITIAL_BACKOFF_MS;
        let mut last_error = String::from("no endpoints configured");

        for (attempt, url) in urls.iter().cycle().take(max_attempts).enumerate() {
            if attempt > 0 {
                tracing::debug!(source, backoff_ms, "Backing off before retry");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }

            let resp = match build(&self.http, url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    tracing::warn!(
                        source,
                        url = %url,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts,
                        "request failed, will retry with backoff"
                    );
                    last_error = e.to_string();
                    continue;
                }
            };

            if !resp.status().is_success() {
                tracing::warn!(
                    source,
                    url = %url,
                    status = %resp.status(),
                    attempt = attempt + 1,
                    max_attempts,
                    "endpoint returned error status"
                );
                last_error = format!("status {}", resp.status());
                continue;
            }

            match resp.json::<T>().await {
                Ok(body) => {
                    if attempt > 0 {
                        tracing::info!(source, url = %url, "request succeeded after {} retries", attempt);
                    }
                    return Ok(body);
                }
                Err(e) => {
                    tracing::warn!(source, url = %url, error = %e, "failed to decode response");
                    last_error = e.to_string();
                }
            }
        }

        Err(EngineError::transient(
            source,
            format!("all {} attempts failed: {}", max_attempts, last_error),
        ))
    }

    async fn table_rows(&self, source: &str, body: Value) -> Result<Vec<Value>, EngineError> {
        let urls = self.chain_urls();
        let resp: TableRows = self
            .call(source, &urls, |http, base| {
                http.post(format!("{}/v1/chain/get_table_rows", base)).json(&body)
            })
            .await?;
        Ok(resp.rows)
    }
}

#[async_trait]
impl ActionFeed for HttpFeed {
    async fn fetch_actions_page(
        &self,
        account: &str,
        action_filter: &str,
        offset: u64,
        limit: u64,
    ) -> ActionsPage {
        let urls = self.history_urls();
        let query = [
            ("account", account.to_string()),
            ("filter", action_filter.to_string()),
            ("skip", offset.to_string()),
            ("limit", limit.to_string()),
            ("sort", "desc".to_string()),
        ];

        let res: Result<GetActionsResponse, EngineError> = self
            .call("actions", &urls, |http, base| {
                http.get(format!("{}/v2/history/get_actions", base)).query(&query)
            })
            .await;

        match res {
            Ok(resp) => ActionsPage::ok(resp.actions.iter().map(raw_transfer).collect()),
            Err(e) => {
                tracing::warn!(account, offset, error = %e, "action page unavailable");
                ActionsPage::errored()
            }
        }
    }

    async fn fetch_pool_state(&self) -> Result<PoolStateSnapshot, EngineError> {
        let body = json!({
            "code": self.chain.staking_contract,
            "scope": self.chain.staking_contract,
            "table": self.chain.pool_table,
            "json": true,
            "limit": 1,
        });
        let rows = self.table_rows("pool_state", body).await?;
        let row = rows
            .first()
            .ok_or_else(|| EngineError::transient("pool_state", "pool table is empty"))?;

        let total_staked = field_amount(row, &["total_staked", "staked"])
            .ok_or_else(|| EngineError::transient("pool_state", "row has no total_staked"))?;
        let rate = field_amount(row, &["reward_rate", "reward_per_second", "rate_per_second"])
            .ok_or_else(|| EngineError::transient("pool_state", "row has no reward rate"))?;

        Ok(PoolStateSnapshot::new(total_staked, rate))
    }

    async fn fetch_rewards_pool_balance(&self) -> Result<f64, EngineError> {
        let urls = self.chain_urls();
        let body = json!({
            "code": self.chain.token_contract,
            "account": self.chain.rewards_pool_account,
            "symbol": self.chain.token_symbol,
        });
        let balances: Vec<String> = self
            .call("rewards_balance", &urls, |http, base| {
                http.post(format!("{}/v1/chain/get_currency_balance", base)).json(&body)
            })
            .await?;

        match balances.first() {
            None => Ok(0.0),
            Some(b) => parse_quantity(b)
                .map(|(amount, _)| amount)
                .ok_or_else(|| EngineError::transient("rewards_balance", format!("bad balance {:?}", b))),
        }
    }

    async fn fetch_account_stake(&self, account: &str) -> Result<f64, EngineError> {
        let body = json!({
            "code": self.chain.staking_contract,
            "scope": self.chain.staking_contract,
            "table": self.chain.stake_table,
            "json": true,
            "lower_bound": account,
            "upper_bound": account,
            "limit": 1,
        });
        let rows = self.table_rows("account_stake", body).await?;
        Ok(rows
            .first()
            .and_then(|row| field_amount(row, &["staked", "amount", "balance"]))
            .unwrap_or(0.0))
    }
}
