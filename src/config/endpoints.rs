//! Remote endpoints and on-chain locations the feed reads from.

use serde::{Deserialize, Serialize};

/// Chain and history API endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Chain API base URL (get_table_rows, get_currency_balance)
    #[serde(default = "default_chain_url")]
    pub chain_url: String,

    /// History API base URL (get_actions)
    #[serde(default = "default_history_url")]
    pub history_url: String,

    /// Tried in order after the primary chain URL fails
    #[serde(default)]
    pub fallback_chain_urls: Vec<String>,

    /// Tried in order after the primary history URL fails
    #[serde(default)]
    pub fallback_history_urls: Vec<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retry rounds over the primary + fallback URL list
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_chain_url() -> String {
    "http://127.0.0.1:8888".to_string()
}
fn default_history_url() -> String {
    "http://127.0.0.1:7000".to_string()
}
fn default_timeout_ms() -> u64 {
    8000
}
fn default_max_retries() -> u32 {
    2
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            chain_url: default_chain_url(),
            history_url: default_history_url(),
            fallback_chain_urls: Vec::new(),
            fallback_history_urls: Vec::new(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }
}

/// Contracts, tables and accounts of the staking deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_token_contract")]
    pub token_contract: String,

    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,

    #[serde(default = "default_staking_contract")]
    pub staking_contract: String,

    /// Singleton table holding total staked and reward rate
    #[serde(default = "default_pool_table")]
    pub pool_table: String,

    /// Per-account stake rows, keyed by account name
    #[serde(default = "default_stake_table")]
    pub stake_table: String,

    /// Account holding the undistributed rewards
    #[serde(default = "default_rewards_pool_account")]
    pub rewards_pool_account: String,

    /// Bridge account the leaderboard view pages
    #[serde(default = "default_bridge_account")]
    pub bridge_account: String,

    /// Memo substring identifying fee transfers, matched case-insensitively
    #[serde(default = "default_fee_memo_marker")]
    pub fee_memo_marker: String,
}

fn default_token_contract() -> String {
    "stake.token".to_string()
}
fn default_token_symbol() -> String {
    "STAKE".to_string()
}
fn default_staking_contract() -> String {
    "stake.pool".to_string()
}
fn default_pool_table() -> String {
    "config".to_string()
}
fn default_stake_table() -> String {
    "stakes".to_string()
}
fn default_rewards_pool_account() -> String {
    "stake.reward".to_string()
}
fn default_bridge_account() -> String {
    "stake.bridge".to_string()
}
fn default_fee_memo_marker() -> String {
    "fee".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            token_contract: default_token_contract(),
            token_symbol: default_token_symbol(),
            staking_contract: default_staking_contract(),
            pool_table: default_pool_table(),
            stake_table: default_stake_table(),
            rewards_pool_account: default_rewards_pool_account(),
            bridge_account: default_bridge_account(),
            fee_memo_marker: default_fee_memo_marker(),
        }
    }
}

impl ChainConfig {
    /// History API filter selecting token transfers
    pub fn transfer_filter(&self) -> String {
        format!("{}:transfer", self.token_contract)
    }
}
