//! Refresh cadence and projection parameters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Re-read the newest ledger page (seconds)
    #[serde(default = "default_ledger_refresh_secs")]
    pub ledger_refresh_secs: u64,

    /// Pool state and account stake reload (seconds)
    #[serde(default = "default_pool_refresh_secs")]
    pub pool_refresh_secs: u64,

    /// Rewards pool balance reload (seconds)
    #[serde(default = "default_rewards_refresh_secs")]
    pub rewards_refresh_secs: u64,

    /// Daemon report log line (seconds)
    #[serde(default = "default_report_secs")]
    pub report_secs: u64,

    /// Records requested per history page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Consecutive failures of one data class before it is reported degraded
    #[serde(default = "default_failure_window")]
    pub failure_window: u32,
}

fn default_ledger_refresh_secs() -> u64 {
    30
}
fn default_pool_refresh_secs() -> u64 {
    60
}
fn default_rewards_refresh_secs() -> u64 {
    300
}
fn default_report_secs() -> u64 {
    60
}
fn default_page_size() -> u64 {
    100
}
fn default_failure_window() -> u32 {
    3
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            ledger_refresh_secs: default_ledger_refresh_secs(),
            pool_refresh_secs: default_pool_refresh_secs(),
            rewards_refresh_secs: default_rewards_refresh_secs(),
            report_secs: default_report_secs(),
            page_size: default_page_size(),
            failure_window: default_failure_window(),
        }
    }
}

impl ScheduleConfig {
    /// A pool snapshot older than three refresh intervals is stale
    pub fn pool_stale_after_secs(&self) -> u64 {
        self.pool_refresh_secs.saturating_mul(3)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: u32,

    #[serde(default = "default_sampling_interval_days")]
    pub sampling_interval_days: u32,
}

fn default_horizon_days() -> u32 {
    365
}
fn default_sampling_interval_days() -> u32 {
    30
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            sampling_interval_days: default_sampling_interval_days(),
        }
    }
}
