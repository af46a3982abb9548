//! Engine configuration: TOML file, then `STAKEWATCH_*` environment
//! overrides, then validation.

pub mod endpoints;
pub mod schedule;

use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub use endpoints::{ChainConfig, EndpointConfig};
pub use schedule::{ProjectionConfig, ScheduleConfig};

use crate::error::EngineError;
use crate::tiers::TierTable;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub endpoints: EndpointConfig,

    #[serde(default)]
    pub chain: ChainConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub tiers: TierTable,

    /// Serve /metrics and /state on this port when set
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl EngineConfig {
    /// Load from an optional TOML file, apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Override fields from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| env::var(key).ok());
    }

    /// Override fields from `lookup` (variable name -> value)
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed = |key: &str| lookup(key).map(|v| v.trim().to_string());

        // STAKEWATCH_CHAIN_URL
        if let Some(val) = parsed("STAKEWATCH_CHAIN_URL") {
            self.endpoints.chain_url = val;
        }

        // STAKEWATCH_HISTORY_URL
        if let Some(val) = parsed("STAKEWATCH_HISTORY_URL") {
            self.endpoints.history_url = val;
        }

        // STAKEWATCH_TIMEOUT_MS
        if let Some(num) = parsed("STAKEWATCH_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.endpoints.timeout_ms = num;
        }

        // STAKEWATCH_BRIDGE_ACCOUNT
        if let Some(val) = parsed("STAKEWATCH_BRIDGE_ACCOUNT") {
            self.chain.bridge_account = val;
        }

        // STAKEWATCH_FEE_MARKER
        if let Some(val) = parsed("STAKEWATCH_FEE_MARKER") {
            self.chain.fee_memo_marker = val;
        }

        // STAKEWATCH_PAGE_SIZE
        if let Some(num) = parsed("STAKEWATCH_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.schedule.page_size = num;
        }

        // STAKEWATCH_LEDGER_REFRESH_SECS
        if let Some(num) = parsed("STAKEWATCH_LEDGER_REFRESH_SECS").and_then(|v| v.parse().ok()) {
            self.schedule.ledger_refresh_secs = num;
        }

        // STAKEWATCH_POOL_REFRESH_SECS
        if let Some(num) = parsed("STAKEWATCH_POOL_REFRESH_SECS").and_then(|v| v.parse().ok()) {
            self.schedule.pool_refresh_secs = num;
        }

        // STAKEWATCH_REWARDS_REFRESH_SECS
        if let Some(num) = parsed("STAKEWATCH_REWARDS_REFRESH_SECS").and_then(|v| v.parse().ok()) {
            self.schedule.rewards_refresh_secs = num;
        }

        // STAKEWATCH_FAILURE_WINDOW
        if let Some(num) = parsed("STAKEWATCH_FAILURE_WINDOW").and_then(|v| v.parse().ok()) {
            self.schedule.failure_window = num;
        }

        // STAKEWATCH_METRICS_PORT
        if let Some(num) = parsed("STAKEWATCH_METRICS_PORT").and_then(|v| v.parse().ok()) {
            self.metrics_port = Some(num);
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        let invalid = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));

        if self.endpoints.chain_url.is_empty() || self.endpoints.history_url.is_empty() {
            return invalid("chain_url and history_url must be set");
        }
        if self.schedule.page_size == 0 {
            return invalid("page_size must be greater than zero");
        }
        if self.schedule.ledger_refresh_secs == 0
            || self.schedule.pool_refresh_secs == 0
            || self.schedule.rewards_refresh_secs == 0
        {
            return invalid("refresh intervals must be at least one second");
        }
        if self.endpoints.timeout_ms == 0 {
            return invalid("timeout_ms must be greater than zero");
        }
        if self.schedule.failure_window == 0 {
            return invalid("failure_window must be at least 1");
        }
        if self.projection.sampling_interval_days == 0 {
            return invalid("sampling_interval_days must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_validate() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schedule.ledger_refresh_secs, 30);
        assert_eq!(config.schedule.rewards_refresh_secs, 300);
        assert_eq!(config.chain.transfer_filter(), "stake.token:transfer");
        assert_eq!(config.tiers.tiers().len(), 5);
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = EngineConfig::default();
        config.endpoints.timeout_ms = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.schedule.pool_refresh_secs = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
metrics_port = 9100

[schedule]
page_size = 25

[chain]
bridge_account = "my.bridge"

[[tiers]]
name = "Gold"
minimum_stake = 5000.0
rank = 1

[[tiers]]
name = "Base"
minimum_stake = 0.0
rank = 2
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.schedule.page_size, 25);
        assert_eq!(config.schedule.pool_refresh_secs, 60);
        assert_eq!(config.chain.bridge_account, "my.bridge");
        assert_eq!(config.chain.token_symbol, "STAKE");
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.tiers.tiers()[0].name, "Gold");
    }

    #[test]
    fn test_invalid_tier_table_rejected_on_parse() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[tiers]]
name = "Only"
minimum_stake = 10.0
rank = 1
"#
        )
        .unwrap();
        assert!(EngineConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("STAKEWATCH_PAGE_SIZE", "40"),
            ("STAKEWATCH_HISTORY_URL", " https://history.example "),
            ("STAKEWATCH_FAILURE_WINDOW", "not-a-number"),
            ("STAKEWATCH_METRICS_PORT", "9200"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.schedule.page_size, 40);
        assert_eq!(config.endpoints.history_url, "https://history.example");
        assert_eq!(config.schedule.failure_window, 3);
        assert_eq!(config.metrics_port, Some(9200));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = EngineConfig::default();
        config.schedule.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.schedule.pool_refresh_secs = 0;
        assert!(config.validate().is_err());
    }
}
