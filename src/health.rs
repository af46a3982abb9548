//! Fetch health per data class.
//!
//! A failing source keeps its last good data visible; it is only reported
//! degraded once every attempt inside the failure window has failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    Ledger,
    PoolState,
    AccountStake,
    RewardsBalance,
}

impl DataClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataClass::Ledger => "ledger",
            DataClass::PoolState => "pool_state",
            DataClass::AccountStake => "account_stake",
            DataClass::RewardsBalance => "rewards_balance",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchHealth {
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl FetchHealth {
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.last_success = Some(at);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
    }

    pub fn is_degraded(&self, failure_window: u32) -> bool {
        self.consecutive_failures >= failure_window
    }
}

/// Health of every data class the engine refreshes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub ledger: FetchHealth,
    pub pool_state: FetchHealth,
    pub account_stake: FetchHealth,
    pub rewards_balance: FetchHealth,
}

impl HealthReport {
    pub fn get(&self, class: DataClass) -> &FetchHealth {
        match class {
            DataClass::Ledger => &self.ledger,
            DataClass::PoolState => &self.pool_state,
            DataClass::AccountStake => &self.account_stake,
            DataClass::RewardsBalance => &self.rewards_balance,
        }
    }

    pub fn get_mut(&mut self, class: DataClass) -> &mut FetchHealth {
        match class {
            DataClass::Ledger => &mut self.ledger,
            DataClass::PoolState => &mut self.pool_state,
            DataClass::AccountStake => &mut self.account_stake,
            DataClass::RewardsBalance => &mut self.rewards_balance,
        }
    }

    /// Classes that have failed through the whole window
    pub fn degraded(&self, failure_window: u32) -> Vec<DataClass> {
        [
            DataClass::Ledger,
            DataClass::PoolState,
            DataClass::AccountStake,
            DataClass::RewardsBalance,
        ]
        .into_iter()
        .filter(|c| self.get(*c).is_degraded(failure_window))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_only_after_window() {
        let mut h = FetchHealth::default();
        h.record_failure("timeout");
        h.record_failure("timeout");
        assert!(!h.is_degraded(3));
        h.record_failure("timeout");
        assert!(h.is_degraded(3));
        h.record_success(Utc::now());
        assert!(!h.is_degraded(3));
        assert!(h.last_error.is_none());
    }

    #[test]
    fn test_report_lists_degraded_classes() {
        let mut report = HealthReport::default();
        report.get_mut(DataClass::PoolState).record_failure("boom");
        assert_eq!(report.degraded(1), vec![DataClass::PoolState]);
        assert!(report.degraded(2).is_empty());
    }
}
