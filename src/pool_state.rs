//! Global staking parameters captured at a point in time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Immutable pool-state value. A refresh replaces the whole snapshot;
/// individual fields are never patched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolStateSnapshot {
    /// Total amount staked across all participants
    pub total_staked: f64,
    /// Rewards emitted per second to the whole pool
    pub reward_rate_per_second: f64,
    /// When the snapshot was read from the chain
    pub captured_at: DateTime<Utc>,
}

impl PoolStateSnapshot {
    pub fn new(total_staked: f64, reward_rate_per_second: f64) -> Self {
        Self {
            total_staked,
            reward_rate_per_second,
            captured_at: Utc::now(),
        }
    }

    pub fn captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    /// Rewards the entire pool emits per day
    pub fn daily_emission(&self) -> f64 {
        self.reward_rate_per_second * SECONDS_PER_DAY
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
    }

    /// Check if the snapshot is older than `max_age_secs`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_secs: u64) -> bool {
        self.age(now) > Duration::seconds(max_age_secs as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_emission() {
        let snap = PoolStateSnapshot::new(1_000_000.0, 0.5);
        assert_eq!(snap.daily_emission(), 43_200.0);
    }

    #[test]
    fn test_staleness() {
        let now = Utc::now();
        let snap = PoolStateSnapshot::new(1.0, 1.0).captured_at(now - Duration::seconds(200));
        assert!(snap.is_stale(now, 180));
        assert!(!snap.is_stale(now, 300));
    }
}
