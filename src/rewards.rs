//! Reward rate model: stake share of the pool emission.

use serde::Serialize;

use crate::error::{finite, Unavailable};
use crate::pool_state::PoolStateSnapshot;

pub const DAYS_PER_MONTH: f64 = 30.0;
pub const DAYS_PER_YEAR: f64 = 365.0;

/// Estimated rewards for a stake at the current pool rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardEstimate {
    pub daily: f64,
    pub monthly: f64,
    pub yearly: f64,
}

impl RewardEstimate {
    /// Simple annual percentage rate relative to the stake
    pub fn apr(&self, stake_amount: f64) -> Result<f64, Unavailable> {
        if stake_amount <= 0.0 {
            return Err(Unavailable::ZeroStartAmount);
        }
        finite(self.yearly / stake_amount * 100.0)
    }
}

/// Estimate rewards for `stake_amount` given the pool snapshot.
///
/// `daily = rate_per_second * 86400 * stake / total_staked`. An empty pool
/// has no defined share and yields `Unavailable::ZeroTotalStaked`.
pub fn estimate(
    stake_amount: f64,
    snapshot: &PoolStateSnapshot,
) -> Result<RewardEstimate, Unavailable> {
    if snapshot.total_staked <= 0.0 {
        return Err(Unavailable::ZeroTotalStaked);
    }

    let share = stake_amount / snapshot.total_staked;
    let daily = finite(snapshot.daily_emission() * share)?;

    Ok(RewardEstimate {
        daily,
        monthly: daily * DAYS_PER_MONTH,
        yearly: daily * DAYS_PER_YEAR,
    })
}
