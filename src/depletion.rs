//! Rewards pool drawdown simulation.

use serde::Serialize;

use crate::error::Unavailable;
use crate::pool_state::SECONDS_PER_DAY;

/// Simulation ceiling (10 years)
pub const DEPLETION_MAX_DAYS: u32 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepletionEstimate {
    pub days: u32,
    /// The ceiling was hit; `days` means "effectively indefinite"
    pub capped: bool,
}

/// Days until the rewards pool is drained at the current emission rate.
///
/// Each simulated day pays `rate * 86400 * current_staked / total_staked` out of
/// the pool and adds it to the staked base, so the drawdown accelerates.
pub fn days_until_empty(
    pool_balance: f64,
    total_staked: f64,
    reward_rate_per_second: f64,
) -> Result<DepletionEstimate, Unavailable> {
    if total_staked <= 0.0 {
        return Err(Unavailable::ZeroTotalStaked);
    }

    let mut balance = pool_balance;
    let mut current_staked = total_staked;
    let mut day = 0u32;

    while balance > 0.0 && day < DEPLETION_MAX_DAYS {
        let daily_rewards = reward_rate_per_second * SECONDS_PER_DAY * (current_staked / total_staked);
        if !daily_rewards.is_finite() {
            return Err(Unavailable::NonFiniteResult);
        }
        balance -= daily_rewards;
        current_staked += daily_rewards;
        day += 1;
    }

    Ok(DepletionEstimate {
        days: day,
        capped: balance > 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_is_day_zero() {
        let est = days_until_empty(0.0, 1_000.0, 5.0).unwrap();
        assert_eq!(est, DepletionEstimate { days: 0, capped: false });
    }

    #[test]
    fn test_zero_total_staked_indeterminate() {
        assert_eq!(days_until_empty(100.0, 0.0, 1.0), Err(Unavailable::ZeroTotalStaked));
    }

    #[test]
    fn test_zero_rate_caps() {
        let est = days_until_empty(100.0, 1_000.0, 0.0).unwrap();
        assert_eq!(est, DepletionEstimate { days: DEPLETION_MAX_DAYS, capped: true });
    }

    #[test]
    fn test_drawdown_accelerates() {
        // 86_400/day on day one would take 10 days flat; the staked base grows
        // 8.64% a day so the pool is gone on day 8
        let est = days_until_empty(864_000.0, 1_000_000.0, 1.0).unwrap();
        assert!(!est.capped);
        assert_eq!(est.days, 8);
    }

    #[test]
    fn test_single_day_drain() {
        let est = days_until_empty(10.0, 1_000.0, 1.0).unwrap();
        assert_eq!(est.days, 1);
    }
}
