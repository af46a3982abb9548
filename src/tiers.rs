//! Staking tiers and time-to-next-tier analysis.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Unavailable};
use crate::projection::CompoundingPolicy;

/// Simulation ceiling for tier progression (5 years)
pub const TIER_SIMULATION_MAX_DAYS: u32 = 1825;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingTier {
    pub name: String,
    pub minimum_stake: f64,
    /// 1 is the top tier
    pub rank: u32,
}

impl StakingTier {
    pub fn new(name: &str, minimum_stake: f64, rank: u32) -> Self {
        Self {
            name: name.to_string(),
            minimum_stake,
            rank,
        }
    }
}

/// Static tier configuration, ordered by ascending rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StakingTier>", into = "Vec<StakingTier>")]
pub struct TierTable {
    tiers: Vec<StakingTier>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                StakingTier::new("Whale", 10_000_000.0, 1),
                StakingTier::new("Shark", 1_000_000.0, 2),
                StakingTier::new("Dolphin", 100_000.0, 3),
                StakingTier::new("Fish", 10_000.0, 4),
                StakingTier::new("Shrimp", 0.0, 5),
            ],
        }
    }
}

impl TryFrom<Vec<StakingTier>> for TierTable {
    type Error = EngineError;

    fn try_from(tiers: Vec<StakingTier>) -> Result<Self, Self::Error> {
        TierTable::new(tiers)
    }
}

impl From<TierTable> for Vec<StakingTier> {
    fn from(table: TierTable) -> Self {
        table.tiers
    }
}

impl TierTable {
    /// Sorts by rank, then checks minimums strictly decrease and the last
    /// tier accepts a zero stake.
    pub fn new(mut tiers: Vec<StakingTier>) -> Result<Self, EngineError> {
        if tiers.is_empty() {
            return Err(EngineError::InvalidConfig("tier table is empty".into()));
        }
        tiers.sort_by_key(|t| t.rank);

        for pair in tiers.windows(2) {
            if pair[0].rank == pair[1].rank {
                return Err(EngineError::InvalidConfig(format!(
                    "duplicate tier rank {}",
                    pair[0].rank
                )));
            }
            if pair[1].minimum_stake >= pair[0].minimum_stake {
                return Err(EngineError::InvalidConfig(format!(
                    "tier {} minimum {} is not below tier {} minimum {}",
                    pair[1].name, pair[1].minimum_stake, pair[0].name, pair[0].minimum_stake
                )));
            }
        }

        match tiers.last() {
            Some(last) if last.minimum_stake == 0.0 => Ok(Self { tiers }),
            _ => Err(EngineError::InvalidConfig(
                "tier table must end with a zero-stake tier".into(),
            )),
        }
    }

    pub fn tiers(&self) -> &[StakingTier] {
        &self.tiers
    }

    /// Highest tier whose minimum `amount` meets
    pub fn tier_for(&self, amount: f64) -> &StakingTier {
        self.tiers
            .iter()
            .find(|t| amount >= t.minimum_stake)
            .unwrap_or_else(|| &self.tiers[self.tiers.len() - 1])
    }

    /// The tier directly above the one `amount` sits in, `None` at the top
    pub fn next_tier(&self, amount: f64) -> Option<&StakingTier> {
        let current = self.tier_for(amount);
        self.tiers.iter().rev().find(|t| t.rank < current.rank)
    }
}

/// Outcome of the day-by-day tier simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "days")]
pub enum DaysToReach {
    Day(u32),
    Unreachable,
}

impl DaysToReach {
    pub fn days(&self) -> Option<u32> {
        match self {
            DaysToReach::Day(d) => Some(*d),
            DaysToReach::Unreachable => None,
        }
    }
}

/// First day on which the projected amount under `policy` reaches `target_amount`.
///
/// Simulated day by day rather than inverted, since monthly and annual
/// compounding are piecewise. Stops at [`TIER_SIMULATION_MAX_DAYS`].
pub fn days_to_reach(
    start_amount: f64,
    daily_reward: f64,
    target_amount: f64,
    policy: CompoundingPolicy,
) -> DaysToReach {
    if start_amount >= target_amount {
        return DaysToReach::Day(0);
    }
    if daily_reward <= 0.0 {
        return DaysToReach::Unreachable;
    }

    for day in 1..=TIER_SIMULATION_MAX_DAYS {
        match policy.amount_at(start_amount, daily_reward, day) {
            Ok(amount) if amount >= target_amount => return DaysToReach::Day(day),
            Ok(_) => {}
            Err(_) => return DaysToReach::Unreachable,
        }
    }

    DaysToReach::Unreachable
}

/// Days-to-next-tier for one policy, current vs hypothetical stake
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PolicyComparison {
    pub policy: CompoundingPolicy,
    pub current_days: DaysToReach,
    pub hypothetical_days: DaysToReach,
    /// `current - hypothetical`; positive when the hypothetical stake gets
    /// there sooner. `None` if either side is unreachable.
    pub days_saved: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ComparisonReport {
    NoNextTier,
    Compared {
        next_tier_minimum: f64,
        hypothetical_daily_reward: f64,
        policies: Vec<PolicyComparison>,
    },
}

/// Compare how fast `current_amount` and `hypothetical_amount` reach the next tier.
///
/// Rewards are proportional to stake, so the hypothetical daily reward is the
/// current one scaled by `hypothetical / current`.
pub fn compare(
    current_amount: f64,
    hypothetical_amount: f64,
    daily_reward_at_current: f64,
    next_tier_minimum: Option<f64>,
) -> Result<ComparisonReport, Unavailable> {
    let Some(target) = next_tier_minimum else {
        return Ok(ComparisonReport::NoNextTier);
    };
    if current_amount <= 0.0 {
        return Err(Unavailable::ZeroStartAmount);
    }

    let hypothetical_daily = daily_reward_at_current * (hypothetical_amount / current_amount);
    if !hypothetical_daily.is_finite() {
        return Err(Unavailable::NonFiniteResult);
    }

    let policies = CompoundingPolicy::ALL
        .iter()
        .map(|&policy| {
            let current_days = days_to_reach(current_amount, daily_reward_at_current, target, policy);
            let hypothetical_days = days_to_reach(hypothetical_amount, hypothetical_daily, target, policy);
            let days_saved = match (current_days.days(), hypothetical_days.days()) {
                (Some(c), Some(h)) => Some(c as i64 - h as i64),
                _ => None,
            };
            PolicyComparison {
                policy,
                current_days,
                hypothetical_days,
                days_saved,
            }
        })
        .collect();

    Ok(ComparisonReport::Compared {
        next_tier_minimum: target,
        hypothetical_daily_reward: hypothetical_daily,
        policies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_to_reach_simple() {
        let d = days_to_reach(9_900_000.0, 10_000.0, 10_000_000.0, CompoundingPolicy::None);
        assert_eq!(d, DaysToReach::Day(10));
    }

    #[test]
    fn test_already_there_is_day_zero() {
        for policy in CompoundingPolicy::ALL {
            assert_eq!(days_to_reach(500.0, 0.0, 500.0, policy), DaysToReach::Day(0));
        }
    }

    #[test]
    fn test_zero_reward_unreachable() {
        let d = days_to_reach(100.0, 0.0, 200.0, CompoundingPolicy::Daily);
        assert_eq!(d, DaysToReach::Unreachable);
    }

    #[test]
    fn test_ceiling_unreachable() {
        // 1/day from 0 to 10_000 needs 10_000 days
        let d = days_to_reach(0.0, 1.0, 10_000.0, CompoundingPolicy::None);
        assert_eq!(d, DaysToReach::Unreachable);
        // exactly on the ceiling is still reachable
        let d = days_to_reach(0.0, 1.0, 1825.0, CompoundingPolicy::None);
        assert_eq!(d, DaysToReach::Day(1825));
    }

    #[test]
    fn test_monthly_waits_for_boundary() {
        // 1000 staked, 10/day -> month rate 0.3, first fold at day 30 = 1300
        let d = days_to_reach(1_000.0, 10.0, 1_100.0, CompoundingPolicy::Monthly);
        assert_eq!(d, DaysToReach::Day(30));
        let simple = days_to_reach(1_000.0, 10.0, 1_100.0, CompoundingPolicy::None);
        assert_eq!(simple, DaysToReach::Day(10));
    }

    #[test]
    fn test_compare_hypothetical_faster() {
        let report = compare(500_000.0, 900_000.0, 1_000.0, Some(1_000_000.0)).unwrap();
        match report {
            ComparisonReport::Compared { policies, hypothetical_daily_reward, .. } => {
                assert!((hypothetical_daily_reward - 1_800.0).abs() < 1e-9);
                let none = policies.iter().find(|p| p.policy == CompoundingPolicy::None).unwrap();
                assert_eq!(none.current_days, DaysToReach::Day(500));
                // 100_000 / 1_800 = 55.6 -> 56
                assert_eq!(none.hypothetical_days, DaysToReach::Day(56));
                assert_eq!(none.days_saved, Some(444));
                assert_eq!(policies.len(), 4);
            }
            other => panic!("unexpected report {:?}", other),
        }
    }

    #[test]
    fn test_compare_current_already_at_tier() {
        let report = compare(2_000.0, 1_000.0, 10.0, Some(1_500.0)).unwrap();
        let ComparisonReport::Compared { policies, .. } = report else {
            panic!("expected comparison");
        };
        for p in policies {
            assert_eq!(p.current_days, DaysToReach::Day(0));
        }
    }

    #[test]
    fn test_compare_no_next_tier() {
        assert_eq!(compare(1.0, 2.0, 1.0, None), Ok(ComparisonReport::NoNextTier));
    }

    #[test]
    fn test_compare_unreachable_has_no_difference() {
        let report = compare(100.0, 200.0, 0.0, Some(1_000.0)).unwrap();
        let ComparisonReport::Compared { policies, .. } = report else {
            panic!("expected comparison");
        };
        assert!(policies.iter().all(|p| p.days_saved.is_none()));
    }

    #[test]
    fn test_tier_lookup() {
        let table = TierTable::default();
        assert_eq!(table.tier_for(0.0).name, "Shrimp");
        assert_eq!(table.tier_for(10_000.0).name, "Fish");
        assert_eq!(table.tier_for(99_999.0).name, "Fish");
        assert_eq!(table.tier_for(50_000_000.0).name, "Whale");
        assert_eq!(table.next_tier(50_000.0).unwrap().name, "Dolphin");
        assert!(table.next_tier(10_000_000.0).is_none());
    }

    #[test]
    fn test_table_validation() {
        let bad_order = vec![
            StakingTier::new("A", 10.0, 1),
            StakingTier::new("B", 20.0, 2),
            StakingTier::new("C", 0.0, 3),
        ];
        assert!(TierTable::new(bad_order).is_err());

        let no_floor = vec![StakingTier::new("A", 10.0, 1), StakingTier::new("B", 5.0, 2)];
        assert!(TierTable::new(no_floor).is_err());

        // given out of order, sorted by rank
        let ok = TierTable::new(vec![
            StakingTier::new("Base", 0.0, 2),
            StakingTier::new("Top", 100.0, 1),
        ])
        .unwrap();
        assert_eq!(ok.tiers()[0].name, "Top");
    }
}
