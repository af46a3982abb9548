//! One-shot report combining every calculator for a single account.

use serde::{Serialize, Serializer};

use crate::depletion::{days_until_empty, DepletionEstimate};
use crate::error::Unavailable;
use crate::pool_state::PoolStateSnapshot;
use crate::projection::{project, CompoundingPolicy, ProjectionPoint};
use crate::rewards::{estimate, RewardEstimate};
use crate::tiers::{compare, days_to_reach, ComparisonReport, DaysToReach, StakingTier, TierTable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportOptions {
    pub horizon_days: u32,
    pub sampling_interval_days: u32,
    /// Stake amount to compare the current one against
    pub hypothetical: Option<f64>,
}

/// Serializes the error arm as "N/A" so consumers never see a coerced zero.
fn or_na<T, S>(value: &Result<T, Unavailable>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Ok(v) => v.serialize(serializer),
        Err(_) => serializer.serialize_str("N/A"),
    }
}

fn opt_or_na<T, S>(value: &Option<Result<T, Unavailable>>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        None => serializer.serialize_none(),
        Some(v) => or_na(v, serializer),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierDays {
    pub policy: CompoundingPolicy,
    pub days: DaysToReach,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeReport {
    pub stake: f64,
    pub current_tier: StakingTier,
    pub next_tier: Option<StakingTier>,
    #[serde(serialize_with = "or_na")]
    pub estimate: Result<RewardEstimate, Unavailable>,
    #[serde(serialize_with = "or_na")]
    pub apr: Result<f64, Unavailable>,
    #[serde(serialize_with = "or_na")]
    pub projection: Result<Vec<ProjectionPoint>, Unavailable>,
    /// Empty when already in the top tier
    #[serde(serialize_with = "or_na")]
    pub days_to_next_tier: Result<Vec<TierDays>, Unavailable>,
    /// Present only when a hypothetical stake was requested
    #[serde(serialize_with = "opt_or_na")]
    pub comparison: Option<Result<ComparisonReport, Unavailable>>,
    #[serde(serialize_with = "or_na")]
    pub depletion: Result<DepletionEstimate, Unavailable>,
}

impl StakeReport {
    /// Missing inputs surface as `Unavailable` on the figures that need them;
    /// the tier placement is always available.
    pub fn build(
        stake: f64,
        pool: Option<&PoolStateSnapshot>,
        rewards_pool_balance: Option<f64>,
        tiers: &TierTable,
        options: &ReportOptions,
    ) -> Self {
        let current_tier = tiers.tier_for(stake).clone();
        let next_tier = tiers.next_tier(stake).cloned();

        let estimate = pool
            .ok_or(Unavailable::NoSnapshot)
            .and_then(|snapshot| estimate(stake, snapshot));
        let apr = estimate.and_then(|e| e.apr(stake));
        let daily = estimate.map(|e| e.daily);

        let projection = daily.and_then(|d| {
            project(stake, d, options.horizon_days, options.sampling_interval_days)
        });

        let days_to_next_tier = daily.map(|d| match &next_tier {
            None => Vec::new(),
            Some(next) => CompoundingPolicy::ALL
                .iter()
                .map(|&policy| TierDays {
                    policy,
                    days: days_to_reach(stake, d, next.minimum_stake, policy),
                })
                .collect(),
        });

        let comparison = options.hypothetical.map(|hypothetical| {
            daily.and_then(|d| {
                compare(stake, hypothetical, d, next_tier.as_ref().map(|t| t.minimum_stake))
            })
        });

        let depletion = match (pool, rewards_pool_balance) {
            (Some(snapshot), Some(balance)) => {
                days_until_empty(balance, snapshot.total_staked, snapshot.reward_rate_per_second)
            }
            _ => Err(Unavailable::NoSnapshot),
        };

        Self {
            stake,
            current_tier,
            next_tier,
            estimate,
            apr,
            projection,
            days_to_next_tier,
            comparison,
            depletion,
        }
    }

    /// Compact one-line summary for logs
    pub fn summary_line(&self) -> String {
        let daily = self.estimate.map(|e| e.daily);
        let depletion = match &self.depletion {
            Ok(d) if d.capped => format!(">{}", d.days),
            Ok(d) => d.days.to_string(),
            Err(_) => "N/A".to_string(),
        };
        format!(
            "stake={:.4} tier={} daily={} apr={}% pool_days_left={}",
            self.stake,
            self.current_tier.name,
            crate::error::display_or_na(&daily, 4),
            crate::error::display_or_na(&self.apr, 2),
            depletion,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ReportOptions {
        ReportOptions {
            horizon_days: 90,
            sampling_interval_days: 30,
            hypothetical: Some(200_000.0),
        }
    }

    #[test]
    fn test_full_report() {
        let pool = PoolStateSnapshot::new(1_000_000.0, 1.0);
        let report = StakeReport::build(100_000.0, Some(&pool), Some(500_000.0), &TierTable::default(), &options());

        assert_eq!(report.current_tier.name, "Dolphin");
        assert_eq!(report.next_tier.as_ref().map(|t| t.name.as_str()), Some("Shark"));
        let est = report.estimate.unwrap();
        assert!((est.daily - 8_640.0).abs() < 1e-9);
        assert_eq!(report.projection.as_ref().unwrap().len(), 4);
        assert_eq!(report.days_to_next_tier.as_ref().unwrap().len(), 4);
        assert!(matches!(report.comparison, Some(Ok(ComparisonReport::Compared { .. }))));
        assert!(report.depletion.is_ok());
    }

    #[test]
    fn test_missing_snapshot_is_na_not_zero() {
        let report = StakeReport::build(100_000.0, None, None, &TierTable::default(), &options());
        assert_eq!(report.estimate, Err(Unavailable::NoSnapshot));
        assert_eq!(report.current_tier.name, "Dolphin");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["estimate"], "N/A");
        assert_eq!(json["projection"], "N/A");
        assert_eq!(json["depletion"], "N/A");
        assert!(report.summary_line().contains("daily=N/A"));
    }

    #[test]
    fn test_empty_pool_is_unavailable() {
        let pool = PoolStateSnapshot::new(0.0, 1.0);
        let report = StakeReport::build(10.0, Some(&pool), Some(100.0), &TierTable::default(), &options());
        assert_eq!(report.estimate, Err(Unavailable::ZeroTotalStaked));
        assert_eq!(report.depletion, Err(Unavailable::ZeroTotalStaked));
    }

    #[test]
    fn test_top_tier_has_no_next() {
        let pool = PoolStateSnapshot::new(100_000_000.0, 1.0);
        let report = StakeReport::build(20_000_000.0, Some(&pool), None, &TierTable::default(), &options());
        assert!(report.next_tier.is_none());
        assert_eq!(report.days_to_next_tier, Ok(Vec::new()));
        assert_eq!(report.comparison, Some(Ok(ComparisonReport::NoNextTier)));
    }

    #[test]
    fn test_comparison_only_when_requested() {
        let pool = PoolStateSnapshot::new(1_000_000.0, 1.0);
        let opts = ReportOptions {
            hypothetical: None,
            ..options()
        };
        let report = StakeReport::build(50_000.0, Some(&pool), None, &TierTable::default(), &opts);
        assert!(report.comparison.is_none());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["comparison"].is_null());
    }

    #[test]
    fn test_zero_stake_has_no_projection() {
        let pool = PoolStateSnapshot::new(1_000.0, 1.0);
        let report = StakeReport::build(0.0, Some(&pool), None, &TierTable::default(), &options());
        assert_eq!(report.current_tier.name, "Shrimp");
        assert_eq!(report.projection, Err(Unavailable::ZeroStartAmount));
    }
}
