//! Balance projections under the four compounding policies.
//!
//! Monthly and annual compounding only fold rewards back on whole 30/365-day
//! boundaries: the exponent is the number of elapsed months/years, the rate is
//! the daily reward scaled to that period.

use serde::{Deserialize, Serialize};

use crate::error::{finite, Unavailable};
use crate::rewards::{DAYS_PER_MONTH, DAYS_PER_YEAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundingPolicy {
    None,
    Daily,
    Monthly,
    Annual,
}

impl CompoundingPolicy {
    pub const ALL: [CompoundingPolicy; 4] = [
        CompoundingPolicy::None,
        CompoundingPolicy::Daily,
        CompoundingPolicy::Monthly,
        CompoundingPolicy::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CompoundingPolicy::None => "none",
            CompoundingPolicy::Daily => "daily",
            CompoundingPolicy::Monthly => "monthly",
            CompoundingPolicy::Annual => "annual",
        }
    }

    /// Days between compounding events, `None` for simple accrual
    pub fn period_days(&self) -> Option<u32> {
        match self {
            CompoundingPolicy::None => None,
            CompoundingPolicy::Daily => Some(1),
            CompoundingPolicy::Monthly => Some(DAYS_PER_MONTH as u32),
            CompoundingPolicy::Annual => Some(DAYS_PER_YEAR as u32),
        }
    }

    /// Projected balance after `day` days.
    ///
    /// Compounding policies scale the reward relative to `start_amount`, so a
    /// non-positive start is `ZeroStartAmount`. Simple accrual has no such
    /// restriction.
    pub fn amount_at(&self, start_amount: f64, daily_reward: f64, day: u32) -> Result<f64, Unavailable> {
        let Some(period) = self.period_days() else {
            return finite(start_amount + daily_reward * day as f64);
        };
        if start_amount <= 0.0 {
            return Err(Unavailable::ZeroStartAmount);
        }

        let rate = daily_reward * period as f64 / start_amount;
        let periods = day / period;
        finite(start_amount * (1.0 + rate).powf(periods as f64))
    }
}

/// One sample of the projection series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub days_since_start: u32,
    pub no_compound: f64,
    pub daily_compound: f64,
    pub monthly_compound: f64,
    pub annual_compound: f64,
}

impl ProjectionPoint {
    pub fn get(&self, policy: CompoundingPolicy) -> f64 {
        match policy {
            CompoundingPolicy::None => self.no_compound,
            CompoundingPolicy::Daily => self.daily_compound,
            CompoundingPolicy::Monthly => self.monthly_compound,
            CompoundingPolicy::Annual => self.annual_compound,
        }
    }
}

/// Parameters of a projection. Iterating is restartable: each call to
/// [`Projection::iter`] starts again from day 0.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    start_amount: f64,
    daily_reward: f64,
    horizon_days: u32,
    sampling_interval_days: u32,
}

impl Projection {
    /// A zero sampling interval is treated as 1 day.
    pub fn new(
        start_amount: f64,
        daily_reward: f64,
        horizon_days: u32,
        sampling_interval_days: u32,
    ) -> Result<Self, Unavailable> {
        if start_amount <= 0.0 {
            return Err(Unavailable::ZeroStartAmount);
        }
        Ok(Self {
            start_amount,
            daily_reward,
            horizon_days,
            sampling_interval_days: sampling_interval_days.max(1),
        })
    }

    pub fn iter(&self) -> ProjectionIter {
        ProjectionIter {
            projection: *self,
            next_day: Some(0),
        }
    }

    fn point(&self, day: u32) -> Result<ProjectionPoint, Unavailable> {
        let at = |policy: CompoundingPolicy| policy.amount_at(self.start_amount, self.daily_reward, day);
        Ok(ProjectionPoint {
            days_since_start: day,
            no_compound: at(CompoundingPolicy::None)?,
            daily_compound: at(CompoundingPolicy::Daily)?,
            monthly_compound: at(CompoundingPolicy::Monthly)?,
            annual_compound: at(CompoundingPolicy::Annual)?,
        })
    }
}

/// Samples days `0, k, 2k, ...` and finally the horizon itself if it does
/// not fall on the grid. Never yields a day past the horizon.
pub struct ProjectionIter {
    projection: Projection,
    next_day: Option<u32>,
}

impl Iterator for ProjectionIter {
    type Item = Result<ProjectionPoint, Unavailable>;

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.next_day?;
        let horizon = self.projection.horizon_days;

        self.next_day = if day >= horizon {
            None
        } else {
            Some(
                day.saturating_add(self.projection.sampling_interval_days)
                    .min(horizon),
            )
        };

        Some(self.projection.point(day))
    }
}

/// Collect the projection series for `[0, horizon_days]`.
pub fn project(
    start_amount: f64,
    daily_reward: f64,
    horizon_days: u32,
    sampling_interval_days: u32,
) -> Result<Vec<ProjectionPoint>, Unavailable> {
    Projection::new(start_amount, daily_reward, horizon_days, sampling_interval_days)?
        .iter()
        .collect()
}
