//! The three ledger views the dashboard keeps, each one accumulator
//! configured with its own relevance predicate.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::accumulator::{FilterScope, LedgerAccumulator};
use super::record::TransferRecord;
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerView {
    /// Everything sent into the bridge account, fee transfers excluded
    Leaderboard,
    /// A user's transfers in either direction, fee transfers excluded
    User,
    /// Transfers a not-yet-staked user has sent out
    NoStake,
}

impl LedgerView {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerView::Leaderboard => "leaderboard",
            LedgerView::User => "user",
            LedgerView::NoStake => "no-stake",
        }
    }

    /// Build an accumulator for this view.
    ///
    /// `fee_marker` is matched case-insensitively against the memo.
    pub fn accumulator(&self, scope: FilterScope, page_size: u64, fee_marker: &str) -> LedgerAccumulator {
        let marker = fee_marker.to_lowercase();
        let builder = LedgerAccumulator::builder(scope).page_size(page_size);

        match self {
            LedgerView::Leaderboard => builder
                .filter(move |scope, r| r.to_account == scope.account && !is_fee(r, &marker))
                .build(),
            LedgerView::User => builder
                .filter(move |scope, r| r.involves(&scope.account) && !is_fee(r, &marker))
                .build(),
            LedgerView::NoStake => builder
                .filter(|scope, r| r.from_account == scope.account)
                .build(),
        }
    }
}

impl FromStr for LedgerView {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "leaderboard" => Ok(LedgerView::Leaderboard),
            "user" => Ok(LedgerView::User),
            "no-stake" | "nostake" => Ok(LedgerView::NoStake),
            other => Err(EngineError::InvalidArgument(format!("unknown ledger view {:?}", other))),
        }
    }
}

fn is_fee(record: &TransferRecord, marker: &str) -> bool {
    !marker.is_empty() && record.memo.to_lowercase().contains(marker)
}
