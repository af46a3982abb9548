//! Contract with the network layer that supplies pages and snapshots.

pub mod http;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::ledger::ActionsPage;
use crate::pool_state::PoolStateSnapshot;

pub use http::HttpFeed;

/// Source of action pages and pool snapshots.
///
/// Pages come back in a stable order but consecutive pages may overlap or
/// leave gaps; the accumulator copes with both.
#[async_trait]
pub trait ActionFeed: Send + Sync {
    /// Page of `account`'s actions matching `action_filter`. Failures are
    /// reported through `ActionsPage::errored`, not as an error value.
    async fn fetch_actions_page(
        &self,
        account: &str,
        action_filter: &str,
        offset: u64,
        limit: u64,
    ) -> ActionsPage;

    async fn fetch_pool_state(&self) -> Result<PoolStateSnapshot, EngineError>;

    async fn fetch_rewards_pool_balance(&self) -> Result<f64, EngineError>;

    /// Amount `account` currently has staked; zero when it has no stake row.
    async fn fetch_account_stake(&self, account: &str) -> Result<f64, EngineError>;
}
