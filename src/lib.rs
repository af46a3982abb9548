//! Stakewatch: incremental transfer-ledger accumulation and staking
//! rewards projection.

pub mod config;
pub mod depletion;
pub mod error;
pub mod feed;
pub mod health;
pub mod ledger;
pub mod metrics;
pub mod pool_state;
pub mod projection;
pub mod report;
pub mod rewards;
pub mod scheduler;
#[cfg(feature = "metrics-server")]
pub mod server;
pub mod tiers;

pub use config::EngineConfig;
pub use error::{display_or_na, EngineError, Unavailable};
pub use feed::{ActionFeed, HttpFeed};
pub use ledger::{FilterScope, Ledger, LedgerAccumulator, LedgerView, TransferRecord};
pub use pool_state::PoolStateSnapshot;
pub use report::{ReportOptions, StakeReport};
pub use scheduler::{DashboardState, EngineHandle, EngineOptions};
