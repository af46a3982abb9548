//! Error taxonomy for the ledger and projection engine.

use thiserror::Error;

/// Failures surfaced by the engine and its collaborators.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A page or snapshot request failed; last-known-good state is kept.
    #[error("transient fetch failure ({source_name}): {message}")]
    TransientFetch { source_name: String, message: String },

    /// A wire record had no transaction id to deduplicate on.
    #[error("action at {timestamp:?} has no transaction id")]
    MissingTransactionId { timestamp: String },

    /// A wire record carried a timestamp we could not parse.
    #[error("malformed timestamp {value:?} on transaction {transaction_id}")]
    MalformedTimestamp { transaction_id: String, value: String },

    /// A wire record carried an amount we could not parse.
    #[error("malformed amount {value:?} on transaction {transaction_id}")]
    MalformedAmount { transaction_id: String, value: String },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine task has shut down and no longer takes commands.
    #[error("engine stopped")]
    Stopped,
}

impl EngineError {
    pub fn transient(source_name: &str, message: impl Into<String>) -> Self {
        EngineError::TransientFetch {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

/// Reasons a ratio-based figure has no defined value.
///
/// Consumers render these as "N/A"; they are never coerced to zero.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailable {
    #[error("total staked is zero")]
    ZeroTotalStaked,
    #[error("start amount is zero")]
    ZeroStartAmount,
    #[error("computation produced a non-finite value")]
    NonFiniteResult,
    #[error("no pool snapshot loaded yet")]
    NoSnapshot,
}

/// Render a calculator result for display, "N/A" on the error arm.
pub fn display_or_na(value: &Result<f64, Unavailable>, decimals: usize) -> String {
    match value {
        Ok(v) => format!("{:.*}", decimals, v),
        Err(_) => "N/A".to_string(),
    }
}

/// Reject NaN/Infinity before it reaches a consumer.
pub(crate) fn finite(value: f64) -> Result<f64, Unavailable> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(Unavailable::NonFiniteResult)
    }
}
