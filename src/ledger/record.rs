//! Transfer records as ingested from the action feed.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A transfer action as the feed delivers it, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransfer {
    pub trx_id: String,
    /// History API timestamps come without an offset and are UTC
    #[serde(rename = "@timestamp", alias = "timestamp")]
    pub timestamp: String,
    pub from: String,
    pub to: String,
    /// Asset string, e.g. "1250.0000 STAKE"
    pub quantity: String,
    #[serde(default)]
    pub memo: String,
}

/// A validated transfer. Immutable once ingested; identity is `transaction_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transaction_id: String,
    pub timestamp: DateTime<Utc>,
    pub from_account: String,
    pub to_account: String,
    pub amount: f64,
    pub symbol: String,
    pub memo: String,
}

impl TransferRecord {
    pub fn involves(&self, account: &str) -> bool {
        self.from_account == account || self.to_account == account
    }
}

impl TryFrom<RawTransfer> for TransferRecord {
    type Error = EngineError;

    fn try_from(raw: RawTransfer) -> Result<Self, Self::Error> {
        if raw.trx_id.trim().is_empty() {
            return Err(EngineError::MissingTransactionId { timestamp: raw.timestamp });
        }
        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| {
            EngineError::MalformedTimestamp {
                transaction_id: raw.trx_id.clone(),
                value: raw.timestamp.clone(),
            }
        })?;
        let (amount, symbol) = parse_quantity(&raw.quantity).ok_or_else(|| {
            EngineError::MalformedAmount {
                transaction_id: raw.trx_id.clone(),
                value: raw.quantity.clone(),
            }
        })?;

        Ok(Self {
            transaction_id: raw.trx_id,
            timestamp,
            from_account: raw.from,
            to_account: raw.to,
            amount,
            symbol,
            memo: raw.memo,
        })
    }
}

/// Accepts RFC 3339 or the offset-less `YYYY-MM-DDTHH:MM:SS[.fff]` form.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Split an asset string into amount and symbol. A bare number has an empty symbol.
pub fn parse_quantity(value: &str) -> Option<(f64, String)> {
    let mut parts = value.split_whitespace();
    let amount: f64 = parts.next()?.parse().ok()?;
    if !amount.is_finite() {
        return None;
    }
    let symbol = parts.next().unwrap_or("").to_string();
    if parts.next().is_some() {
        return None;
    }
    Some((amount, symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn raw(ts: &str, qty: &str) -> RawTransfer {
        RawTransfer {
            trx_id: "abc".into(),
            timestamp: ts.into(),
            from: "alice".into(),
            to: "bridge".into(),
            quantity: qty.into(),
            memo: "hello".into(),
        }
    }

    #[test]
    fn test_parse_history_timestamp() {
        let ts = parse_timestamp("2024-03-05T10:20:30.500").unwrap();
        assert_eq!(ts.year(), 2024);
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.timestamp_subsec_millis(), 500);

        let rfc = parse_timestamp("2024-03-05T10:20:30Z").unwrap();
        assert_eq!(rfc.second(), 30);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("1250.5000 STAKE"), Some((1250.5, "STAKE".to_string())));
        assert_eq!(parse_quantity("42"), Some((42.0, String::new())));
        assert_eq!(parse_quantity("abc STAKE"), None);
        assert_eq!(parse_quantity("1 A B"), None);
        assert_eq!(parse_quantity(""), None);
    }

    #[test]
    fn test_record_conversion() {
        let rec = TransferRecord::try_from(raw("2024-01-01T00:00:00.000", "3.0000 STAKE")).unwrap();
        assert_eq!(rec.transaction_id, "abc");
        assert_eq!(rec.amount, 3.0);
        assert_eq!(rec.symbol, "STAKE");
        assert!(rec.involves("alice"));
        assert!(!rec.involves("carol"));
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let err = TransferRecord::try_from(raw("not-a-date", "1.0 STAKE")).unwrap_err();
        assert!(matches!(err, EngineError::MalformedTimestamp { .. }));
    }

    #[test]
    fn test_missing_transaction_id_rejected() {
        let mut r = raw("2024-01-01T00:00:00.000", "1.0 STAKE");
        r.trx_id = String::new();
        let err = TransferRecord::try_from(r).unwrap_err();
        assert!(matches!(err, EngineError::MissingTransactionId { .. }));
    }

    #[test]
    fn test_wire_field_names() {
        let json = r#"{"trx_id":"t1","@timestamp":"2024-01-01T00:00:00","from":"a","to":"b","quantity":"1.0000 X"}"#;
        let raw: RawTransfer = serde_json::from_str(json).unwrap();
        assert_eq!(raw.memo, "");
        assert_eq!(raw.timestamp, "2024-01-01T00:00:00");
    }
}
