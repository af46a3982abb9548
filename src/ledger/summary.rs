//! Read models derived from a ledger snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::accumulator::Ledger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account: String,
    pub total: f64,
    pub transfers: usize,
}

/// Rank senders by total amount transferred, descending; ties by account name.
pub fn leaderboard(ledger: &Ledger, limit: usize) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
    for record in ledger.iter() {
        let entry = totals.entry(record.from_account.as_str()).or_insert((0.0, 0));
        entry.0 += record.amount;
        entry.1 += 1;
    }

    let mut rows: Vec<(&str, f64, usize)> = totals
        .into_iter()
        .map(|(account, (total, count))| (account, total, count))
        .collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    rows.into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, (account, total, transfers))| LeaderboardEntry {
            rank: i + 1,
            account: account.to_string(),
            total,
            transfers,
        })
        .collect()
}

/// Totals of an account's transfers in the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccountFlow {
    pub account: String,
    pub total_in: f64,
    pub total_out: f64,
    pub transfers: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl AccountFlow {
    pub fn net(&self) -> f64 {
        self.total_in - self.total_out
    }
}

pub fn account_flow(ledger: &Ledger, account: &str) -> AccountFlow {
    let mut flow = AccountFlow {
        account: account.to_string(),
        ..Default::default()
    };

    for record in ledger.iter().filter(|r| r.involves(account)) {
        // self-transfers count both ways and net to zero
        if record.to_account == account {
            flow.total_in += record.amount;
        }
        if record.from_account == account {
            flow.total_out += record.amount;
        }
        flow.transfers += 1;
        flow.first_seen = Some(flow.first_seen.map_or(record.timestamp, |t| t.min(record.timestamp)));
        flow.last_seen = Some(flow.last_seen.map_or(record.timestamp, |t| t.max(record.timestamp)));
    }

    flow
}
