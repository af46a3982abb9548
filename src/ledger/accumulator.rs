//! Incremental merge of a paginated, append-only action feed.
//!
//! The accumulator never assumes consecutive pages are contiguous or
//! disjoint: every page is merged by id-set difference against what is
//! already held, then the whole ledger is re-sorted newest first.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cursor::PaginationCursor;
use super::record::{RawTransfer, TransferRecord};

/// Who/what the ledger is about. Changing it means a full reset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterScope {
    /// Account whose action history is paged
    pub account: String,
    /// History API action filter, e.g. "token.contract:transfer"
    pub action_filter: String,
}

impl FilterScope {
    pub fn new(account: &str, action_filter: &str) -> Self {
        Self {
            account: account.to_string(),
            action_filter: action_filter.to_string(),
        }
    }
}

/// Relevance predicate, evaluated against the scope in force at merge time.
pub type RecordFilter = Arc<dyn Fn(&FilterScope, &TransferRecord) -> bool + Send + Sync>;

/// Extracts the identity used for de-duplication.
pub type IdentityFn = fn(&TransferRecord) -> &str;

fn transaction_id(record: &TransferRecord) -> &str {
    &record.transaction_id
}

/// One page as returned by the feed collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionsPage {
    pub records: Vec<RawTransfer>,
    pub errored: bool,
}

impl ActionsPage {
    pub fn ok(records: Vec<RawTransfer>) -> Self {
        Self { records, errored: false }
    }

    pub fn errored() -> Self {
        Self { records: Vec::new(), errored: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Re-read the newest page
    Refresh,
    /// Next page past the cursor
    LoadMore,
}

/// A fetch the accumulator wants issued. Results must be handed back with
/// the same request so stale generations can be recognised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub generation: u64,
    pub kind: RequestKind,
    pub scope: FilterScope,
    pub offset: u64,
    pub limit: u64,
}

/// The time-ordered, de-duplicated view. Shared as `Arc<Ledger>`; merges
/// replace the `Arc` rather than mutating a ledger a reader may hold.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<TransferRecord>,
    ids: HashSet<String>,
}

impl Ledger {
    pub fn records(&self) -> &[TransferRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TransferRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn newest(&self) -> Option<&TransferRecord> {
        self.records.first()
    }

    pub fn oldest(&self) -> Option<&TransferRecord> {
        self.records.last()
    }
}

impl Serialize for Ledger {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

/// Counters for a single merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub added: usize,
    pub duplicates: usize,
    pub filtered_out: usize,
    pub malformed: usize,
    /// This merge is the one that flipped the cursor to exhausted
    pub exhausted_now: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IngestOutcome {
    Merged(MergeStats),
    /// The page belonged to a generation that has since been reset
    Stale,
    /// The feed reported an error; nothing was merged
    Failed,
}

pub struct LedgerAccumulator {
    scope: FilterScope,
    filter: RecordFilter,
    identity: IdentityFn,
    page_size: u64,
    ledger: Arc<Ledger>,
    cursor: PaginationCursor,
    generation: u64,
    in_flight: Option<PageRequest>,
}

impl fmt::Debug for LedgerAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerAccumulator")
            .field("scope", &self.scope)
            .field("len", &self.ledger.len())
            .field("cursor", &self.cursor)
            .field("generation", &self.generation)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl LedgerAccumulator {
    pub fn builder(scope: FilterScope) -> AccumulatorBuilder {
        AccumulatorBuilder {
            scope,
            filter: Arc::new(|_, _| true),
            identity: transaction_id,
            page_size: 100,
        }
    }

    pub fn scope(&self) -> &FilterScope {
        &self.scope
    }

    pub fn cursor(&self) -> PaginationCursor {
        self.cursor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_exhausted()
    }

    pub fn in_flight(&self) -> Option<&PageRequest> {
        self.in_flight.as_ref()
    }

    pub fn len(&self) -> usize {
        self.ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    /// Consistent, fully sorted view; cheap to clone and hold.
    pub fn snapshot(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }

    fn request(&mut self, kind: RequestKind, offset: u64) -> PageRequest {
        let req = PageRequest {
            generation: self.generation,
            kind,
            scope: self.scope.clone(),
            offset,
            limit: self.page_size,
        };
        self.in_flight = Some(req.clone());
        req
    }

    /// Re-read the head of the feed (also the initial load).
    /// `None` while another fetch is outstanding.
    pub fn refresh(&mut self) -> Option<PageRequest> {
        if self.in_flight.is_some() {
            debug!(account = %self.scope.account, "refresh skipped, fetch already in flight");
            return None;
        }
        Some(self.request(RequestKind::Refresh, 0))
    }

    /// Move the cursor one page on and return the fetch to issue.
    /// No-op once exhausted or while another fetch is outstanding.
    pub fn advance(&mut self) -> Option<PageRequest> {
        if self.cursor.is_exhausted() {
            debug!(account = %self.scope.account, "advance ignored, feed exhausted");
            return None;
        }
        if self.in_flight.is_some() {
            debug!(account = %self.scope.account, "advance ignored, fetch already in flight");
            return None;
        }
        let offset = self.cursor.step_forward();
        Some(self.request(RequestKind::LoadMore, offset))
    }

    /// Discard ledger and cursor and start over under `scope`. Anything
    /// still in flight for the old generation will be dropped on arrival.
    pub fn reset(&mut self, scope: FilterScope) {
        self.generation += 1;
        info!(
            old = %self.scope.account,
            new = %scope.account,
            generation = self.generation,
            "ledger reset"
        );
        self.scope = scope;
        self.ledger = Arc::new(Ledger::default());
        self.cursor = PaginationCursor::new(self.page_size);
        self.in_flight = None;
    }

    /// Hand back the result of a request issued by `refresh`/`advance`.
    pub fn ingest_page(&mut self, request: &PageRequest, page: ActionsPage) -> IngestOutcome {
        if request.generation != self.generation {
            debug!(
                generation = request.generation,
                current = self.generation,
                offset = request.offset,
                "discarding page from stale generation"
            );
            return IngestOutcome::Stale;
        }
        if self.in_flight.as_ref() == Some(request) {
            self.in_flight = None;
        }

        if page.errored {
            if request.kind == RequestKind::LoadMore && self.cursor.offset() == request.offset {
                self.cursor.step_back();
            }
            warn!(
                account = %self.scope.account,
                offset = request.offset,
                "action page fetch failed, keeping last ledger"
            );
            return IngestOutcome::Failed;
        }

        // a head refresh that brings nothing new says nothing about older pages
        let judge_exhaustion = request.kind == RequestKind::LoadMore;
        let (records, malformed) = Self::validate(page.records);
        let mut stats = self.merge(records, judge_exhaustion);
        stats.malformed = malformed;
        IngestOutcome::Merged(stats)
    }

    /// Validate wire records and merge them. Records with unparseable fields
    /// are dropped individually; the rest of the page still merges.
    pub fn ingest_raw(&mut self, raw: Vec<RawTransfer>) -> MergeStats {
        let (records, malformed) = Self::validate(raw);
        let mut stats = self.ingest_records(records);
        stats.malformed = malformed;
        stats
    }

    fn validate(raw: Vec<RawTransfer>) -> (Vec<TransferRecord>, usize) {
        let mut malformed = 0;
        let records: Vec<TransferRecord> = raw
            .into_iter()
            .filter_map(|r| match TransferRecord::try_from(r) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    warn!(error = %e, "dropping malformed action");
                    malformed += 1;
                    None
                }
            })
            .collect();
        (records, malformed)
    }

    /// Merge already-validated records.
    ///
    /// Keeps only records that pass the filter and whose id is not yet held.
    /// An empty residual marks the feed exhausted; a short page does not.
    pub fn ingest_records(&mut self, records: Vec<TransferRecord>) -> MergeStats {
        self.merge(records, true)
    }

    fn merge(&mut self, records: Vec<TransferRecord>, judge_exhaustion: bool) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut residual: Vec<TransferRecord> = Vec::new();
        let mut seen_in_page: HashSet<String> = HashSet::new();

        for record in records {
            if !(self.filter)(&self.scope, &record) {
                stats.filtered_out += 1;
                continue;
            }
            let id = (self.identity)(&record);
            if self.ledger.contains(id) || !seen_in_page.insert(id.to_string()) {
                stats.duplicates += 1;
                continue;
            }
            residual.push(record);
        }

        if residual.is_empty() {
            if judge_exhaustion && !self.cursor.is_exhausted() {
                self.cursor.mark_exhausted();
                stats.exhausted_now = true;
                info!(
                    account = %self.scope.account,
                    size = self.ledger.len(),
                    "action feed exhausted"
                );
            }
            return stats;
        }

        stats.added = residual.len();
        let identity = self.identity;
        let ledger = Arc::make_mut(&mut self.ledger);
        for record in residual {
            ledger.ids.insert(identity(&record).to_string());
            ledger.records.push(record);
        }
        // stable: equal timestamps keep arrival order
        ledger.records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        debug!(
            account = %self.scope.account,
            added = stats.added,
            duplicates = stats.duplicates,
            size = ledger.records.len(),
            "merged action page"
        );
        stats
    }
}

pub struct AccumulatorBuilder {
    scope: FilterScope,
    filter: RecordFilter,
    identity: IdentityFn,
    page_size: u64,
}

impl AccumulatorBuilder {
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&FilterScope, &TransferRecord) -> bool + Send + Sync + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    pub fn identity(mut self, identity: IdentityFn) -> Self {
        self.identity = identity;
        self
    }

    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn build(self) -> LedgerAccumulator {
        LedgerAccumulator {
            cursor: PaginationCursor::new(self.page_size),
            scope: self.scope,
            filter: self.filter,
            identity: self.identity,
            page_size: self.page_size,
            ledger: Arc::new(Ledger::default()),
            generation: 0,
            in_flight: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use chrono::{DateTime, Utc};

    fn raw(id: &str, secs: u32, from: &str, memo: &str) -> RawTransfer {
        RawTransfer {
            trx_id: id.to_string(),
            timestamp: format!("2024-01-01T00:{:02}:{:02}.000", secs / 60, secs % 60),
            from: from.to_string(),
            to: "bridge".to_string(),
            quantity: "10.0000 STAKE".to_string(),
            memo: memo.to_string(),
        }
    }

    fn acc() -> LedgerAccumulator {
        LedgerAccumulator::builder(FilterScope::new("bridge", "token:transfer"))
            .page_size(3)
            .build()
    }

    fn ids(acc: &LedgerAccumulator) -> Vec<String> {
        acc.snapshot().iter().map(|r| r.transaction_id.clone()).collect()
    }

    #[test]
    fn test_idempotent_merge() {
        let page = vec![raw("a", 1, "x", ""), raw("b", 2, "y", "")];
        let mut once = acc();
        once.ingest_raw(page.clone());

        let mut twice = acc();
        twice.ingest_raw(page.clone());
        let stats = twice.ingest_raw(page);
        assert_eq!(stats.added, 0);
        assert_eq!(stats.duplicates, 2);
        assert_eq!(ids(&once), ids(&twice));
    }

    #[test]
    fn test_overlapping_pages_dedup_and_sort() {
        let mut a = acc();
        a.ingest_raw(vec![raw("c", 30, "x", ""), raw("b", 20, "x", "")]);
        let stats = a.ingest_raw(vec![raw("b", 20, "x", ""), raw("d", 40, "x", ""), raw("a", 10, "x", "")]);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(ids(&a), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_merge_order_does_not_change_contents() {
        // "t1" and "t2" share a timestamp, so only their relative order may vary
        let a_page = vec![raw("e", 50, "x", ""), raw("d", 40, "x", ""), raw("t1", 25, "x", "")];
        let b_page = vec![raw("d", 40, "x", ""), raw("t2", 25, "y", ""), raw("c", 20, "x", "")];
        let c_page = vec![raw("c", 20, "x", ""), raw("b", 10, "y", ""), raw("a", 5, "x", "")];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        let pages = [a_page, b_page, c_page];

        let mut expected: Option<(BTreeSet<String>, Vec<DateTime<Utc>>)> = None;
        for order in orders {
            let mut a = acc();
            for i in order {
                a.ingest_raw(pages[i].clone());
            }
            let snapshot = a.snapshot();
            let timestamps: Vec<DateTime<Utc>> = snapshot.iter().map(|r| r.timestamp).collect();
            assert!(
                timestamps.windows(2).all(|w| w[0] >= w[1]),
                "not newest-first for order {:?}",
                order
            );
            let id_set: BTreeSet<String> = ids(&a).into_iter().collect();
            assert_eq!(id_set.len(), 7);
            match &expected {
                None => expected = Some((id_set, timestamps)),
                Some((want_ids, want_ts)) => {
                    assert_eq!(&id_set, want_ids, "order {:?}", order);
                    assert_eq!(&timestamps, want_ts, "order {:?}", order);
                }
            }
        }
    }

    #[test]
    fn test_duplicate_within_single_page() {
        let mut a = acc();
        let stats = a.ingest_raw(vec![raw("a", 1, "x", ""), raw("a", 1, "x", "")]);
        assert_eq!(stats.added, 1);
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let mut a = acc();
        a.ingest_raw(vec![raw("first", 5, "x", "")]);
        a.ingest_raw(vec![raw("second", 5, "x", ""), raw("newer", 9, "x", "")]);
        assert_eq!(ids(&a), vec!["newer", "first", "second"]);
    }

    #[test]
    fn test_empty_residual_exhausts_and_blocks_advance() {
        let mut a = acc();
        let req = a.refresh().unwrap();
        a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        assert!(!a.is_exhausted());

        let req = a.advance().unwrap();
        assert_eq!(req.offset, 3);
        let outcome = a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        match outcome {
            IngestOutcome::Merged(stats) => assert!(stats.exhausted_now),
            other => panic!("unexpected {:?}", other),
        }
        assert!(a.is_exhausted());
        assert!(a.advance().is_none());
        assert_eq!(a.cursor().offset(), 3);
    }

    #[test]
    fn test_head_refresh_without_news_keeps_paging_open() {
        let mut a = acc();
        let req = a.refresh().unwrap();
        a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        let req = a.refresh().unwrap();
        let outcome = a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        assert!(matches!(outcome, IngestOutcome::Merged(s) if s.duplicates == 1 && !s.exhausted_now));
        assert!(!a.is_exhausted());
        assert!(a.advance().is_some());
    }

    #[test]
    fn test_short_page_is_not_exhaustion() {
        let mut a = acc();
        // page size is 3, deliver one new record
        let stats = a.ingest_raw(vec![raw("a", 1, "x", "")]);
        assert_eq!(stats.added, 1);
        assert!(!stats.exhausted_now);
        assert!(!a.is_exhausted());
    }

    #[test]
    fn test_exhaustion_is_sticky() {
        let mut a = acc();
        a.ingest_raw(vec![]);
        assert!(a.is_exhausted());
        let stats = a.ingest_raw(vec![raw("late", 1, "x", "")]);
        assert_eq!(stats.added, 1);
        assert!(a.is_exhausted());
        assert!(!a.ingest_raw(vec![]).exhausted_now);
    }

    #[test]
    fn test_single_fetch_in_flight() {
        let mut a = acc();
        let req = a.refresh().unwrap();
        assert!(a.refresh().is_none());
        assert!(a.advance().is_none());
        a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        assert!(a.in_flight().is_none());
        assert!(a.advance().is_some());
    }

    #[test]
    fn test_stale_generation_discarded() {
        let mut a = acc();
        let req = a.refresh().unwrap();
        a.reset(FilterScope::new("other", "token:transfer"));
        let outcome = a.ingest_page(&req, ActionsPage::ok(vec![raw("a", 1, "x", "")]));
        assert_eq!(outcome, IngestOutcome::Stale);
        assert!(a.is_empty());
        assert_eq!(a.generation(), 1);
        assert_eq!(a.scope().account, "other");
        assert!(a.refresh().is_some());
    }

    #[test]
    fn test_failed_load_more_rolls_back_offset() {
        let mut a = acc();
        let req = a.advance().unwrap();
        assert_eq!(a.cursor().offset(), 3);
        assert_eq!(a.ingest_page(&req, ActionsPage::errored()), IngestOutcome::Failed);
        assert_eq!(a.cursor().offset(), 0);
        assert!(!a.is_exhausted());
        assert_eq!(a.advance().unwrap().offset, 3);
    }

    #[test]
    fn test_malformed_record_dropped_rest_merged() {
        let mut a = acc();
        let mut bad = raw("bad", 1, "x", "");
        bad.timestamp = "garbage".into();
        let stats = a.ingest_raw(vec![bad, raw("good", 2, "x", "")]);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.added, 1);
        assert_eq!(ids(&a), vec!["good"]);
    }

    #[test]
    fn test_filter_predicate_applies() {
        let mut a = LedgerAccumulator::builder(FilterScope::new("bridge", "f"))
            .filter(|_, r| !r.memo.contains("fee"))
            .build();
        let stats = a.ingest_raw(vec![raw("a", 1, "x", "bridge fee"), raw("b", 2, "x", "deposit")]);
        assert_eq!(stats.filtered_out, 1);
        assert_eq!(ids(&a), vec!["b"]);
    }

    #[test]
    fn test_snapshot_is_copy_on_write() {
        let mut a = acc();
        a.ingest_raw(vec![raw("a", 1, "x", "")]);
        let held = a.snapshot();
        a.ingest_raw(vec![raw("b", 2, "x", "")]);
        assert_eq!(held.len(), 1);
        assert_eq!(a.snapshot().len(), 2);
    }

    #[test]
    fn test_size_never_decreases() {
        let mut a = acc();
        let pages = vec![
            vec![raw("a", 1, "x", ""), raw("b", 2, "x", "")],
            vec![raw("b", 2, "x", "")],
            vec![],
            vec![raw("c", 3, "x", ""), raw("a", 1, "x", "")],
        ];
        let mut last = 0;
        for page in pages {
            a.ingest_raw(page);
            assert!(a.len() >= last);
            last = a.len();
        }
        assert_eq!(last, 3);
    }
}
