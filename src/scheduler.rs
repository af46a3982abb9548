//! Refresh scheduler.
//!
//! One actor task owns the accumulator and every piece of last-known-good
//! data. Tickers and fetch tasks only send it events; after each event it
//! publishes an immutable [`DashboardState`] through a watch channel, so
//! readers always see one consistent snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feed::ActionFeed;
use crate::health::{DataClass, HealthReport};
use crate::ledger::{
    ActionsPage, FilterScope, IngestOutcome, Ledger, LedgerAccumulator, LedgerView, PageRequest,
    PaginationCursor,
};
use crate::metrics;
use crate::pool_state::PoolStateSnapshot;

const EVENT_QUEUE: usize = 64;

/// What the engine runs against.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub view: LedgerView,
    pub scope: FilterScope,
    /// Keep paging backwards after every merge until the feed is exhausted
    pub follow_pages: bool,
}

/// Everything a consumer renders, captured at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardState {
    pub view: LedgerView,
    pub scope: FilterScope,
    pub generation: u64,
    #[serde(skip)]
    pub ledger: Arc<Ledger>,
    pub ledger_size: usize,
    pub cursor: PaginationCursor,
    pub loading: bool,
    pub pool: Option<PoolStateSnapshot>,
    pub pool_stale: bool,
    pub rewards_pool_balance: Option<f64>,
    pub account_stake: Option<f64>,
    pub health: HealthReport,
    pub degraded: Vec<DataClass>,
    pub updated_at: DateTime<Utc>,
}

impl DashboardState {
    fn initial(view: LedgerView, scope: FilterScope, cursor: PaginationCursor) -> Self {
        Self {
            view,
            scope,
            generation: 0,
            ledger: Arc::new(Ledger::default()),
            ledger_size: 0,
            cursor,
            loading: false,
            pool: None,
            pool_stale: false,
            rewards_pool_balance: None,
            account_stake: None,
            health: HealthReport::default(),
            degraded: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub(crate) enum EngineEvent {
    RefreshLedger,
    LoadMore,
    Reset(FilterScope),
    PageDelivered { request: PageRequest, page: ActionsPage },
    RefreshPool,
    PoolDelivered(Result<PoolStateSnapshot, EngineError>),
    StakeDelivered { generation: u64, result: Result<f64, EngineError> },
    RefreshRewards,
    RewardsDelivered(Result<f64, EngineError>),
    Shutdown,
}

struct EngineActor {
    feed: Arc<dyn ActionFeed>,
    config: EngineConfig,
    view: LedgerView,
    follow_pages: bool,
    accumulator: LedgerAccumulator,
    pool: Option<PoolStateSnapshot>,
    rewards_pool_balance: Option<f64>,
    account_stake: Option<f64>,
    health: HealthReport,
    pool_in_flight: bool,
    stake_in_flight: bool,
    rewards_in_flight: bool,
    events: mpsc::Sender<EngineEvent>,
    state_tx: watch::Sender<Arc<DashboardState>>,
}

impl EngineActor {
    async fn run(mut self, mut rx: mpsc::Receiver<EngineEvent>) {
        info!(
            view = self.view.as_str(),
            account = %self.accumulator.scope().account,
            "engine started"
        );
        while let Some(event) = rx.recv().await {
            if matches!(event, EngineEvent::Shutdown) {
                break;
            }
            self.handle(event);
            self.publish();
        }
        info!("engine stopped");
    }

    fn handle(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::RefreshLedger => {
                if let Some(request) = self.accumulator.refresh() {
                    self.fetch_page(request);
                }
            }
            EngineEvent::LoadMore => {
                if let Some(request) = self.accumulator.advance() {
                    self.fetch_page(request);
                }
            }
            EngineEvent::Reset(scope) => {
                self.accumulator.reset(scope);
                self.account_stake = None;
                self.stake_in_flight = false;
                self.health.ledger = Default::default();
                self.health.account_stake = Default::default();
                metrics::LEDGER_GENERATION.set(self.accumulator.generation() as i64);
                if let Some(request) = self.accumulator.refresh() {
                    self.fetch_page(request);
                }
                self.fetch_stake();
            }
            EngineEvent::PageDelivered { request, page } => self.on_page(request, page),
            EngineEvent::RefreshPool => {
                self.fetch_pool();
                self.fetch_stake();
            }
            EngineEvent::PoolDelivered(result) => {
                self.pool_in_flight = false;
                match result {
                    Ok(snapshot) => {
                        debug!(
                            total_staked = snapshot.total_staked,
                            rate = snapshot.reward_rate_per_second,
                            "pool state refreshed"
                        );
                        self.pool = Some(snapshot);
                        self.health.pool_state.record_success(Utc::now());
                    }
                    Err(e) => self.record_failure(DataClass::PoolState, &e),
                }
            }
            EngineEvent::StakeDelivered { generation, result } => {
                if generation != self.accumulator.generation() {
                    debug!(generation, "discarding stake from stale generation");
                    return;
                }
                self.stake_in_flight = false;
                match result {
                    Ok(amount) => {
                        self.account_stake = Some(amount);
                        self.health.account_stake.record_success(Utc::now());
                    }
                    Err(e) => self.record_failure(DataClass::AccountStake, &e),
                }
            }
            EngineEvent::RefreshRewards => self.fetch_rewards(),
            EngineEvent::RewardsDelivered(result) => {
                self.rewards_in_flight = false;
                match result {
                    Ok(balance) => {
                        self.rewards_pool_balance = Some(balance);
                        self.health.rewards_balance.record_success(Utc::now());
                    }
                    Err(e) => self.record_failure(DataClass::RewardsBalance, &e),
                }
            }
            EngineEvent::Shutdown => {}
        }
    }

    fn on_page(&mut self, request: PageRequest, page: ActionsPage) {
        match self.accumulator.ingest_page(&request, page) {
            IngestOutcome::Merged(stats) => {
                metrics::PAGES_MERGED.inc();
                metrics::RECORDS_DUPLICATE.inc_by(stats.duplicates as u64);
                metrics::RECORDS_MALFORMED.inc_by(stats.malformed as u64);
                self.health.ledger.record_success(Utc::now());
                if stats.added > 0 || stats.exhausted_now {
                    info!(
                        account = %request.scope.account,
                        offset = request.offset,
                        added = stats.added,
                        duplicates = stats.duplicates,
                        total = self.accumulator.len(),
                        exhausted = self.accumulator.is_exhausted(),
                        "ledger page merged"
                    );
                }
                if self.follow_pages {
                    if let Some(next) = self.accumulator.advance() {
                        self.fetch_page(next);
                    }
                }
            }
            IngestOutcome::Stale => metrics::PAGES_STALE.inc(),
            IngestOutcome::Failed => {
                let e = EngineError::transient("actions", format!("page at offset {} failed", request.offset));
                self.record_failure(DataClass::Ledger, &e);
            }
        }
        metrics::LEDGER_SIZE.set(self.accumulator.len() as i64);
        metrics::LEDGER_EXHAUSTED.set(self.accumulator.is_exhausted() as i64);
    }

    fn record_failure(&mut self, class: DataClass, error: &EngineError) {
        metrics::FETCH_FAILURES.with_label_values(&[class.as_str()]).inc();
        let health = self.health.get_mut(class);
        health.record_failure(error.to_string());
        let failures = health.consecutive_failures;
        if health.is_degraded(self.config.schedule.failure_window) {
            warn!(class = class.as_str(), failures, error = %error, "data source degraded, showing last good data");
        } else {
            debug!(class = class.as_str(), failures, error = %error, "fetch failed");
        }
    }

    fn fetch_page(&self, request: PageRequest) {
        let feed = Arc::clone(&self.feed);
        let events = self.events.clone();
        tokio::spawn(async move {
            let page = feed
                .fetch_actions_page(
                    &request.scope.account,
                    &request.scope.action_filter,
                    request.offset,
                    request.limit,
                )
                .await;
            let _ = events.send(EngineEvent::PageDelivered { request, page }).await;
        });
    }

    fn fetch_pool(&mut self) {
        if self.pool_in_flight {
            return;
        }
        self.pool_in_flight = true;
        let feed = Arc::clone(&self.feed);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = feed.fetch_pool_state().await;
            let _ = events.send(EngineEvent::PoolDelivered(result)).await;
        });
    }

    /// Only the per-user views carry a stake figure.
    fn fetch_stake(&mut self) {
        if self.view == LedgerView::Leaderboard || self.stake_in_flight {
            return;
        }
        self.stake_in_flight = true;
        let feed = Arc::clone(&self.feed);
        let events = self.events.clone();
        let account = self.accumulator.scope().account.clone();
        let generation = self.accumulator.generation();
        tokio::spawn(async move {
            let result = feed.fetch_account_stake(&account).await;
            let _ = events.send(EngineEvent::StakeDelivered { generation, result }).await;
        });
    }

    fn fetch_rewards(&mut self) {
        if self.rewards_in_flight {
            return;
        }
        self.rewards_in_flight = true;
        let feed = Arc::clone(&self.feed);
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = feed.fetch_rewards_pool_balance().await;
            let _ = events.send(EngineEvent::RewardsDelivered(result)).await;
        });
    }

    fn publish(&self) {
        let now = Utc::now();
        let window = self.config.schedule.failure_window;
        let stale_after = self.config.schedule.pool_stale_after_secs();
        let state = DashboardState {
            view: self.view,
            scope: self.accumulator.scope().clone(),
            generation: self.accumulator.generation(),
            ledger: self.accumulator.snapshot(),
            ledger_size: self.accumulator.len(),
            cursor: self.accumulator.cursor(),
            loading: self.accumulator.in_flight().is_some(),
            pool_stale: self.pool.as_ref().map_or(false, |p| p.is_stale(now, stale_after)),
            pool: self.pool.clone(),
            rewards_pool_balance: self.rewards_pool_balance,
            account_stake: self.account_stake,
            degraded: self.health.degraded(window),
            health: self.health.clone(),
            updated_at: now,
        };
        self.state_tx.send_replace(Arc::new(state));
    }
}

fn spawn_ticker(
    events: mpsc::Sender<EngineEvent>,
    every_secs: u64,
    name: &'static str,
    make: fn() -> EngineEvent,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(ticker = name, every_secs, "ticker started");
        let mut interval = time::interval(Duration::from_secs(every_secs.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if events.send(make()).await.is_err() {
                break;
            }
        }
    })
}

/// Control surface for a running engine.
///
/// Dropping the handle aborts the engine; `shutdown` stops it cleanly.
pub struct EngineHandle {
    events: mpsc::Sender<EngineEvent>,
    state_rx: watch::Receiver<Arc<DashboardState>>,
    /// Taken by `shutdown` once the actor has been joined
    actor: Option<JoinHandle<()>>,
    tickers: Vec<JoinHandle<()>>,
}

impl EngineHandle {
    /// Start the actor and one ticker per data class. Every ticker fires
    /// immediately, which doubles as the initial load.
    pub fn spawn(feed: Arc<dyn ActionFeed>, config: EngineConfig, options: EngineOptions) -> Self {
        let (events, rx) = mpsc::channel(EVENT_QUEUE);
        let accumulator = options.view.accumulator(
            options.scope.clone(),
            config.schedule.page_size,
            &config.chain.fee_memo_marker,
        );
        let (state_tx, state_rx) = watch::channel(Arc::new(DashboardState::initial(
            options.view,
            options.scope,
            accumulator.cursor(),
        )));

        metrics::init();
        let schedule = config.schedule.clone();
        let actor = EngineActor {
            feed,
            config,
            view: options.view,
            follow_pages: options.follow_pages,
            accumulator,
            pool: None,
            rewards_pool_balance: None,
            account_stake: None,
            health: HealthReport::default(),
            pool_in_flight: false,
            stake_in_flight: false,
            rewards_in_flight: false,
            events: events.clone(),
            state_tx,
        };
        let actor = tokio::spawn(actor.run(rx));

        let tickers = vec![
            spawn_ticker(events.clone(), schedule.ledger_refresh_secs, "ledger", || {
                EngineEvent::RefreshLedger
            }),
            spawn_ticker(events.clone(), schedule.pool_refresh_secs, "pool", || {
                EngineEvent::RefreshPool
            }),
            spawn_ticker(events.clone(), schedule.rewards_refresh_secs, "rewards", || {
                EngineEvent::RefreshRewards
            }),
        ];

        Self {
            events,
            state_rx,
            actor: Some(actor),
            tickers,
        }
    }

    async fn send(&self, event: EngineEvent) -> Result<(), EngineError> {
        self.events.send(event).await.map_err(|_| EngineError::Stopped)
    }

    /// Fetch the next page past the cursor. Ignored once exhausted or while
    /// a page fetch is outstanding.
    pub async fn load_more(&self) -> Result<(), EngineError> {
        self.send(EngineEvent::LoadMore).await
    }

    /// Re-read the newest page now instead of waiting for the ticker.
    pub async fn refresh_ledger(&self) -> Result<(), EngineError> {
        self.send(EngineEvent::RefreshLedger).await
    }

    /// Switch to a new account or filter; the ledger starts over.
    pub async fn reset(&self, scope: FilterScope) -> Result<(), EngineError> {
        self.send(EngineEvent::Reset(scope)).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardState>> {
        self.state_rx.clone()
    }

    /// Latest published state
    pub fn state(&self) -> Arc<DashboardState> {
        Arc::clone(&self.state_rx.borrow())
    }

    pub async fn shutdown(mut self) {
        for ticker in &self.tickers {
            ticker.abort();
        }
        let _ = self.events.send(EngineEvent::Shutdown).await;
        if let Some(actor) = self.actor.take() {
            if let Err(e) = actor.await {
                warn!(error = %e, "engine task ended abnormally");
            }
        }
    }
}

impl Drop for EngineHandle {
    // the actor holds its own sender, so it never sees the channel close
    fn drop(&mut self) {
        for ticker in &self.tickers {
            ticker.abort();
        }
        if let Some(actor) = self.actor.take() {
            debug!("engine handle dropped without shutdown, aborting");
            actor.abort();
        }
    }
}
