use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use stakewatch::config::EngineConfig;
use stakewatch::feed::{ActionFeed, HttpFeed};
use stakewatch::ledger::{summary, FilterScope, LedgerView};
use stakewatch::report::{ReportOptions, StakeReport};
use stakewatch::scheduler::{DashboardState, EngineHandle, EngineOptions};

#[derive(Parser, Debug)]
#[command(name = "stakewatch", version, about = "Staking ledger and rewards projection daemon")]
struct Args {
    /// TOML config file; STAKEWATCH_* variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Account to follow. The leaderboard view defaults to the bridge account
    #[arg(long)]
    account: Option<String>,

    /// leaderboard, user or no-stake
    #[arg(long, default_value = "leaderboard")]
    view: LedgerView,

    /// Stake amount to compare against the current one
    #[arg(long)]
    hypothetical: Option<f64>,

    /// Keep paging history until the feed is exhausted
    #[arg(long)]
    load_all: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = std::env::var("STAKEWATCH_LOG")
        .unwrap_or_else(|_| std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let config = EngineConfig::load(args.config.as_deref())?;

    let account = match (&args.account, args.view) {
        (Some(a), _) => a.clone(),
        (None, LedgerView::Leaderboard) => config.chain.bridge_account.clone(),
        (None, view) => bail!("--account is required for the {} view", view.as_str()),
    };
    if let Some(h) = args.hypothetical {
        if !h.is_finite() || h < 0.0 {
            bail!("--hypothetical must be a non-negative amount");
        }
    }

    let scope = FilterScope::new(&account, &config.chain.transfer_filter());
    let feed: Arc<dyn ActionFeed> = Arc::new(HttpFeed::new(config.endpoints.clone(), config.chain.clone())?);
    info!(
        view = args.view.as_str(),
        account = %account,
        chain = %config.endpoints.chain_url,
        history = %config.endpoints.history_url,
        "stakewatch starting up"
    );

    let engine = EngineHandle::spawn(
        feed,
        config.clone(),
        EngineOptions {
            view: args.view,
            scope,
            follow_pages: args.load_all,
        },
    );

    let report_options = ReportOptions {
        horizon_days: config.projection.horizon_days,
        sampling_interval_days: config.projection.sampling_interval_days,
        hypothetical: args.hypothetical,
    };

    #[cfg(feature = "metrics-server")]
    let shared_report: stakewatch::server::SharedReport = Default::default();
    #[cfg(feature = "metrics-server")]
    if let Some(port) = config.metrics_port {
        let state = stakewatch::server::ServerState {
            dashboard: engine.subscribe(),
            report: Arc::clone(&shared_report),
        };
        tokio::spawn(async move {
            if let Err(e) = stakewatch::server::serve(port, state).await {
                warn!(error = %e, "metrics server stopped");
            }
        });
    }

    let mut report_tick = tokio::time::interval(Duration::from_secs(config.schedule.report_secs.max(1)));
    report_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = report_tick.tick() => {
                let state = engine.state();
                let report = log_report(&state, &config, &report_options);
                #[cfg(feature = "metrics-server")]
                {
                    *shared_report.write() = report;
                }
                #[cfg(not(feature = "metrics-server"))]
                let _ = report;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}

fn log_report(state: &DashboardState, config: &EngineConfig, options: &ReportOptions) -> Option<StakeReport> {
    if !state.degraded.is_empty() {
        let classes: Vec<&str> = state.degraded.iter().map(|c| c.as_str()).collect();
        warn!(degraded = ?classes, "some data sources are failing, figures may be out of date");
    }
    if state.pool_stale {
        warn!("pool snapshot is stale");
    }

    match state.view {
        LedgerView::Leaderboard => {
            let top = summary::leaderboard(&state.ledger, 5);
            info!(
                records = state.ledger_size,
                exhausted = state.cursor.is_exhausted(),
                stakers = top.len(),
                "leaderboard"
            );
            for entry in &top {
                info!(rank = entry.rank, account = %entry.account, total = entry.total, "leaderboard entry");
            }
            None
        }
        LedgerView::User | LedgerView::NoStake => {
            let flow = summary::account_flow(&state.ledger, &state.scope.account);
            info!(
                account = %flow.account,
                records = state.ledger_size,
                total_in = flow.total_in,
                total_out = flow.total_out,
                exhausted = state.cursor.is_exhausted(),
                "account ledger"
            );
            let Some(stake) = state.account_stake else {
                info!("account stake not loaded yet");
                return None;
            };
            let report = StakeReport::build(
                stake,
                state.pool.as_ref(),
                state.rewards_pool_balance,
                &config.tiers,
                options,
            );
            info!(account = %state.scope.account, "{}", report.summary_line());
            Some(report)
        }
    }
}
