//! Read-only HTTP surface: Prometheus text at /metrics, the latest
//! dashboard snapshot and report at /state.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use serde_json::json;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::ledger::{summary, LedgerView};
use crate::metrics;
use crate::report::StakeReport;
use crate::scheduler::DashboardState;

/// Rows of ledger and leaderboard included in /state
const STATE_ROWS: usize = 20;

pub type SharedReport = Arc<RwLock<Option<StakeReport>>>;

#[derive(Clone)]
pub struct ServerState {
    pub dashboard: watch::Receiver<Arc<DashboardState>>,
    pub report: SharedReport,
}

pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods([Method::GET]);
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/state", get(state_handler))
        .layer(cors)
        .with_state(state)
}

async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

async fn state_handler(State(s): State<ServerState>) -> impl IntoResponse {
    let dashboard = Arc::clone(&s.dashboard.borrow());
    let report = s.report.read().clone();

    let (leaderboard, account_flow) = match dashboard.view {
        LedgerView::Leaderboard => (Some(summary::leaderboard(&dashboard.ledger, STATE_ROWS)), None),
        LedgerView::User | LedgerView::NoStake => (
            None,
            Some(summary::account_flow(&dashboard.ledger, &dashboard.scope.account)),
        ),
    };
    let recent: Vec<_> = dashboard.ledger.iter().take(STATE_ROWS).collect();

    Json(json!({
        "dashboard": &*dashboard,
        "report": report,
        "leaderboard": leaderboard,
        "account_flow": account_flow,
        "recent": recent,
    }))
}

pub async fn serve(port: u16, state: ServerState) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(listen = %addr, "metrics server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
