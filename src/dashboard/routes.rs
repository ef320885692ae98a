//! Dashboard API route handlers.
//!
//! All endpoints return JSON except `/`. State is shared via `Arc<DashboardState>`.

use axum::{extract::State, http::StatusCode, response::Html, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::html;
use crate::engine::portfolio::PortfolioSnapshot;
use crate::types::{ScanResult, ScoredAsset};

/// Scan summaries kept for `/api/scans`.
pub const SCAN_HISTORY_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub scanner_name: String,
    pub started_at: DateTime<Utc>,
    pub latest: RwLock<Option<ScanResult>>,
    pub history: RwLock<VecDeque<ScanSummary>>,
    /// Every scan recorded since startup; `history` only keeps the tail.
    pub scans_run: AtomicU64,
    /// `None` while paper trading is disabled.
    pub portfolio: RwLock<Option<PortfolioSnapshot>>,
}

impl DashboardState {
    pub fn new(scanner_name: impl Into<String>) -> Self {
        Self {
            scanner_name: scanner_name.into(),
            started_at: Utc::now(),
            latest: RwLock::new(None),
            history: RwLock::new(VecDeque::new()),
            scans_run: AtomicU64::new(0),
            portfolio: RwLock::new(None),
        }
    }

    /// Publish a finished scan.
    pub async fn record_scan(&self, result: ScanResult) {
        {
            let mut history = self.history.write().await;
            if history.len() == SCAN_HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(ScanSummary::from(&result));
        }
        self.scans_run.fetch_add(1, Ordering::Relaxed);
        *self.latest.write().await = Some(result);
    }

    pub async fn set_portfolio(&self, snapshot: PortfolioSnapshot) {
        *self.portfolio.write().await = Some(snapshot);
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub uptime_secs: i64,
    pub scans_run: u64,
    pub last_scan: Option<DateTime<Utc>>,
    pub paper_trading: bool,
}

/// One line of scan history.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub scored: usize,
    pub failed: usize,
    pub buy_signals: usize,
    pub best_pair: Option<String>,
    pub best_score: Option<i32>,
}

impl From<&ScanResult> for ScanSummary {
    fn from(result: &ScanResult) -> Self {
        let best = result.best();
        Self {
            scan_id: result.scan_id,
            timestamp: result.timestamp,
            elapsed_ms: result.elapsed_ms,
            scored: result.scored.len(),
            failed: result.failures.len(),
            buy_signals: result.scored.iter().filter(|s| s.action.is_buy()).count(),
            best_pair: best.map(|b| b.pair.id.clone()),
            best_score: best.map(|b| b.score),
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

pub type AppState = Arc<DashboardState>;

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let history = state.history.read().await;
    Json(StatusResponse {
        name: state.scanner_name.clone(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        scans_run: state.scans_run.load(Ordering::Relaxed),
        last_scan: history.back().map(|s| s.timestamp),
        paper_trading: state.portfolio.read().await.is_some(),
    })
}

/// GET /api/scan
pub async fn get_scan(State(state): State<AppState>) -> Result<Json<ScanResult>, StatusCode> {
    state
        .latest
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/best
pub async fn get_best(State(state): State<AppState>) -> Result<Json<ScoredAsset>, StatusCode> {
    let latest = state.latest.read().await;
    latest
        .as_ref()
        .and_then(|r| r.best())
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/scans
pub async fn get_scans(State(state): State<AppState>) -> Json<Vec<ScanSummary>> {
    let history = state.history.read().await;
    Json(history.iter().cloned().collect())
}

/// GET /api/portfolio
pub async fn get_portfolio(
    State(state): State<AppState>,
) -> Result<Json<PortfolioSnapshot>, StatusCode> {
    state
        .portfolio
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /
pub async fn serve_dashboard(State(state): State<AppState>) -> Html<String> {
    let latest = state.latest.read().await;
    let portfolio = state.portfolio.read().await;
    Html(html::render(
        &state.scanner_name,
        latest.as_ref(),
        portfolio.as_ref(),
    ))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
