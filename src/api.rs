use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::engine::{HotspotEngine, RegionScore};
use crate::history::HistoryEntry;
use crate::ingest::types::{Connector, Quote};
use crate::region::{Region, RegionInfo};

const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<HotspotEngine>,
    /// Read-only quote board (defense stocks); not part of scoring.
    pub quotes: Option<Arc<dyn Connector<Quote>>>,
}

impl AppState {
    pub fn new(engine: Arc<HotspotEngine>) -> Self {
        Self { engine, quotes: None }
    }

    pub fn with_quotes(mut self, quotes: Arc<dyn Connector<Quote>>) -> Self {
        self.quotes = Some(quotes);
        self
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/v1/hotspot/current", get(current_hotspot))
        .route("/api/v1/hotspot/all", get(all_regions))
        .route("/api/v1/hotspot/history", get(history))
        .route("/api/v1/regions", get(regions))
        .route("/api/v1/regions/{id}", get(region_by_id))
        .route("/api/v1/markets/quotes", get(quotes))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct RefreshQuery {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

fn error_json(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

/// Run a tick before answering; a failed tick still serves the last good board.
async fn refresh(state: &AppState, force: bool) {
    if let Err(e) = state.engine.update_scores(force).await {
        tracing::warn!(target: "api", error = %e, force, "serving last known scores");
    }
}

async fn current_hotspot(State(state): State<AppState>, Query(q): Query<RefreshQuery>) -> Response {
    refresh(&state, q.force).await;
    match state.engine.get_current_hotspot() {
        Some(score) => Json(score).into_response(),
        None => error_json(StatusCode::SERVICE_UNAVAILABLE, "No hotspot data available"),
    }
}

#[derive(Serialize)]
struct AllOut {
    current_hotspot: Option<Region>,
    regions: std::collections::BTreeMap<Region, RegionScore>,
    timestamp: DateTime<Utc>,
}

async fn all_regions(State(state): State<AppState>, Query(q): Query<RefreshQuery>) -> Json<AllOut> {
    refresh(&state, q.force).await;
    let board = state.engine.board();
    Json(AllOut {
        current_hotspot: board.current_hotspot,
        regions: board.regions.clone(),
        timestamp: Utc::now(),
    })
}

#[derive(Serialize)]
struct HistoryOut {
    history: Vec<HistoryEntry>,
    timestamp: DateTime<Utc>,
}

async fn history(State(state): State<AppState>, Query(q): Query<HistoryQuery>) -> Json<HistoryOut> {
    let limit = q.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(HistoryOut {
        history: state.engine.get_history(limit),
        timestamp: Utc::now(),
    })
}

async fn regions() -> Json<Vec<RegionInfo>> {
    Json(Region::ALL.into_iter().map(Region::info).collect())
}

async fn region_by_id(Path(id): Path<String>) -> Response {
    match id.parse::<Region>() {
        Ok(r) => Json(r.info()).into_response(),
        Err(e) => error_json(StatusCode::NOT_FOUND, &e.to_string()),
    }
}

async fn quotes(State(state): State<AppState>) -> Response {
    let Some(c) = state.quotes.as_ref() else {
        return error_json(StatusCode::NOT_FOUND, "quote board not configured");
    };
    match c.fetch_all(false).await {
        Ok(items) => Json(json!({
            "quotes": items.as_ref(),
            "timestamp": Utc::now(),
        }))
        .into_response(),
        Err(e) => {
            tracing::warn!(target: "api", source = c.name(), error = %e, "quote board unavailable");
            error_json(StatusCode::BAD_GATEWAY, "quotes unavailable")
        }
    }
}
