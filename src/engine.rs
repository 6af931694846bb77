//! # Hotspot Engine
//! One scoring tick: fan out to every connector, score each region from the
//! same snapshot, swap the score board wholesale, append history.
//!
//! A connector failure only empties that connector's contribution for the
//! tick. The tick fails only when every configured source failed, in which
//! case the previous board and history are left untouched.

use chrono::{DateTime, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyze::{score_region, total_and_level, AlertLevel, Factors, Snapshot, Weights, WEIGHTS};
use crate::config::SymbolCfg;
use crate::degraded::{DegradedModeProvider, NeutralFallback};
use crate::history::{History, HistoryEntry, DEFAULT_CAPACITY};
use crate::ingest::fetcher::FetchError;
use crate::ingest::types::{Connector, NewsItem, PredictionMarket, Quote, SocialPost, Tagged, TrendReading};
use crate::region::Region;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("no sources configured")]
    NoSources,
    #[error("all {attempted} sources failed")]
    AllSourcesFailed { attempted: usize },
}

/// Connectors the engine fans out to. Absent connectors contribute nothing.
#[derive(Default, Clone)]
pub struct Sources {
    pub news: Option<Arc<dyn Connector<NewsItem>>>,
    pub social: Vec<Arc<dyn Connector<SocialPost>>>,
    pub markets: Option<Arc<dyn Connector<PredictionMarket>>>,
    pub commodities: Option<Arc<dyn Connector<Quote>>>,
    pub trends: Option<Arc<dyn Connector<TrendReading>>>,
}

impl Sources {
    pub fn len(&self) -> usize {
        self.news.is_some() as usize
            + self.social.len()
            + self.markets.is_some() as usize
            + self.commodities.is_some() as usize
            + self.trends.is_some() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionScore {
    pub region_id: Region,
    pub name: &'static str,
    pub name_zh: &'static str,
    pub total_score: f64,
    pub alert_level: AlertLevel,
    pub factors: Factors,
    pub last_updated: DateTime<Utc>,
}

impl RegionScore {
    fn idle(region: Region, at: DateTime<Utc>) -> Self {
        let info = region.info();
        Self {
            region_id: region,
            name: info.name,
            name_zh: info.name_zh,
            total_score: 0.0,
            alert_level: AlertLevel::Low,
            factors: Factors::default(),
            last_updated: at,
        }
    }
}

/// Published state; replaced as a whole at the end of every successful tick.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreBoard {
    pub current_hotspot: Option<Region>,
    pub regions: BTreeMap<Region, RegionScore>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScoreBoard {
    fn initial() -> Self {
        let now = Utc::now();
        Self {
            current_hotspot: None,
            regions: Region::ALL.into_iter().map(|r| (r, RegionScore::idle(r, now))).collect(),
            updated_at: None,
        }
    }

    pub fn hotspot(&self) -> Option<&RegionScore> {
        self.current_hotspot.and_then(|r| self.regions.get(&r))
    }
}

/// Pushed to subscribers after every successful tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickSummary {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub hotspot: Region,
    pub hotspot_score: f64,
    pub alert_level: AlertLevel,
    pub failed_sources: Vec<&'static str>,
}

/// First region (in `Region::ALL` order) with the strictly highest total.
pub fn pick_hotspot(scores: &BTreeMap<Region, RegionScore>) -> Option<Region> {
    let mut best: Option<(Region, f64)> = None;
    for r in Region::ALL {
        let Some(s) = scores.get(&r) else { continue };
        match best {
            Some((_, top)) if s.total_score <= top => {}
            _ => best = Some((r, s.total_score)),
        }
    }
    best.map(|(r, _)| r)
}

type FetchTask<T> = (&'static str, JoinHandle<Result<Arc<Vec<T>>, FetchError>>);

fn spawn_fetch<T>(c: &Arc<dyn Connector<T>>, force: bool) -> FetchTask<T>
where
    T: Tagged + Clone + Send + Sync + 'static,
{
    let c = c.clone();
    let name = c.name();
    (name, tokio::spawn(async move { c.fetch_all(force).await }))
}

pub struct HotspotEngine {
    sources: Sources,
    degraded: Arc<dyn DegradedModeProvider>,
    commodity_symbols: Vec<SymbolCfg>,
    weights: Weights,
    board: RwLock<Arc<ScoreBoard>>,
    history: History,
    ticks: AtomicU64,
    tick_lock: Mutex<()>,
    events: broadcast::Sender<TickSummary>,
}

impl HotspotEngine {
    pub fn new(sources: Sources) -> Self {
        crate::ingest::ensure_metrics_described();
        let (events, _) = broadcast::channel(16);
        Self {
            sources,
            degraded: Arc::new(NeutralFallback),
            commodity_symbols: Vec::new(),
            weights: WEIGHTS,
            board: RwLock::new(Arc::new(ScoreBoard::initial())),
            history: History::with_capacity(DEFAULT_CAPACITY),
            ticks: AtomicU64::new(0),
            tick_lock: Mutex::new(()),
            events,
        }
    }

    pub fn with_degraded(mut self, degraded: Arc<dyn DegradedModeProvider>) -> Self {
        self.degraded = degraded;
        self
    }

    /// Symbols handed to the degraded provider when commodities are unavailable.
    pub fn with_commodity_symbols(mut self, symbols: Vec<SymbolCfg>) -> Self {
        self.commodity_symbols = symbols;
        self
    }

    pub fn with_history_capacity(mut self, cap: usize) -> Self {
        self.history = History::with_capacity(cap);
        self
    }

    /// Run one scoring tick. Concurrent calls are serialised.
    pub async fn update_scores(&self, force: bool) -> Result<TickSummary, EngineError> {
        let _guard = self.tick_lock.lock().await;
        let started = std::time::Instant::now();

        match self.run_tick(force).await {
            Ok(summary) => {
                let ms = started.elapsed().as_secs_f64() * 1000.0;
                counter!("engine_ticks_total").increment(1);
                histogram!("engine_tick_ms").record(ms);
                info!(
                    target: "engine",
                    tick = summary.tick,
                    hotspot = %summary.hotspot,
                    score = summary.hotspot_score,
                    level = %summary.alert_level,
                    failed = ?summary.failed_sources,
                    ms = ms as u64,
                    "tick complete"
                );
                let _ = self.events.send(summary.clone());
                Ok(summary)
            }
            Err(e) => {
                counter!("engine_tick_failures_total").increment(1);
                error!(target: "engine", error = %e, "tick failed; keeping last published scores");
                Err(e)
            }
        }
    }

    async fn run_tick(&self, force: bool) -> Result<TickSummary, EngineError> {
        if self.sources.is_empty() {
            return Err(EngineError::NoSources);
        }

        // Spawn everything first so connectors run concurrently and a panic in
        // one task stays inside its JoinHandle.
        let news = self.sources.news.as_ref().map(|c| spawn_fetch(c, force));
        let social: Vec<_> = self.sources.social.iter().map(|c| spawn_fetch(c, force)).collect();
        let markets = self.sources.markets.as_ref().map(|c| spawn_fetch(c, force));
        let commodities = self.sources.commodities.as_ref().map(|c| spawn_fetch(c, force));
        let trends = self.sources.trends.as_ref().map(|c| spawn_fetch(c, force));

        let mut failed = Vec::new();
        let mut snap = Snapshot::default();
        if let Some(t) = news {
            snap.news = join(t, &mut failed).await;
        }
        for t in social {
            snap.social.extend(join(t, &mut failed).await);
        }
        if let Some(t) = markets {
            snap.markets = join(t, &mut failed).await;
        }
        if let Some(t) = commodities {
            snap.quotes = join(t, &mut failed).await;
        }
        if let Some(t) = trends {
            snap.trends = join(t, &mut failed).await;
        }

        let attempted = self.sources.len();
        if failed.len() == attempted {
            return Err(EngineError::AllSourcesFailed { attempted });
        }

        if snap.quotes.is_empty() {
            snap.quotes = self.degraded.quotes(&self.commodity_symbols);
            if !snap.quotes.is_empty() {
                debug!(target: "engine", provider = self.degraded.name(), n = snap.quotes.len(), "using fallback quotes");
            }
        }

        let now = Utc::now();
        let mut regions = BTreeMap::new();
        for region in Region::ALL {
            let factors = score_region(&snap, region, self.degraded.trend_interest(region));
            let (total, level) = total_and_level(&factors, &self.weights);
            gauge!("hotspot_region_score", "region" => region.id()).set(total);
            let info = region.info();
            regions.insert(
                region,
                RegionScore {
                    region_id: region,
                    name: info.name,
                    name_zh: info.name_zh,
                    total_score: total,
                    alert_level: level,
                    factors,
                    last_updated: now,
                },
            );
        }

        // regions is never empty, so a hotspot always exists here
        let hotspot = pick_hotspot(&regions).unwrap_or(Region::ALL[0]);
        let top = &regions[&hotspot];
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let summary = TickSummary {
            tick,
            timestamp: now,
            hotspot,
            hotspot_score: top.total_score,
            alert_level: top.alert_level,
            failed_sources: failed,
        };

        self.history.push(HistoryEntry {
            tick,
            timestamp: now,
            hotspot,
            scores: regions.iter().map(|(r, s)| (*r, s.total_score)).collect(),
        });
        let board = ScoreBoard {
            current_hotspot: Some(hotspot),
            regions,
            updated_at: Some(now),
        };
        *self.board.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(board);

        Ok(summary)
    }

    /// Current published board (cheap `Arc` clone).
    pub fn board(&self) -> Arc<ScoreBoard> {
        self.board.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `None` until the first successful tick.
    pub fn get_current_hotspot(&self) -> Option<RegionScore> {
        self.board().hotspot().cloned()
    }

    /// Exactly one record per region, always.
    pub fn get_all_scores(&self) -> BTreeMap<Region, RegionScore> {
        self.board().regions.clone()
    }

    /// Last `limit` history entries, oldest first.
    pub fn get_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.snapshot_last_n(limit)
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TickSummary> {
        self.events.subscribe()
    }
}

/// Await one connector task; any failure becomes an empty contribution.
async fn join<T>((name, handle): FetchTask<T>, failed: &mut Vec<&'static str>) -> Vec<T>
where
    T: Clone,
{
    match handle.await {
        Ok(Ok(items)) => return items.as_ref().clone(),
        Ok(Err(FetchError::Disabled)) => {
            debug!(target: "engine", source = name, "source disabled; skipped this tick")
        }
        Ok(Err(e)) => {
            warn!(target: "engine", source = name, error = %e, "source failed; contributes nothing this tick")
        }
        Err(join_err) => {
            warn!(target: "engine", source = name, error = %join_err, "connector task aborted")
        }
    }
    failed.push(name);
    counter!("connector_errors_total", "source" => name).increment(1);
    Vec::new()
}
