// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod api;
pub mod config;
pub mod degraded;
pub mod engine;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod region;
pub mod relevance;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::engine::{EngineError, HotspotEngine, RegionScore, Sources, TickSummary};
pub use crate::region::Region;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::degraded::{DegradedModeProvider, NeutralFallback, SyntheticFallback};
use crate::ingest::fetcher::{HttpTransport, RandomSource};
use crate::ingest::types::{Connector, SocialPost};
use crate::ingest::providers::{
    bluesky::BlueskyConnector, polymarket::PolymarketConnector, quotes::QuoteConnector,
    rss_news::RssNewsAggregator, trends::TrendsConnector, truthsocial::TruthSocialConnector,
};
use crate::relevance::RegionClassifier;

/// Wire every connector, the engine and the API state from one config.
///
/// All outbound traffic goes through `transport`; `rng` drives jitter and the
/// synthetic fallback, so tests can pass deterministic implementations.
pub fn build_state(
    cfg: &AppConfig,
    transport: Arc<dyn HttpTransport>,
    rng: Arc<dyn RandomSource>,
) -> anyhow::Result<AppState> {
    let classifier = Arc::new(match &cfg.classifier_path {
        Some(p) => RegionClassifier::from_path(p)?,
        None => RegionClassifier::builtin(),
    });
    let fetch = &cfg.fetch;

    let sources = Sources {
        news: Some(Arc::new(RssNewsAggregator::new(
            cfg.news.clone(),
            fetch,
            transport.clone(),
            rng.clone(),
            classifier.clone(),
        ))),
        social: vec![
            Arc::new(BlueskyConnector::new(
                cfg.bluesky.clone(),
                fetch,
                transport.clone(),
                rng.clone(),
                classifier.clone(),
            )) as Arc<dyn Connector<SocialPost>>,
            Arc::new(TruthSocialConnector::new(
                cfg.truthsocial.clone(),
                fetch,
                transport.clone(),
                rng.clone(),
                classifier.clone(),
            )),
        ],
        markets: Some(Arc::new(PolymarketConnector::new(
            cfg.polymarket.clone(),
            fetch,
            transport.clone(),
            rng.clone(),
            classifier,
        ))),
        commodities: Some(Arc::new(QuoteConnector::new(
            "commodities",
            cfg.commodities.clone(),
            fetch,
            transport.clone(),
            rng.clone(),
        ))),
        trends: Some(Arc::new(TrendsConnector::from_config(
            &cfg.trends,
            fetch,
            transport.clone(),
            rng.clone(),
        ))),
    };

    let degraded: Arc<dyn DegradedModeProvider> = if cfg.engine.synthetic_fallback {
        Arc::new(SyntheticFallback::new(rng.clone()))
    } else {
        Arc::new(NeutralFallback)
    };

    let engine = HotspotEngine::new(sources)
        .with_degraded(degraded)
        .with_commodity_symbols(cfg.commodities.symbols.clone())
        .with_history_capacity(cfg.engine.history_capacity);

    let defense = QuoteConnector::new(
        "defense_stocks",
        cfg.defense_stocks.clone().into(),
        fetch,
        transport,
        rng,
    );

    Ok(AppState::new(Arc::new(engine)).with_quotes(Arc::new(defense)))
}
