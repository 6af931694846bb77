// src/analyze/mod.rs
//! Scoring math: factor extractors and the fixed weight table.

pub mod signals;
pub mod weights;

use crate::ingest::types::{NewsItem, PredictionMarket, Quote, SocialPost, TrendReading};
use crate::region::Region;

pub use crate::analyze::weights::{round1, AlertLevel, Factors, Weights, WEIGHTS};

/// Item sets gathered at the start of one tick. Every region is scored
/// against the same snapshot.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub news: Vec<NewsItem>,
    pub social: Vec<SocialPost>,
    pub markets: Vec<PredictionMarket>,
    pub quotes: Vec<Quote>,
    pub trends: Vec<TrendReading>,
}

/// All seven factors for `region`, clamped and rounded to one decimal.
///
/// `trend_fallback` is used when the snapshot has no trend reading for the region.
pub fn score_region(snap: &Snapshot, region: Region, trend_fallback: f64) -> Factors {
    Factors {
        news_velocity: signals::news_velocity(&snap.news, region),
        social_volume: signals::social_volume(&snap.social, region),
        google_trends: signals::google_trends(&snap.trends, region, trend_fallback),
        sentiment_shift: signals::sentiment_shift(&snap.news, &snap.social, region),
        prediction_volatility: signals::prediction_volatility(&snap.markets, region),
        market_movement: signals::market_movement(&snap.quotes, region),
        event_triggers: signals::event_triggers(&snap.news, region),
    }
    .normalized()
}

/// Rounded total and its alert level. The level is taken from the rounded
/// value, so a displayed `40.0` is always elevated.
pub fn total_and_level(factors: &Factors, weights: &Weights) -> (f64, AlertLevel) {
    let total = round1(factors.weighted_total(weights));
    (total, AlertLevel::from_score(total))
}
