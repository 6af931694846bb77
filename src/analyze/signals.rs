// src/analyze/signals.rs
//! Per-region factor extractors. Pure functions over one tick's item sets;
//! unclassified items never count towards any region.

use crate::ingest::types::{NewsItem, PredictionMarket, Quote, SocialPost, TrendReading};
use crate::region::Region;

/// Escalation vocabulary; each distinct hit counts once.
pub const ESCALATION_KEYWORDS: &[&str] = &[
    "strike",
    "attack",
    "war",
    "invasion",
    "military",
    "nuclear",
    "missile",
    "bomb",
    "troops",
    "conflict",
    "threat",
    "urgent",
    "breaking",
    "emergency",
    "crisis",
    "escalation",
    "tension",
];
const ESCALATION_SATURATION: f64 = 20.0;

/// Headline phrases; at most one hit per headline.
pub const TRIGGER_PHRASES: &[&str] = &[
    "breaking:",
    "just in:",
    "urgent:",
    "developing:",
    "strike",
    "explosion",
    "attack",
    "invasion",
    "declares war",
    "state of emergency",
    "evacuate",
    "nuclear",
    "missile launch",
    "airstrikes",
];
const TRIGGER_SATURATION: f64 = 5.0;
const TRIGGER_HEADLINES: usize = 20;

const OIL_SYMBOLS: &[&str] = &["CL=F", "BZ=F"];
const GOLD_SYMBOL: &str = "GC=F";
/// A 5% single-tick commodity move is treated as maximal.
const MAX_MOVE_PCT: f64 = 5.0;

pub const NEUTRAL_TREND_INTEREST: f64 = 50.0;

fn in_region<'a, T, F>(items: &'a [T], region: Region, tag: F) -> impl Iterator<Item = &'a T>
where
    F: Fn(&T) -> Option<Region> + 'a,
{
    items.iter().filter(move |i| tag(*i) == Some(region))
}

fn relevance_weight(relevance: f64) -> f64 {
    if relevance > 0.7 {
        2.0
    } else if relevance > 0.4 {
        1.5
    } else if relevance > 0.1 {
        1.0
    } else {
        0.0
    }
}

/// `ln(w+1)/ln(100)·100` over the tier-weighted count of the region's news.
pub fn news_velocity(news: &[NewsItem], region: Region) -> f64 {
    let weighted: f64 = in_region(news, region, |n| n.region)
        .map(|n| relevance_weight(n.relevance))
        .sum();
    if weighted <= 0.0 {
        return 0.0;
    }
    ((weighted + 1.0).ln() / 100f64.ln() * 100.0).min(100.0)
}

/// Half from post count (5 posts saturate), half from likes + reposts (50 saturate).
pub fn social_volume(posts: &[SocialPost], region: Region) -> f64 {
    let (count, engagement) = in_region(posts, region, |p| p.region)
        .fold((0u64, 0u64), |(c, e), p| (c + 1, e + p.engagement()));
    let count_part = (count as f64 / 5.0 * 50.0).min(50.0);
    let engagement_part = (engagement as f64 / 50.0 * 50.0).min(50.0);
    count_part + engagement_part
}

/// Distinct escalation keywords found across the region's news and posts.
pub fn sentiment_shift(news: &[NewsItem], posts: &[SocialPost], region: Region) -> f64 {
    let mut text = String::new();
    for n in in_region(news, region, |n| n.region) {
        text.push_str(&n.title.to_lowercase());
        text.push(' ');
        text.push_str(&n.summary.to_lowercase());
        text.push(' ');
    }
    for p in in_region(posts, region, |p| p.region) {
        text.push_str(&p.text.to_lowercase());
        text.push(' ');
    }
    let hits = ESCALATION_KEYWORDS.iter().filter(|kw| text.contains(*kw)).count();
    (hits as f64 / ESCALATION_SATURATION * 100.0).min(100.0)
}

/// Headlines among the region's first 20 news items carrying a trigger phrase.
pub fn event_triggers(news: &[NewsItem], region: Region) -> f64 {
    let hits = in_region(news, region, |n| n.region)
        .take(TRIGGER_HEADLINES)
        .filter(|n| {
            let title = n.title.to_lowercase();
            TRIGGER_PHRASES.iter().any(|p| title.contains(p))
        })
        .count();
    (hits as f64 / TRIGGER_SATURATION * 100.0).min(100.0)
}

/// Contribution of one market in [0,100].
pub fn market_volatility(m: &PredictionMarket) -> f64 {
    let uncertainty = 1.0 - (m.outcome_yes - 0.5).abs() * 2.0;
    let change_factor = (m.change_24h.abs() / 5.0).min(1.0);
    let volume_weight = (m.volume / 50_000.0).clamp(0.0, 1.0);
    (uncertainty * 0.6 + change_factor * 0.4) * volume_weight * 100.0
}

/// Mean market volatility over the region's markets, capped at 100.
pub fn prediction_volatility(markets: &[PredictionMarket], region: Region) -> f64 {
    let (sum, n) = in_region(markets, region, |m| m.region)
        .fold((0.0, 0usize), |(s, n), m| (s + market_volatility(m), n + 1));
    if n == 0 {
        return 0.0;
    }
    (sum / n as f64).min(100.0)
}

/// (oil, gold) sensitivity per region.
pub fn commodity_exposure(region: Region) -> (f64, f64) {
    match region {
        Region::Iran => (0.8, 0.2),
        Region::IsraelPalestine => (0.6, 0.4),
        Region::RussiaUkraine => (0.7, 0.3),
        Region::TaiwanStrait => (0.5, 0.5),
        Region::Korea => (0.5, 0.5),
    }
}

/// Region-weighted blend of the largest oil move and the gold move.
pub fn market_movement(quotes: &[Quote], region: Region) -> f64 {
    let oil = quotes
        .iter()
        .filter(|q| OIL_SYMBOLS.contains(&q.symbol.as_str()))
        .map(|q| q.change_percent.abs())
        .fold(0.0, f64::max);
    let gold = quotes
        .iter()
        .find(|q| q.symbol == GOLD_SYMBOL)
        .map(|q| q.change_percent.abs())
        .unwrap_or(0.0);
    let (w_oil, w_gold) = commodity_exposure(region);
    let score = oil / MAX_MOVE_PCT * 100.0 * w_oil + gold / MAX_MOVE_PCT * 100.0 * w_gold;
    score.min(100.0)
}

/// Search interest for the region, or `fallback` when there is no reading.
pub fn google_trends(readings: &[TrendReading], region: Region, fallback: f64) -> f64 {
    readings
        .iter()
        .find(|r| r.region == region)
        .map(|r| r.interest.clamp(0.0, 100.0))
        .unwrap_or(fallback)
}
