// src/ingest/providers/polymarket.rs
//! Polymarket prediction markets (Gamma API) restricted to geopolitical questions.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use super::{all_failed, fetch_each, Request};
use crate::config::{FetchCfg, PolymarketCfg};
use crate::ingest::cache::TtlCache;
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{Connector, PredictionMarket};
use crate::relevance::RegionClassifier;

const MAX_QUESTION_CHARS: usize = 250;
const HISTORY_POINTS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    /// Everything under the geopolitics tag that is not blocklisted.
    GeopoliticsTag,
    /// Politics tag, kept only when the question is geopolitical.
    PoliticsTag,
    /// High-volume markets, kept only when geopolitical and region-classified.
    General,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GammaMarket {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    question: String,
    slug: Option<String>,
    #[serde(default)]
    outcome_prices: Value,
    #[serde(default)]
    volume: Value,
    #[serde(default)]
    liquidity: Value,
    end_date: Option<String>,
    #[serde(default)]
    clob_token_ids: Value,
}

#[derive(Debug, Deserialize)]
struct PriceHistory {
    #[serde(default)]
    history: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    #[serde(default)]
    p: Value,
}

fn num(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Gamma encodes arrays as JSON strings ("[\"0.42\", \"0.58\"]"); accept both.
fn json_list(v: &Value) -> Vec<Value> {
    match v {
        Value::Array(a) => a.clone(),
        Value::String(s) => serde_json::from_str::<Vec<Value>>(s).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// (yes, no) prices; missing prices default to 0.5, a lone price gets its complement.
pub fn parse_outcome_prices(v: &Value) -> (f64, f64) {
    let list = json_list(v);
    let price = |i: usize| list.get(i).and_then(num).unwrap_or(0.5);
    match list.len() {
        0 => (0.5, 0.5),
        1 => {
            let yes = price(0);
            (yes, 1.0 - yes)
        }
        _ => (price(0), price(1)),
    }
}

/// Change between first and last history point, in percentage points.
fn history_change(points: &[PricePoint]) -> f64 {
    let start = points.len().saturating_sub(HISTORY_POINTS);
    let pct: Vec<f64> = points[start..]
        .iter()
        .map(|pt| (num(&pt.p).unwrap_or(0.5) * 1000.0).round() / 10.0)
        .collect();
    match (pct.first(), pct.last()) {
        (Some(first), Some(last)) if pct.len() >= 2 => last - first,
        _ => 0.0,
    }
}

fn parse_market(raw: GammaMarket, classifier: &RegionClassifier) -> Option<(PredictionMarket, Option<String>)> {
    let question = raw.question.trim();
    if question.is_empty() || classifier.exclude(question) {
        return None;
    }
    let id = match &raw.id {
        Value::String(s) if !s.is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let (outcome_yes, outcome_no) = parse_outcome_prices(&raw.outcome_prices);
    let token = json_list(&raw.clob_token_ids)
        .first()
        .and_then(|t| t.as_str().map(str::to_string));

    let market = PredictionMarket {
        id,
        question: question.chars().take(MAX_QUESTION_CHARS).collect(),
        slug: raw.slug.unwrap_or_default(),
        outcome_yes,
        outcome_no,
        volume: num(&raw.volume).unwrap_or(0.0),
        liquidity: num(&raw.liquidity).unwrap_or(0.0),
        change_24h: 0.0,
        end_date: raw.end_date,
        region: classifier.classify(question),
    };
    Some((market, token))
}

/// Apply one strategy's acceptance rule to a Gamma page.
fn accept(
    strategy: Strategy,
    body: &str,
    classifier: &RegionClassifier,
) -> Result<Vec<(PredictionMarket, Option<String>)>, FetchError> {
    let raw: Vec<GammaMarket> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("polymarket: {e}")))?;
    Ok(raw
        .into_iter()
        .filter_map(|m| parse_market(m, classifier))
        .filter(|(m, _)| match strategy {
            Strategy::GeopoliticsTag => true,
            Strategy::PoliticsTag => classifier.is_geopolitical(&m.question),
            Strategy::General => classifier.is_geopolitical(&m.question) && m.region.is_some(),
        })
        .collect())
}

pub struct PolymarketConnector {
    cfg: PolymarketCfg,
    fetcher: Arc<RateLimitedFetcher>,
    classifier: Arc<RegionClassifier>,
    cache: TtlCache<(), PredictionMarket>,
}

impl PolymarketConnector {
    pub fn new(
        cfg: PolymarketCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
        classifier: Arc<RegionClassifier>,
    ) -> Self {
        let fetcher = RateLimitedFetcher::new("polymarket", transport, cfg.pacing().policy(fetch), rng);
        Self {
            cfg,
            fetcher: Arc::new(fetcher),
            classifier,
            cache: TtlCache::new("polymarket"),
        }
    }

    fn page(&self, strategy: Strategy) -> Request<Strategy> {
        let url = format!("{}/markets", self.cfg.gamma_base.trim_end_matches('/'));
        let req = Request::get(strategy, url)
            .param("closed", "false")
            .param("order", "volume")
            .param("ascending", "false");
        match strategy {
            Strategy::GeopoliticsTag => req.param("limit", self.cfg.page_limit).param("tag", "geopolitics"),
            Strategy::PoliticsTag => req.param("limit", self.cfg.page_limit).param("tag", "politics"),
            Strategy::General => req.param("limit", self.cfg.general_page_limit),
        }
    }

    async fn refresh(&self) -> Result<Vec<PredictionMarket>, FetchError> {
        let pages = vec![
            self.page(Strategy::GeopoliticsTag),
            self.page(Strategy::PoliticsTag),
            self.page(Strategy::General),
        ];

        let mut seen = HashSet::new();
        let mut markets = Vec::new();
        let mut ok = 0usize;
        let mut last_err = None;
        for (strategy, res) in fetch_each(&self.fetcher, pages).await {
            match res.and_then(|b| accept(strategy, &b, &self.classifier)) {
                Ok(found) => {
                    ok += 1;
                    for (m, token) in found {
                        if seen.insert(m.id.clone()) {
                            markets.push((m, token));
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = "polymarket", ?strategy, error = %e, "strategy failed");
                    last_err = Some(e);
                }
            }
        }

        markets.sort_by(|a, b| b.0.volume.total_cmp(&a.0.volume));
        self.fill_price_changes(&mut markets).await;

        let markets = markets.into_iter().map(|(m, _)| m).collect();
        all_failed(ok, last_err, markets)
    }

    /// `change_24h` from CLOB price history for the top markets by volume.
    /// Failures leave the change at zero.
    async fn fill_price_changes(&self, markets: &mut [(PredictionMarket, Option<String>)]) {
        let url = format!("{}/prices-history", self.cfg.clob_base.trim_end_matches('/'));
        let requests = markets
            .iter()
            .enumerate()
            .take(self.cfg.history_top_n)
            .filter_map(|(i, (_, token))| token.as_ref().map(|t| (i, t)))
            .map(|(i, token)| {
                Request::get(i, url.clone())
                    .param("market", token)
                    .param("interval", "1d")
                    .param("fidelity", 50)
            })
            .collect();

        for (i, res) in fetch_each(&self.fetcher, requests).await {
            match res.and_then(|b| {
                serde_json::from_str::<PriceHistory>(&b).map_err(|e| FetchError::Decode(e.to_string()))
            }) {
                Ok(h) => markets[i].0.change_24h = history_change(&h.history),
                Err(e) => {
                    tracing::debug!(target: "ingest", source = "polymarket", market = %markets[i].0.id, error = %e, "price history unavailable")
                }
            }
        }
    }
}

#[async_trait]
impl Connector<PredictionMarket> for PolymarketConnector {
    fn name(&self) -> &'static str {
        "polymarket"
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<PredictionMarket>>, FetchError> {
        self.cache
            .lookup_or_refresh((), self.cfg.pacing().ttl, force, || self.refresh())
            .await
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use serde_json::json;

    #[test]
    fn outcome_prices_accept_strings_arrays_and_gaps() {
        assert_eq!(parse_outcome_prices(&json!("[\"0.42\", \"0.58\"]")), (0.42, 0.58));
        assert_eq!(parse_outcome_prices(&json!([0.3, 0.7])), (0.3, 0.7));
        let (y, n) = parse_outcome_prices(&json!("[\"0.25\"]"));
        assert_eq!(y, 0.25);
        assert!((n - 0.75).abs() < 1e-12);
        assert_eq!(parse_outcome_prices(&json!("not json")), (0.5, 0.5));
        assert_eq!(parse_outcome_prices(&json!(["", "0.4"])), (0.5, 0.4));
    }

    #[test]
    fn strategies_apply_their_filters() {
        let c = RegionClassifier::builtin();
        let body = json!([
            {"id":"1","question":"Will Israel and Hamas agree to a Gaza ceasefire?","slug":"gaza","outcomePrices":"[\"0.5\",\"0.5\"]","volume":"120000","clobTokenIds":"[\"tok1\"]"},
            {"id":"2","question":"Will the Lakers win the NBA championship?","volume":999999},
            {"id":"3","question":"Will the U.S. strike Venezuela?","volume":"5000"},
            {"id":"4","question":"Will it rain in London tomorrow?","volume":"1"}
        ])
        .to_string();

        let geo = accept(Strategy::GeopoliticsTag, &body, &c).unwrap();
        assert_eq!(geo.iter().map(|(m, _)| m.id.as_str()).collect::<Vec<_>>(), ["1", "3", "4"]);
        assert_eq!(geo[0].0.region, Some(Region::IsraelPalestine));
        assert_eq!(geo[0].1.as_deref(), Some("tok1"));
        assert_eq!(geo[0].0.volume, 120000.0);

        let pol = accept(Strategy::PoliticsTag, &body, &c).unwrap();
        assert_eq!(pol.iter().map(|(m, _)| m.id.as_str()).collect::<Vec<_>>(), ["1", "3"]);

        // "U.S. strike Venezuela" is geopolitical but has no region
        let gen = accept(Strategy::General, &body, &c).unwrap();
        assert_eq!(gen.iter().map(|(m, _)| m.id.as_str()).collect::<Vec<_>>(), ["1"]);
    }

    #[test]
    fn history_change_is_last_minus_first_in_points() {
        let pts: Vec<PricePoint> = [0.40, 0.45, 0.52]
            .iter()
            .map(|p| PricePoint { p: json!(p) })
            .collect();
        assert!((history_change(&pts) - 12.0).abs() < 1e-9);
        assert_eq!(history_change(&pts[..1]), 0.0);
        assert_eq!(history_change(&[]), 0.0);
    }
}
