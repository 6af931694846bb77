// src/ingest/providers/quotes.rs
//! Yahoo chart quotes, cached per symbol. Used for commodities (market
//! movement) and the read-only defense-stock board.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::{fetch_each, Request};
use crate::config::{FetchCfg, QuotesCfg, SymbolCfg};
use crate::ingest::cache::{Served, TtlCache};
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{Connector, Quote};

const HISTORY_POINTS: usize = 24;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Parse one chart body into a quote for `sym`.
pub fn parse_chart(sym: &SymbolCfg, body: &str) -> Result<Quote, FetchError> {
    let resp: ChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("{}: {e}", sym.symbol)))?;
    let result = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| FetchError::Decode(format!("{}: empty chart result", sym.symbol)))?;

    let price = result
        .meta
        .regular_market_price
        .ok_or_else(|| FetchError::Decode(format!("{}: no market price", sym.symbol)))?;
    let prev = result
        .meta
        .previous_close
        .or(result.meta.chart_previous_close)
        .unwrap_or(0.0);
    let (change, pct) = if prev > 0.0 {
        let c = price - prev;
        (c, c / prev * 100.0)
    } else {
        (0.0, 0.0)
    };

    let closes: Vec<f64> = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close.into_iter().flatten().collect())
        .unwrap_or_default();
    let history = closes[closes.len().saturating_sub(HISTORY_POINTS)..].to_vec();

    Ok(Quote {
        symbol: sym.symbol.clone(),
        name: sym.name.clone(),
        price: round2(price),
        change: round2(change),
        change_percent: round2(pct),
        previous_close: prev,
        history,
        updated_at: Utc::now(),
        synthetic: false,
    })
}

pub struct QuoteConnector {
    name: &'static str,
    cfg: QuotesCfg,
    fetcher: Arc<RateLimitedFetcher>,
    cache: TtlCache<String, Quote>,
}

impl QuoteConnector {
    pub fn new(
        name: &'static str,
        cfg: QuotesCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let fetcher = RateLimitedFetcher::new(name, transport, cfg.pacing().policy(fetch), rng);
        Self {
            name,
            cfg,
            fetcher: Arc::new(fetcher),
            cache: TtlCache::new(name),
        }
    }

    fn chart_request(&self, sym: &SymbolCfg) -> Request<SymbolCfg> {
        let url = format!("{}/{}", self.cfg.chart_base.trim_end_matches('/'), sym.symbol);
        Request::get(sym.clone(), url)
            .param("interval", "1h")
            .param("range", "5d")
    }

    async fn fetch_one(&self, sym: &SymbolCfg) -> Result<Vec<Quote>, FetchError> {
        let req = self.chart_request(sym);
        let mut res = fetch_each(&self.fetcher, vec![req]).await;
        match res.pop() {
            Some((s, Ok(body))) => parse_chart(&s, &body).map(|q| vec![q]),
            Some((_, Err(e))) => Err(e),
            None => Err(FetchError::Closed),
        }
    }
}

#[async_trait]
impl Connector<Quote> for QuoteConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    /// Stale symbols are fetched concurrently, then every symbol goes through
    /// its own cache entry. `Err` only when no symbol has any data.
    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<Quote>>, FetchError> {
        let ttl = self.cfg.pacing().ttl;

        let mut stale = Vec::new();
        for sym in &self.cfg.symbols {
            if force || !self.cache.is_fresh(&sym.symbol, ttl).await {
                stale.push(self.chart_request(sym));
            }
        }
        let mut fetched: HashMap<String, Result<Vec<Quote>, FetchError>> = fetch_each(&self.fetcher, stale)
            .await
            .into_iter()
            .map(|(sym, res)| {
                let parsed = res.and_then(|b| parse_chart(&sym, &b).map(|q| vec![q]));
                (sym.symbol, parsed)
            })
            .collect();

        let mut quotes = Vec::with_capacity(self.cfg.symbols.len());
        let mut last_err = None;
        for sym in &self.cfg.symbols {
            let pre = fetched.remove(&sym.symbol);
            let lookup = self
                .cache
                .lookup_or_refresh(sym.symbol.clone(), ttl, force, move || async move {
                    match pre {
                        Some(r) => r,
                        // entry expired between the freshness check and now
                        None => self.fetch_one(sym).await,
                    }
                })
                .await;
            if lookup.served == Served::Unavailable {
                last_err = lookup.error;
                continue;
            }
            quotes.extend(lookup.items.iter().cloned());
        }

        match (quotes.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(Arc::new(quotes)),
        }
    }
}
