// src/ingest/providers/trends.rs
//! Search-interest readings per region, behind a pluggable provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{FetchCfg, TrendsCfg};
use crate::ingest::cache::{Served, TtlCache};
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{Connector, TrendReading};
use crate::region::Region;

pub const MAX_KEYWORDS: usize = 5;

#[async_trait]
pub trait TrendsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Average interest (0-100) across `keywords` at the latest point.
    async fn interest(&self, keywords: &[String]) -> Result<f64, FetchError>;
}

/// Used when no trends backend is configured.
pub struct DisabledTrends;

#[async_trait]
impl TrendsProvider for DisabledTrends {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn interest(&self, _keywords: &[String]) -> Result<f64, FetchError> {
        Err(FetchError::Disabled)
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    interest_over_time: Option<InterestOverTime>,
}

#[derive(Debug, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelinePoint>,
}

#[derive(Debug, Deserialize)]
struct TimelinePoint {
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    #[serde(default)]
    extracted_value: Value,
}

/// Mean of the latest timeline point, clamped to [0,100].
pub fn latest_average(body: &str) -> Result<f64, FetchError> {
    let resp: SerpResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("trends: {e}")))?;
    let last = resp
        .interest_over_time
        .and_then(|i| i.timeline_data.into_iter().last())
        .ok_or_else(|| FetchError::Decode("trends: empty timeline".into()))?;
    let vals: Vec<f64> = last
        .values
        .iter()
        .filter_map(|v| v.extracted_value.as_f64())
        .collect();
    if vals.is_empty() {
        return Err(FetchError::Decode("trends: no values".into()));
    }
    let avg = vals.iter().sum::<f64>() / vals.len() as f64;
    Ok(avg.clamp(0.0, 100.0))
}

pub struct SerpApiTrends {
    fetcher: RateLimitedFetcher,
    endpoint: String,
    api_key: String,
}

impl SerpApiTrends {
    pub fn new(
        cfg: &TrendsCfg,
        api_key: String,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            fetcher: RateLimitedFetcher::new("trends", transport, cfg.pacing().policy(fetch), rng),
            endpoint: cfg.endpoint.clone(),
            api_key,
        }
    }
}

#[async_trait]
impl TrendsProvider for SerpApiTrends {
    fn name(&self) -> &'static str {
        "serpapi"
    }

    async fn interest(&self, keywords: &[String]) -> Result<f64, FetchError> {
        let q = keywords.join(",");
        let params = [
            ("engine", "google_trends"),
            ("q", q.as_str()),
            ("date", "now 7-d"),
            ("data_type", "TIMESERIES"),
            ("api_key", self.api_key.as_str()),
        ];
        let body = self.fetcher.fetch(&self.endpoint, &params).await?;
        latest_average(&body)
    }
}

pub struct TrendsConnector {
    ttl: std::time::Duration,
    keywords: BTreeMap<Region, Vec<String>>,
    provider: Arc<dyn TrendsProvider>,
    cache: TtlCache<Region, TrendReading>,
}

impl TrendsConnector {
    pub fn new(cfg: &TrendsCfg, provider: Arc<dyn TrendsProvider>) -> Self {
        Self {
            ttl: cfg.pacing().ttl,
            keywords: cfg.keywords.clone(),
            provider,
            cache: TtlCache::new("trends"),
        }
    }

    /// SerpApi when a key is configured, otherwise disabled.
    pub fn from_config(
        cfg: &TrendsCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let provider: Arc<dyn TrendsProvider> = match cfg.serpapi_key.clone() {
            Some(key) => Arc::new(SerpApiTrends::new(cfg, key, fetch, transport, rng)),
            None => Arc::new(DisabledTrends),
        };
        Self::new(cfg, provider)
    }
}

#[async_trait]
impl Connector<TrendReading> for TrendsConnector {
    fn name(&self) -> &'static str {
        "trends"
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<TrendReading>>, FetchError> {
        let mut readings = Vec::new();
        let mut last_err = None;
        for region in Region::ALL {
            let Some(kws) = self.keywords.get(&region).filter(|k| !k.is_empty()) else {
                continue;
            };
            let kws: Vec<String> = kws.iter().take(MAX_KEYWORDS).cloned().collect();
            let lookup = self
                .cache
                .lookup_or_refresh(region, self.ttl, force, || async {
                    let interest = self.provider.interest(&kws).await?;
                    Ok(vec![TrendReading {
                        region,
                        keywords: kws.clone(),
                        interest,
                    }])
                })
                .await;
            if lookup.served == Served::Unavailable {
                if lookup.error == Some(FetchError::Disabled) {
                    tracing::debug!(target: "ingest", source = "trends", provider = self.provider.name(), "trends provider not configured");
                    return Err(FetchError::Disabled);
                }
                last_err = lookup.error;
                continue;
            }
            readings.extend(lookup.items.iter().cloned());
        }
        match (readings.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(Arc::new(readings)),
        }
    }
}
