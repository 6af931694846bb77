// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::fetcher::FetchError;
use crate::region::Region;

/// Minimal capability shared by every item variant.
pub trait Tagged {
    fn id(&self) -> &str;
    fn region(&self) -> Option<Region>;
    fn text(&self) -> String;
}

/// Normalized, region-tagged items from one upstream.
///
/// `fetch_all` returns `Err` only when the connector has nothing at all to
/// offer (refresh failed and no cached entry); a stale entry is `Ok`.
#[async_trait]
pub trait Connector<T>: Send + Sync
where
    T: Tagged + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str;

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<T>>, FetchError>;

    async fn fetch_by_region(&self, region: Region) -> Result<Vec<T>, FetchError> {
        let all = self.fetch_all(false).await?;
        Ok(all
            .iter()
            .filter(|i| i.region() == Some(region))
            .cloned()
            .collect())
    }
}

/// Keep the first occurrence of every id, preserving order.
pub fn dedup_by_id<T: Tagged>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|i| seen.insert(i.id().to_string()))
        .collect()
}

/* ----------------------------
News
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub url: Option<String>,
    /// Feed display name, e.g. "BBC World".
    pub source: String,
    /// "OSINT" or "MILINT", from the feed's source id.
    pub classification: String,
    pub published_at: Option<DateTime<Utc>>,
    pub region: Option<Region>,
    pub relevance: f64,
}

impl Tagged for NewsItem {
    fn id(&self) -> &str {
        &self.id
    }
    fn region(&self) -> Option<Region> {
        self.region
    }
    fn text(&self) -> String {
        format!("{} {}", self.title, self.summary)
    }
}

/* ----------------------------
Social
---------------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Bluesky,
    TruthSocial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub platform: SocialPlatform,
    pub author: String,
    pub text: String,
    pub url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub likes: u64,
    pub reposts: u64,
    pub replies: u64,
    pub region: Option<Region>,
}

impl SocialPost {
    pub fn engagement(&self) -> u64 {
        self.likes + self.reposts
    }
}

impl Tagged for SocialPost {
    fn id(&self) -> &str {
        &self.id
    }
    fn region(&self) -> Option<Region> {
        self.region
    }
    fn text(&self) -> String {
        self.text.clone()
    }
}

/* ----------------------------
Prediction markets
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMarket {
    pub id: String,
    pub question: String,
    pub slug: String,
    /// Probability of "yes" in [0,1].
    pub outcome_yes: f64,
    pub outcome_no: f64,
    pub volume: f64,
    pub liquidity: f64,
    /// Change of the yes price over 24h, in percentage points.
    pub change_24h: f64,
    pub end_date: Option<String>,
    pub region: Option<Region>,
}

impl PredictionMarket {
    pub fn url(&self) -> String {
        format!("https://polymarket.com/event/{}", self.slug)
    }
}

impl Tagged for PredictionMarket {
    fn id(&self) -> &str {
        &self.id
    }
    fn region(&self) -> Option<Region> {
        self.region
    }
    fn text(&self) -> String {
        self.question.clone()
    }
}

/* ----------------------------
Quotes (commodities, defense stocks)
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub previous_close: f64,
    /// Recent hourly closes, oldest first.
    pub history: Vec<f64>,
    pub updated_at: DateTime<Utc>,
    /// Produced by the degraded-mode provider, not the upstream.
    #[serde(default)]
    pub synthetic: bool,
}

impl Tagged for Quote {
    fn id(&self) -> &str {
        &self.symbol
    }
    fn region(&self) -> Option<Region> {
        None
    }
    fn text(&self) -> String {
        self.name.clone()
    }
}

/* ----------------------------
Search trends
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub region: Region,
    pub keywords: Vec<String>,
    /// Average interest index in [0,100].
    pub interest: f64,
}

impl Tagged for TrendReading {
    fn id(&self) -> &str {
        self.region.id()
    }
    fn region(&self) -> Option<Region> {
        Some(self.region)
    }
    fn text(&self) -> String {
        self.keywords.join(" ")
    }
}
