// src/ingest/providers/rss_news.rs
//! RSS news aggregator: many feeds, one cache entry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::sync::Arc;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use super::{all_failed, fetch_each, Request};
use crate::config::{FeedCfg, FetchCfg, NewsCfg};
use crate::ingest::cache::TtlCache;
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{dedup_by_id, Connector, NewsItem};
use crate::ingest::{clean_text, stable_id};
use crate::relevance::RegionClassifier;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}
#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}
#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn parse_rfc2822(ts: &str) -> Option<DateTime<Utc>> {
    let odt = OffsetDateTime::parse(ts.trim(), &Rfc2822).ok()?;
    DateTime::from_timestamp(odt.unix_timestamp(), 0)
}

/// HTML entities that are not valid XML and would abort deserialization.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

/// Parse one feed body into relevant, classified items.
pub fn parse_feed(
    feed: &FeedCfg,
    xml: &str,
    classifier: &RegionClassifier,
    entries: usize,
    max_chars: usize,
) -> Result<Vec<NewsItem>, FetchError> {
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))
        .map_err(|e| FetchError::Decode(format!("{}: {e}", feed.name)))?;

    let classification = if feed.source_id.contains("OSINT") {
        "OSINT"
    } else {
        "MILINT"
    };

    let mut out = Vec::new();
    for it in rss.channel.item.into_iter().take(entries) {
        let title = clean_text(it.title.as_deref().unwrap_or_default(), max_chars);
        let summary = clean_text(it.description.as_deref().unwrap_or_default(), max_chars);
        if title.is_empty() {
            continue;
        }
        let text = format!("{title} {summary}");
        if classifier.exclude(&text) || !classifier.is_relevant(&text) {
            continue;
        }

        let region = classifier.classify(&text);
        let id = it
            .guid
            .and_then(|g| g.value)
            .filter(|g| !g.trim().is_empty())
            .or_else(|| it.link.clone().filter(|l| !l.trim().is_empty()))
            .unwrap_or_else(|| stable_id(&[&feed.source_id, &title]));

        out.push(NewsItem {
            id,
            relevance: classifier.relevance_score(&text, region),
            title,
            summary,
            url: it.link,
            source: feed.name.clone(),
            classification: classification.to_string(),
            published_at: it.pub_date.as_deref().and_then(parse_rfc2822),
            region,
        });
    }
    Ok(out)
}

pub struct RssNewsAggregator {
    cfg: NewsCfg,
    fetcher: Arc<RateLimitedFetcher>,
    classifier: Arc<RegionClassifier>,
    cache: TtlCache<(), NewsItem>,
}

impl RssNewsAggregator {
    pub fn new(
        cfg: NewsCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
        classifier: Arc<RegionClassifier>,
    ) -> Self {
        let fetcher = RateLimitedFetcher::new("news", transport, cfg.pacing().policy(fetch), rng);
        Self {
            cfg,
            fetcher: Arc::new(fetcher),
            classifier,
            cache: TtlCache::new("news"),
        }
    }

    async fn refresh(&self) -> Result<Vec<NewsItem>, FetchError> {
        let requests = self
            .cfg
            .feeds
            .iter()
            .map(|f| Request::get(f.clone(), f.url.clone()))
            .collect();

        let mut items = Vec::new();
        let mut ok = 0usize;
        let mut last_err = None;
        for (feed, res) in fetch_each(&self.fetcher, requests).await {
            let parsed = res.and_then(|body| {
                parse_feed(
                    &feed,
                    &body,
                    &self.classifier,
                    self.cfg.entries_per_feed,
                    self.cfg.max_text_chars,
                )
            });
            match parsed {
                Ok(v) => {
                    ok += 1;
                    items.extend(v);
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = "news", feed = %feed.name, error = %e, "feed skipped");
                    last_err = Some(e);
                }
            }
        }

        let mut items = dedup_by_id(items);
        items.sort_by(|a, b| {
            b.relevance
                .total_cmp(&a.relevance)
                .then_with(|| b.published_at.cmp(&a.published_at))
        });
        tracing::debug!(target: "ingest", source = "news", feeds_ok = ok, items = items.len(), "news refreshed");
        all_failed(ok, last_err, items)
    }
}

#[async_trait]
impl Connector<NewsItem> for RssNewsAggregator {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<NewsItem>>, FetchError> {
        self.cache
            .lookup_or_refresh((), self.cfg.pacing().ttl, force, || self.refresh())
            .await
            .into_result()
    }
}
