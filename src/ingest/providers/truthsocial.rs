// src/ingest/providers/truthsocial.rs
//! Truth Social posts from the public CNN archive (a single JSON array).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::{FetchCfg, TruthSocialCfg};
use crate::ingest::cache::TtlCache;
use crate::ingest::clean_text;
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{dedup_by_id, Connector, SocialPlatform, SocialPost};
use crate::relevance::RegionClassifier;

const MAX_TEXT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct ArchivePost {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    content: String,
    created_at: Option<String>,
    url: Option<String>,
    #[serde(default)]
    favourites_count: u64,
    #[serde(default)]
    reblogs_count: u64,
    #[serde(default)]
    replies_count: u64,
}

fn id_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the archive body; media-only and very short posts are skipped.
pub fn parse_archive(
    body: &str,
    cfg: &TruthSocialCfg,
    classifier: &RegionClassifier,
) -> Result<Vec<SocialPost>, FetchError> {
    let raw: Vec<ArchivePost> =
        serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("truthsocial: {e}")))?;

    let mut out = Vec::new();
    for p in raw.into_iter().take(cfg.max_posts) {
        let text = clean_text(&p.content, MAX_TEXT_CHARS);
        if text.chars().count() < cfg.min_chars {
            continue;
        }
        let Some(id) = id_string(&p.id) else {
            continue;
        };
        out.push(SocialPost {
            region: classifier.classify(&text),
            id,
            platform: SocialPlatform::TruthSocial,
            author: cfg.author.clone(),
            text,
            url: p.url.filter(|u| !u.is_empty()),
            created_at: p
                .created_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            likes: p.favourites_count,
            reposts: p.reblogs_count,
            replies: p.replies_count,
        });
    }
    Ok(dedup_by_id(out))
}

pub struct TruthSocialConnector {
    cfg: TruthSocialCfg,
    fetcher: RateLimitedFetcher,
    classifier: Arc<RegionClassifier>,
    cache: TtlCache<(), SocialPost>,
}

impl TruthSocialConnector {
    pub fn new(
        cfg: TruthSocialCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
        classifier: Arc<RegionClassifier>,
    ) -> Self {
        let fetcher = RateLimitedFetcher::new("truthsocial", transport, cfg.pacing().policy(fetch), rng);
        Self {
            cfg,
            fetcher,
            classifier,
            cache: TtlCache::new("truthsocial"),
        }
    }

    async fn refresh(&self) -> Result<Vec<SocialPost>, FetchError> {
        let body = self.fetcher.fetch(&self.cfg.archive_url, &[]).await?;
        parse_archive(&body, &self.cfg, &self.classifier)
    }
}

#[async_trait]
impl Connector<SocialPost> for TruthSocialConnector {
    fn name(&self) -> &'static str {
        "truthsocial"
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<SocialPost>>, FetchError> {
        self.cache
            .lookup_or_refresh((), self.cfg.pacing().ttl, force, || self.refresh())
            .await
            .into_result()
    }
}
