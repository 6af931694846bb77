// src/ingest/providers/bluesky.rs
//! Bluesky public AppView: monitored account feeds plus one search per region.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

use super::{all_failed, fetch_each, Request};
use crate::config::{BlueskyCfg, FetchCfg};
use crate::ingest::cache::TtlCache;
use crate::ingest::fetcher::{FetchError, HttpTransport, RandomSource, RateLimitedFetcher};
use crate::ingest::types::{dedup_by_id, Connector, SocialPlatform, SocialPost};
use crate::relevance::RegionClassifier;

const MAX_TEXT_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    posts: Vec<PostView>,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    did: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    #[serde(default)]
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    author: Author,
    #[serde(default)]
    record: Record,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    repost_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Author {
    handle: String,
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    #[serde(default)]
    text: String,
    created_at: Option<String>,
}

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::Decode(format!("bluesky: {e}")))
}

fn to_post(view: PostView, classifier: &RegionClassifier) -> SocialPost {
    let rkey = view.uri.rsplit('/').next().unwrap_or_default();
    let url = (!view.author.handle.is_empty() && !rkey.is_empty() && view.uri.contains('/'))
        .then(|| format!("https://bsky.app/profile/{}/post/{}", view.author.handle, rkey));
    let text: String = view.record.text.chars().take(MAX_TEXT_CHARS).collect();
    let created_at = view
        .record
        .created_at
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));

    SocialPost {
        region: classifier.classify(&text),
        id: view.uri.clone(),
        platform: SocialPlatform::Bluesky,
        author: view
            .author
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("@{}", view.author.handle)),
        text,
        url,
        created_at,
        likes: view.like_count,
        reposts: view.repost_count,
        replies: view.reply_count,
    }
}

pub struct BlueskyConnector {
    cfg: BlueskyCfg,
    fetcher: Arc<RateLimitedFetcher>,
    classifier: Arc<RegionClassifier>,
    cache: TtlCache<(), SocialPost>,
}

impl BlueskyConnector {
    pub fn new(
        cfg: BlueskyCfg,
        fetch: &FetchCfg,
        transport: Arc<dyn HttpTransport>,
        rng: Arc<dyn RandomSource>,
        classifier: Arc<RegionClassifier>,
    ) -> Self {
        let fetcher = RateLimitedFetcher::new("bluesky", transport, cfg.pacing().policy(fetch), rng);
        Self {
            cfg,
            fetcher: Arc::new(fetcher),
            classifier,
            cache: TtlCache::new("bluesky"),
        }
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/{}", self.cfg.api_base.trim_end_matches('/'), method)
    }

    async fn refresh(&self) -> Result<Vec<SocialPost>, FetchError> {
        let mut views = Vec::new();
        let mut ok = 0usize;
        let mut last_err = None;

        // 1) resolve account handles to DIDs
        let resolves = self
            .cfg
            .accounts
            .iter()
            .map(|h| Request::get(h.clone(), self.xrpc("com.atproto.identity.resolveHandle")).param("handle", h))
            .collect();
        let mut feeds = Vec::new();
        for (handle, res) in fetch_each(&self.fetcher, resolves).await {
            match res.and_then(|b| decode::<ResolveResponse>(&b)) {
                Ok(ResolveResponse { did: Some(did) }) => feeds.push(
                    Request::get(handle, self.xrpc("app.bsky.feed.getAuthorFeed"))
                        .param("actor", did)
                        .param("limit", self.cfg.author_feed_limit),
                ),
                Ok(_) => tracing::debug!(target: "ingest", source = "bluesky", %handle, "handle did not resolve"),
                Err(e) => {
                    tracing::debug!(target: "ingest", source = "bluesky", %handle, error = %e, "resolve failed");
                    last_err = Some(e);
                }
            }
        }

        // 2) author feeds
        for (handle, res) in fetch_each(&self.fetcher, feeds).await {
            match res.and_then(|b| decode::<AuthorFeedResponse>(&b)) {
                Ok(r) => {
                    ok += 1;
                    views.extend(r.feed.into_iter().map(|f| f.post));
                }
                Err(e) => {
                    tracing::debug!(target: "ingest", source = "bluesky", %handle, error = %e, "author feed failed");
                    last_err = Some(e);
                }
            }
        }

        // 3) first search term per region
        let searches = self
            .cfg
            .search_terms
            .iter()
            .filter_map(|(region, terms)| terms.first().map(|t| (*region, t)))
            .map(|(region, term)| {
                Request::get(region, self.xrpc("app.bsky.feed.searchPosts"))
                    .param("q", term)
                    .param("limit", self.cfg.search_limit)
                    .param("sort", "latest")
            })
            .collect();
        for (region, res) in fetch_each(&self.fetcher, searches).await {
            match res.and_then(|b| decode::<SearchResponse>(&b)) {
                Ok(r) => {
                    ok += 1;
                    views.extend(r.posts);
                }
                Err(e) => {
                    tracing::debug!(target: "ingest", source = "bluesky", %region, error = %e, "search failed");
                    last_err = Some(e);
                }
            }
        }

        let posts = views
            .into_iter()
            .map(|v| to_post(v, &self.classifier))
            .collect();
        let mut posts = dedup_by_id(posts);
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all_failed(ok, last_err, posts)
    }
}

#[async_trait]
impl Connector<SocialPost> for BlueskyConnector {
    fn name(&self) -> &'static str {
        "bluesky"
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<SocialPost>>, FetchError> {
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

    #[test]
    fn post_view_maps_to_social_post() {
        let json = r#"{"posts":[{
            "uri":"at://did:plc:abc/app.bsky.feed.post/3kx",
            "author":{"handle":"osint.example","displayName":""},
            "record":{"text":"IDF strike in Gaza overnight","createdAt":"2025-06-10T12:00:00.000Z"},
            "likeCount":12,"repostCount":3
        }]}"#;
        let r: SearchResponse = decode(json).unwrap();
        let p = to_post(r.posts.into_iter().next().unwrap(), &RegionClassifier::builtin());
        assert_eq!(p.url.as_deref(), Some("https://bsky.app/profile/osint.example/post/3kx"));
        assert_eq!(p.author, "@osint.example");
        assert_eq!(p.region, Some(Region::IsraelPalestine));
        assert_eq!(p.engagement(), 15);
        assert_eq!(p.replies, 0);
        assert!(p.created_at.is_some());
    }

    #[test]
    fn long_text_is_capped() {
        let long = "a".repeat(900);
        let json = format!(
            r#"{{"feed":[{{"post":{{"uri":"at://x/y/z","author":{{"handle":"h"}},"record":{{"text":"{long}"}}}}}}]}}"#
        );
        let r: AuthorFeedResponse = decode(&json).unwrap();
        let p = to_post(r.feed.into_iter().next().unwrap().post, &RegionClassifier::builtin());
        assert_eq!(p.text.chars().count(), MAX_TEXT_CHARS);
        assert_eq!(p.region, None);
    }
}
