// src/ingest/providers/mod.rs
pub mod bluesky;
pub mod polymarket;
pub mod quotes;
pub mod rss_news;
pub mod trends;
pub mod truthsocial;

use std::sync::Arc;

use super::fetcher::{FetchError, RateLimitedFetcher};

/// One outbound GET, tagged with caller context `K`.
pub(crate) struct Request<K> {
    pub tag: K,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl<K> Request<K> {
    pub fn get(tag: K, url: impl Into<String>) -> Self {
        Self {
            tag,
            url: url.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, k: &str, v: impl ToString) -> Self {
        self.params.push((k.to_string(), v.to_string()));
        self
    }
}

/// Issue every request on its own task; the fetcher's semaphore bounds how
/// many are in flight. Results come back in request order; a panicked task
/// surfaces as a transport error for its request.
pub(crate) async fn fetch_each<K>(
    fetcher: &Arc<RateLimitedFetcher>,
    requests: Vec<Request<K>>,
) -> Vec<(K, Result<String, FetchError>)>
where
    K: Clone + Send + 'static,
{
    let mut handles = Vec::with_capacity(requests.len());
    for req in requests {
        let fetcher = fetcher.clone();
        let tag = req.tag.clone();
        let handle = tokio::spawn(async move {
            let params: Vec<(&str, &str)> = req
                .params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            fetcher.fetch(&req.url, &params).await
        });
        handles.push((tag, handle));
    }

    let mut out = Vec::with_capacity(handles.len());
    for (tag, handle) in handles {
        let res = match handle.await {
            Ok(r) => r,
            Err(e) => Err(FetchError::Transport(format!("fetch task failed: {e}"))),
        };
        out.push((tag, res));
    }
    out
}

/// Collapse per-request outcomes: `Err` only when every request failed.
pub(crate) fn all_failed<T>(ok: usize, last_err: Option<FetchError>, items: Vec<T>) -> Result<Vec<T>, FetchError> {
    match (ok, last_err) {
        (0, Some(e)) => Err(e),
        _ => Ok(items),
    }
}
