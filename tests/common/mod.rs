// tests/common/mod.rs
//
// Shared fakes: in-memory connectors for engine tests and a URL-routed HTTP
// transport for connector tests. Nothing here touches the network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hotspot_monitor::ingest::fetcher::{FetchError, HttpResponse, HttpTransport, TransportError};
use hotspot_monitor::ingest::types::{
    Connector, NewsItem, PredictionMarket, SocialPlatform, SocialPost, Tagged,
};
use hotspot_monitor::Region;

/* ----------------------------
Connectors
---------------------------- */

/// Serves a fixed item set; can be switched to failing at any time.
pub struct FakeConnector<T> {
    name: &'static str,
    items: Arc<Vec<T>>,
    failing: AtomicBool,
    pub calls: AtomicUsize,
    pub forced: AtomicUsize,
}

impl<T> FakeConnector<T> {
    pub fn new(name: &'static str, items: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            name,
            items: Arc::new(items),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            forced: AtomicUsize::new(0),
        })
    }

    pub fn failing(name: &'static str) -> Arc<Self> {
        let c = Self::new(name, Vec::new());
        c.set_failing(true);
        c
    }

    pub fn set_failing(&self, on: bool) {
        self.failing.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T> Connector<T> for FakeConnector<T>
where
    T: Tagged + Clone + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_all(&self, force: bool) -> Result<Arc<Vec<T>>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if force {
            self.forced.fetch_add(1, Ordering::SeqCst);
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Status(500));
        }
        Ok(self.items.clone())
    }
}

pub fn news(id: &str, title: &str, region: Option<Region>, relevance: f64) -> NewsItem {
    NewsItem {
        id: id.into(),
        title: title.into(),
        summary: String::new(),
        url: None,
        source: "fake".into(),
        classification: "OSINT".into(),
        published_at: None,
        region,
        relevance,
    }
}

pub fn post(id: &str, region: Option<Region>, likes: u64, reposts: u64) -> SocialPost {
    SocialPost {
        id: id.into(),
        platform: SocialPlatform::Bluesky,
        author: "@osint".into(),
        text: "reports of troops on the move".into(),
        url: None,
        created_at: None,
        likes,
        reposts,
        replies: 0,
        region,
    }
}

pub fn market(id: &str, yes: f64, volume: f64, region: Option<Region>) -> PredictionMarket {
    PredictionMarket {
        id: id.into(),
        question: format!("market {id}"),
        slug: id.into(),
        outcome_yes: yes,
        outcome_no: 1.0 - yes,
        volume,
        liquidity: 0.0,
        change_24h: 0.0,
        end_date: None,
        region,
    }
}

/* ----------------------------
HTTP transport
---------------------------- */

/// Answers by exact URL. Each URL has a queue of responses; the last one
/// repeats once the queue is drained. Unknown URLs get a 404.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Mutex<HashMap<String, Vec<Result<HttpResponse, TransportError>>>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl RoutedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, steps: Vec<Result<HttpResponse, TransportError>>) {
        self.routes.lock().unwrap().insert(url.to_string(), steps);
    }

    pub fn hits(&self, url: &str) -> usize {
        self.hits.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }
}

pub fn ok(body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: 200,
        body: body.to_string(),
    })
}

pub fn status(code: u16) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse {
        status: code,
        body: String::new(),
    })
}

#[async_trait]
impl HttpTransport for RoutedTransport {
    async fn get(
        &self,
        url: &str,
        _params: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        *self.hits.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(steps) if steps.len() > 1 => steps.remove(0),
            Some(steps) if !steps.is_empty() => steps[0].clone(),
            _ => status(404),
        }
    }
}
