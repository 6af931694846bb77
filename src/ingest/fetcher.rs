// src/ingest/fetcher.rs
//! Rate-limited HTTP fetcher shared by every connector.
//!
//! One `RateLimitedFetcher` per upstream: a counting semaphore caps in-flight
//! requests, each attempt is preceded by `base_delay + U(0, jitter)`, and
//! 429/503/timeouts are retried with backoff. Everything else fails fast.

use async_trait::async_trait;
use metrics::counter;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("rate limited (HTTP {status}) after {attempts} attempts")]
    RateLimited { status: u16, attempts: u32 },
    #[error("timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("upstream returned HTTP {0}")]
    Status(u16),
    #[error("transport: {0}")]
    Transport(String),
    #[error("malformed payload: {0}")]
    Decode(String),
    #[error("provider not configured")]
    Disabled,
    #[error("fetcher closed")]
    Closed,
}

impl FetchError {
    /// True for failures that a later tick may not see again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Timeout { .. } | FetchError::Transport(_)
        )
    }
}

/* ----------------------------
Transport seam
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Io(String),
}

/// One GET round-trip. Implemented by reqwest in production and by scripted
/// fakes in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()?;
        Ok(Self { client })
    }
}

fn map_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Io(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .timeout(timeout)
            .send()
            .await
            .map_err(map_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(map_reqwest)?;
        Ok(HttpResponse { status, body })
    }
}

/* ----------------------------
Randomness seam
---------------------------- */

pub trait RandomSource: Send + Sync {
    /// Uniform sample in `[lo, hi)`; returns `lo` when the range is empty.
    fn uniform(&self, lo: f64, hi: f64) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        rand::rng().random_range(lo..hi)
    }
}

/// Deterministic source: always returns the same fraction of the range.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn uniform(&self, lo: f64, hi: f64) -> f64 {
        if hi <= lo {
            return lo;
        }
        lo + (hi - lo) * self.0.clamp(0.0, 1.0)
    }
}

/* ----------------------------
Fetcher
---------------------------- */

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub max_concurrent: usize,
    pub base_delay: Duration,
    pub jitter: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
    /// Pause after a timeout or transport error before the next attempt.
    pub timeout_pause: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            base_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(300),
            max_attempts: 3,
            timeout: Duration::from_secs(15),
            timeout_pause: Duration::from_secs(1),
        }
    }
}

pub struct RateLimitedFetcher {
    name: &'static str,
    transport: Arc<dyn HttpTransport>,
    permits: Semaphore,
    policy: FetchPolicy,
    rng: Arc<dyn RandomSource>,
}

enum Attempt {
    Retry(FetchError, Duration),
    Fail(FetchError),
}

impl RateLimitedFetcher {
    pub fn new(
        name: &'static str,
        transport: Arc<dyn HttpTransport>,
        policy: FetchPolicy,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        let permits = Semaphore::new(policy.max_concurrent.max(1));
        Self {
            name,
            transport,
            permits,
            policy,
            rng,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// GET `endpoint` with query `params`, returning the body of the first 2xx.
    /// The concurrency slot is held across retries of one logical fetch.
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, FetchError> {
        let _permit = self.permits.acquire().await.map_err(|_| FetchError::Closed)?;
        let attempts = self.policy.max_attempts.max(1);

        let mut attempt: u32 = 0;
        loop {
            self.pace().await;
            counter!("fetch_requests_total", "source" => self.name).increment(1);

            let outcome = match self.transport.get(endpoint, params, self.policy.timeout).await {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp.body),
                Ok(resp) if resp.status == 429 || resp.status == 503 => {
                    let backoff = 2f64.powi(attempt as i32) + self.rng.uniform(0.0, 1.0);
                    Attempt::Retry(
                        FetchError::RateLimited {
                            status: resp.status,
                            attempts: attempt + 1,
                        },
                        Duration::from_secs_f64(backoff),
                    )
                }
                Ok(resp) => Attempt::Fail(FetchError::Status(resp.status)),
                Err(TransportError::Timeout) => Attempt::Retry(
                    FetchError::Timeout {
                        attempts: attempt + 1,
                    },
                    self.policy.timeout_pause,
                ),
                Err(TransportError::Io(msg)) => {
                    Attempt::Retry(FetchError::Transport(msg), self.policy.timeout_pause)
                }
            };

            attempt += 1;
            match outcome {
                Attempt::Fail(err) => return Err(self.give_up(endpoint, err)),
                Attempt::Retry(err, _) if attempt >= attempts => {
                    return Err(self.give_up(endpoint, err))
                }
                Attempt::Retry(err, wait) => {
                    counter!("fetch_retries_total", "source" => self.name).increment(1);
                    tracing::debug!(
                        target: "fetch",
                        source = self.name,
                        attempt,
                        of = attempts,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// `fetch` + JSON decode. A body that does not decode is a permanent failure.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let body = self.fetch(endpoint, params).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn pace(&self) {
        let base = self.policy.base_delay.as_secs_f64();
        let jitter = self.rng.uniform(0.0, self.policy.jitter.as_secs_f64());
        let d = Duration::from_secs_f64(base + jitter);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }

    fn give_up(&self, endpoint: &str, err: FetchError) -> FetchError {
        counter!("fetch_errors_total", "source" => self.name).increment(1);
        tracing::warn!(target: "fetch", source = self.name, endpoint, error = %err, "fetch failed");
        err
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted transport for unit and integration tests.
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
        pub calls: AtomicUsize,
    }

    impl ScriptedTransport {
        pub fn new(steps: Vec<Result<HttpResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(steps.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
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
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            _url: &str,
            _params: &[(&str, &str)],
            _timeout: Duration,
        ) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| status(500))
        }
    }
}
