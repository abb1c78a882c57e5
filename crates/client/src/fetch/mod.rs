//! Polite HTTP fetch pipeline shared by every source adapter.
//!
//! ### Pipeline
//! - Token-bucket rate limiting (one limiter per client)
//! - robots.txt compliance gate with 24h rules caching
//! - Rotating identifying headers plus browser-like content negotiation
//! - Anti-block classification (403/429/503, content-type mismatch)
//! - Exponential backoff with jitter, honoring `Retry-After`
//! - Per-client request metrics
//!
//! All suspension points (limiter wait, backoff sleep, HTTP round trip)
//! observe the caller's cancellation token and return promptly when it
//! fires, discarding any remaining retry budget.

pub mod classify;
pub mod headers;
pub mod limiter;
pub mod metrics;
pub mod robots;

use bytes::Bytes;
use rand::Rng;
use reqwest::{Method, StatusCode, Url, header};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub use classify::{Classification, Expected, classify};
pub use headers::HeaderPool;
pub use limiter::RateLimiter;
pub use metrics::{ClientMetrics, MetricsSnapshot};
pub use robots::{PolitenessGuard, RobotsRules};

use titlescout_core::Error;

/// Upper bound on a server-provided Retry-After hint.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Configuration for one source client.
///
/// Immutable after construction; zero-valued fields are replaced with the
/// documented defaults by [`ClientConfig::normalized`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Steady outbound rate (default: 1.0).
    pub requests_per_second: f64,

    /// Per-request timeout (default: 15s).
    pub timeout: Duration,

    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,

    /// First backoff delay (default: 1s).
    pub backoff_initial: Duration,

    /// Backoff ceiling (default: 16s).
    pub backoff_max: Duration,

    /// Backoff growth factor (default: 2.0).
    pub backoff_multiplier: f64,

    /// Jitter added to every backoff sleep (default: 100–500ms).
    pub jitter_min: Duration,
    pub jitter_max: Duration,

    /// Administrative kill switch: a disabled client fails every fetch
    /// immediately without touching the network (default: true).
    pub enabled: bool,

    /// Whether to gate fetches on robots.txt (default: true).
    pub respect_robots: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 1.0,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_initial: Duration::from_secs(1),
            backoff_max: Duration::from_secs(16),
            backoff_multiplier: 2.0,
            jitter_min: Duration::from_millis(100),
            jitter_max: Duration::from_millis(500),
            enabled: true,
            respect_robots: true,
        }
    }
}

impl ClientConfig {
    /// Replace zero-valued fields with the documented defaults.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if self.requests_per_second <= 0.0 {
            self.requests_per_second = defaults.requests_per_second;
        }
        if self.timeout.is_zero() {
            self.timeout = defaults.timeout;
        }
        if self.backoff_initial.is_zero() {
            self.backoff_initial = defaults.backoff_initial;
        }
        if self.backoff_max.is_zero() {
            self.backoff_max = defaults.backoff_max;
        }
        if self.backoff_multiplier <= 1.0 {
            self.backoff_multiplier = defaults.backoff_multiplier;
        }
        if self.jitter_max < self.jitter_min {
            self.jitter_max = self.jitter_min;
        }
        self
    }

    /// Apply the application-wide robots toggle: `false` disables robots
    /// gating outright, `true` keeps this config's per-source setting (API
    /// hosts stay ungated even when the toggle is on).
    pub fn with_robots_toggle(mut self, respect_robots: bool) -> Self {
        self.respect_robots = self.respect_robots && respect_robots;
        self
    }
}

/// Response from a successful fetch.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// The URL requested.
    pub url: Url,
    /// The final URL after redirects.
    pub final_url: Url,
    /// HTTP status code.
    pub status: StatusCode,
    /// Content-Type header.
    pub content_type: Option<String>,
    /// Response body bytes.
    pub bytes: Bytes,
    /// Response headers.
    pub headers: header::HeaderMap,
    /// Time taken across all attempts, in milliseconds.
    pub fetch_ms: u64,
}

impl FetchResponse {
    /// Body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.bytes).map_err(|e| Error::Parse {
            field: "response body".into(),
            reason: e.to_string(),
        })
    }
}

/// Rate-limited, retrying, politeness-compliant HTTP client.
///
/// One instance per source; adapters share it across concurrent lookups.
/// The limiter is the only serialization point for request issuance — the
/// round trips themselves run fully in parallel.
pub struct SourceClient {
    http: reqwest::Client,
    config: ClientConfig,
    limiter: RateLimiter,
    guard: PolitenessGuard,
    headers: HeaderPool,
    metrics: ClientMetrics,
}

impl SourceClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let config = config.normalized();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(3))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            limiter: RateLimiter::new(config.requests_per_second),
            guard: PolitenessGuard::new(),
            headers: HeaderPool::new(),
            metrics: ClientMetrics::new(),
            config,
        })
    }

    /// Construct-or-die wrapper for startup-time wiring.
    ///
    /// The only panicking constructor in the crate; use [`SourceClient::new`]
    /// anywhere misconfiguration is recoverable.
    pub fn must_new(config: ClientConfig) -> Self {
        Self::new(config).expect("failed to construct source client")
    }

    /// GET a resource expected to be an HTML document.
    pub async fn get_html(&self, cancel: &CancellationToken, url: &str) -> Result<FetchResponse, Error> {
        self.request(cancel, Method::GET, url, None, Expected::Html).await
    }

    /// GET a resource expected to be JSON.
    pub async fn get_json(&self, cancel: &CancellationToken, url: &str) -> Result<FetchResponse, Error> {
        self.request(cancel, Method::GET, url, None, Expected::Json).await
    }

    /// Issue a request through the polite pipeline.
    ///
    /// Fails immediately — no network call, no retry budget — when the
    /// client is disabled or robots.txt disallows the path. Otherwise
    /// attempts up to `max_retries + 1` times, backing off with jitter
    /// between retryable failures, and returns either the first success or
    /// an error wrapping the attempt count and last cause.
    pub async fn request(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        body: Option<Bytes>,
        expected: Expected,
    ) -> Result<FetchResponse, Error> {
        if !self.config.enabled {
            return Err(Error::blocked("disabled"));
        }

        let url = Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{url}: {e}")))?;

        if self.config.respect_robots && !self.guard.allows(&url).await {
            tracing::warn!(%url, "robots.txt disallows path");
            return Err(Error::blocked("robots-disallowed"));
        }

        let start = Instant::now();
        let mut backoff = self.config.backoff_initial;
        let mut last_err = Error::Transport("no attempt completed".into());

        for attempt in 0..=self.config.max_retries {
            self.limiter.wait(cancel).await?;

            match self.attempt(cancel, &method, &url, &body, expected).await? {
                AttemptOutcome::Success(mut response) => {
                    self.metrics.record_success();
                    response.fetch_ms = start.elapsed().as_millis() as u64;
                    tracing::debug!(
                        url = %response.url,
                        status = %response.status,
                        attempt,
                        fetch_ms = response.fetch_ms,
                        bytes = response.bytes.len(),
                        "fetch succeeded"
                    );
                    return Ok(response);
                }
                AttemptOutcome::Retry { error, retry_after } => {
                    tracing::warn!(%url, attempt, error = %error, "attempt failed");
                    last_err = error;

                    if attempt < self.config.max_retries {
                        self.metrics.record_retry();
                        self.backoff_sleep(cancel, backoff, retry_after).await?;
                        backoff = Duration::from_secs_f64(backoff.as_secs_f64() * self.config.backoff_multiplier);
                    }
                }
            }
        }

        Err(Error::RetriesExhausted {
            attempts: self.config.max_retries + 1,
            last: Box::new(last_err),
        })
    }

    /// One wire attempt: rotate headers, send, classify.
    ///
    /// `Err` aborts the whole fetch (cancellation, redirect cap, fatal
    /// classification); `Ok(Retry { .. })` feeds the backoff loop.
    async fn attempt(
        &self,
        cancel: &CancellationToken,
        method: &Method,
        url: &Url,
        body: &Option<Bytes>,
        expected: Expected,
    ) -> Result<AttemptOutcome, Error> {
        let user_agent = self.headers.next_user_agent();
        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, expected_accept(expected))
            .header(header::ACCEPT_LANGUAGE, "zh-CN,zh;q=0.9,en;q=0.8")
            .header(header::CONNECTION, "keep-alive")
            .header("Upgrade-Insecure-Requests", "1");
        if let Some(body) = body {
            request = request.body(body.clone());
        }

        self.metrics.record_request();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            r = request.send() => r,
        };

        let response = match result {
            Ok(response) => response,
            // Exceeding the redirect cap means a loop or a chain we refuse
            // to follow; more attempts would walk the same chain again.
            Err(e) if e.is_redirect() => {
                return Err(Error::Transport(format!("redirect cap exceeded: {e}")));
            }
            Err(e) if e.is_timeout() => {
                self.metrics.record_timeout();
                return Ok(AttemptOutcome::Retry {
                    error: Error::Timeout(e.to_string()),
                    retry_after: None,
                });
            }
            Err(e) => {
                return Ok(AttemptOutcome::Retry {
                    error: Error::Transport(e.to_string()),
                    retry_after: None,
                });
            }
        };

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match classify(url.as_str(), status, content_type.as_deref(), retry_after, expected) {
            Classification::Success => {
                let final_url = response.url().clone();
                let headers = response.headers().clone();
                let bytes = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    b = response.bytes() => b.map_err(|e| Error::Transport(format!("failed to read body: {e}")))?,
                };
                Ok(AttemptOutcome::Success(FetchResponse {
                    url: url.clone(),
                    final_url,
                    status,
                    content_type,
                    bytes,
                    headers,
                    fetch_ms: 0,
                }))
            }
            Classification::RetryableBlock { status, reason, retry_after } => {
                self.metrics.record_blocked();
                Ok(AttemptOutcome::Retry {
                    error: Error::Blocked {
                        status: Some(status),
                        reason: reason.to_string(),
                        retry_after,
                    },
                    retry_after: retry_after.map(Duration::from_secs),
                })
            }
            Classification::RetryableHttp { status } => Ok(AttemptOutcome::Retry {
                error: Error::Http { status },
                retry_after: None,
            }),
            Classification::Fatal(error) => Err(error),
        }
    }

    /// Cancellable backoff sleep: `min(backoff, max) + jitter`, or the
    /// server's Retry-After hint (capped) when one was provided.
    async fn backoff_sleep(
        &self,
        cancel: &CancellationToken,
        backoff: Duration,
        retry_after: Option<Duration>,
    ) -> Result<(), Error> {
        let base = match retry_after {
            Some(hint) => hint.min(MAX_RETRY_AFTER),
            None => backoff.min(self.config.backoff_max),
        };
        let jitter = jitter_between(self.config.jitter_min, self.config.jitter_max);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(base + jitter) => Ok(()),
        }
    }

    /// Point-in-time copy of this client's metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

enum AttemptOutcome {
    Success(FetchResponse),
    Retry { error: Error, retry_after: Option<Duration> },
}

fn expected_accept(expected: Expected) -> &'static str {
    match expected {
        Expected::Html => "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        Expected::Json => "application/json",
        Expected::Any => "*/*",
    }
}

fn jitter_between(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let millis = rand::thread_rng().gen_range(min.as_millis() as u64..=max.as_millis() as u64);
    Duration::from_millis(millis)
}
