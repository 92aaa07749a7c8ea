//! Page fetching collaborator: trait, HTTP implementation, and retry logic.
//!
//! Browser automation is outside this crate; the pipeline only depends on a
//! capability that, given a URL, returns rendered page text or fails with a
//! transient/permanent error. That capability is the [`PageFetcher`] trait.
//!
//! # Architecture
//!
//! - [`PageFetcher`]: core trait, one async method
//! - [`HttpFetcher`]: `reqwest`-backed implementation with a request timeout
//! - [`RetryFetch`]: decorator that adds retry logic to any `PageFetcher`
//! - [`SearchProvider`] / [`HtmlSearch`]: ordered search hits for a query,
//!   obtained by fetching and parsing the engine's results page
//!
//! # Retry Strategy
//!
//! Only transient errors are retried:
//! - Exponential backoff starting at the configured base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::SearchConfig;
use crate::utils::parse_selector;
use rand::{rng, Rng};
use scraper::{Html, Selector};
use std::error::Error;
use std::time::{Duration, Instant};
use thiserror::Error as ThisError;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Why a fetch failed. Transient failures flow into the retry mechanism;
/// permanent ones are reported as-is.
#[derive(Debug, Clone, ThisError)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("http status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Transient errors are worth retrying; 429 and 5xx statuses count.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Capability to turn a URL into rendered page text.
pub trait PageFetcher {
    /// Fetch the final rendered text for `url`.
    async fn fetch_rendered(&self, url: &str) -> Result<String, FetchError>;
}

/// Plain HTTP implementation over [`reqwest::Client`].
///
/// Good enough for static and server-rendered pages; a headless-browser
/// implementation would slot in behind the same trait.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self, Box<dyn Error>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("uni_harvest/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_rendered(&self, url: &str) -> Result<String, FetchError> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Fetch returned non-success status");
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        debug!(bytes = body.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "Fetched page");
        Ok(body)
    }
}

/// Wrapper that adds backoff retry logic to any [`PageFetcher`] implementation.
///
/// The delay between retries follows:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
#[derive(Debug)]
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageFetcher,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl<T> PageFetcher for RetryFetch<T>
where
    T: PageFetcher,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch_rendered(&self, url: &str) -> Result<String, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.fetch_rendered(url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        warn!(error = %e, "Permanent fetch error; not retrying");
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch_rendered() exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "fetch_rendered() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// One hit from a search results page, in result order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
}

/// Capability to turn a query into an ordered list of result links.
pub trait SearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError>;
}

/// Search implementation that fetches the engine's HTML results page through
/// a [`PageFetcher`] and collects result anchors.
pub struct HtmlSearch<F> {
    fetcher: F,
    results_url: String,
    result_selector: Selector,
    title_selector: Selector,
}

impl<F> HtmlSearch<F>
where
    F: PageFetcher,
{
    pub fn new(fetcher: F, search: &SearchConfig) -> Result<Self, Box<dyn Error>> {
        Ok(Self {
            fetcher,
            results_url: search.results_url.clone(),
            result_selector: parse_selector(&search.result_selector)?,
            title_selector: parse_selector(&search.result_title_selector)?,
        })
    }

    /// Pull titled result anchors out of a rendered results page.
    ///
    /// Anchors without a title element are navigation chrome, not hits.
    fn parse_hits(&self, html: &str) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();
        for anchor in document.select(&self.result_selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if anchor.select(&self.title_selector).next().is_none() {
                continue;
            }
            hits.push(SearchHit { url: href.to_string() });
        }
        hits
    }
}

impl<F> SearchProvider for HtmlSearch<F>
where
    F: PageFetcher,
{
    #[instrument(level = "info", skip_all, fields(%query))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, FetchError> {
        let url = self
            .results_url
            .replace("{query}", &urlencoding::encode(query));
        let html = self.fetcher.fetch_rendered(&url).await?;
        let hits = self.parse_hits(&html);
        info!(count = hits.len(), "Parsed search hits");
        Ok(hits)
    }
}
