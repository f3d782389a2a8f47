use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Endpoints, FetchConfig};
use crate::discovery::{self, FilingFilter, FilingHistory, Identifier};
use crate::error::FilingError;
use crate::model::{Cik, Company, FilingRef};

const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 60_000;

// ── Transport ──

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl From<TransportError> for FilingError {
    fn from(e: TransportError) -> Self {
        FilingError::Transport {
            status: e.status,
            message: e.message,
        }
    }
}

/// Retrieves a fully formed URL. Any HTTP response is `Ok`; only failures
/// to obtain one are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError>;
}

/// reqwest transport with the SEC-mandated User-Agent. Retries 429 and 5xx
/// with exponential backoff before handing the last response back.
pub struct HttpTransport {
    client: reqwest::Client,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(cfg: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout)
            .build()?;
        Ok(Self {
            client,
            max_retries: cfg.max_retries,
        })
    }

    async fn backoff(&self, url: &str, attempt: u32, reason: &str) {
        let backoff = backoff_delay(attempt);
        warn!(
            "{} on {} (attempt {}/{}), backing off {:.1}s",
            reason,
            url,
            attempt + 1,
            self.max_retries,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }
}

/// Exponential delay before retry `attempt`, capped at a minute.
fn backoff_delay(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let mut attempt = 0;
        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    if retryable && attempt < self.max_retries {
                        self.backoff(url, attempt, &format!("HTTP {}", status.as_u16())).await;
                        attempt += 1;
                        continue;
                    }
                    let body = resp.text().await.map_err(|e| TransportError {
                        status: Some(status.as_u16()),
                        message: format!("reading body: {e}"),
                    })?;
                    return Ok(TransportResponse {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    self.backoff(url, attempt, "network error").await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(TransportError {
                        status: e.status().map(|s| s.as_u16()),
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}

// ── Rate budget ──

/// One budget per run, shared by every company's discovery and fetch calls:
/// a cap on in-flight requests plus a minimum spacing between request starts.
pub struct RateBudget {
    permits: Semaphore,
    spacing: Duration,
    next_start: Mutex<Instant>,
}

impl RateBudget {
    pub fn new(max_in_flight: usize, spacing: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            spacing,
            next_start: Mutex::new(Instant::now()),
        }
    }

    /// Wait for a request slot. The permit is held until the response is in.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, TransportError> {
        let permit = self.permits.acquire().await.map_err(|_| TransportError {
            status: None,
            message: "rate budget closed".to_string(),
        })?;
        let start_at = {
            let mut next = self.next_start.lock().await;
            let start_at = (*next).max(Instant::now());
            *next = start_at + self.spacing;
            start_at
        };
        tokio::time::sleep_until(start_at).await;
        Ok(permit)
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

// ── Seen URLs ──

/// URLs already stored or claimed during this run. Loaded once at run start;
/// `claim` is the only mutation.
#[derive(Debug, Default)]
pub struct SeenUrls {
    urls: RwLock<HashSet<String>>,
}

impl SeenUrls {
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        Self {
            urls: RwLock::new(urls.into_iter().collect()),
        }
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    /// Mark `url` as taken. False when it was already seen.
    pub fn claim(&self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        self.urls
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.urls.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Coordinator ──

/// What discovery found for one company.
#[derive(Debug, Clone)]
pub struct Discovered {
    pub company: Company,
    pub filings: Vec<FilingRef>,
}

/// Discovery and document retrieval under one rate budget and seen-URL cache.
pub struct Coordinator {
    transport: Arc<dyn Transport>,
    budget: RateBudget,
    seen: SeenUrls,
    endpoints: Endpoints,
}

impl Coordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        cfg: &FetchConfig,
        endpoints: Endpoints,
        seen: SeenUrls,
    ) -> Self {
        Self {
            transport,
            budget: RateBudget::new(cfg.max_in_flight, cfg.min_spacing),
            seen,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn seen(&self) -> &SeenUrls {
        &self.seen
    }

    /// Budgeted GET that treats any non-2xx status as a transport failure.
    async fn get_ok(&self, url: &str) -> Result<String, TransportError> {
        let _permit = self.budget.acquire().await?;
        Ok(self.send(url).await?.body)
    }

    async fn send(&self, url: &str) -> Result<TransportResponse, TransportError> {
        let resp = self.transport.get(url).await?;
        if !(200..300).contains(&resp.status) {
            return Err(TransportError {
                status: Some(resp.status),
                message: format!("{url} returned HTTP {}", resp.status),
            });
        }
        Ok(resp)
    }

    /// Identifier → CIK. Tickers go through the published ticker map.
    pub async fn resolve(&self, raw: &str) -> Result<Cik, FilingError> {
        match Identifier::parse(raw)? {
            Identifier::Cik(cik) => Ok(cik),
            Identifier::Ticker(ticker) => {
                let json = self
                    .get_ok(&self.endpoints.tickers_url)
                    .await
                    .map_err(|e| FilingError::Discovery {
                        identifier: ticker.clone(),
                        message: format!("ticker lookup failed: {e}"),
                    })?;
                discovery::lookup_ticker(&json, &ticker)?.ok_or_else(|| FilingError::Discovery {
                    identifier: ticker.clone(),
                    message: "ticker not found".to_string(),
                })
            }
        }
    }

    /// Fetch and decode the company's full filing history.
    pub async fn history(&self, cik: &Cik) -> Result<FilingHistory, FilingError> {
        let url = self.endpoints.submissions_url(cik);
        let json = self.get_ok(&url).await.map_err(|e| FilingError::Discovery {
            identifier: cik.to_string(),
            message: e.to_string(),
        })?;
        discovery::parse_submissions(cik, &json)
    }

    /// Resolve, fetch history, and select the filings the filter asks for.
    pub async fn discover(&self, identifier: &str, filter: &FilingFilter) -> Result<Discovered, FilingError> {
        let cik = self.resolve(identifier).await?;
        let history = self.history(&cik).await?;
        let filings: Vec<FilingRef> = history.select(filter).cloned().collect();

        if filings.is_empty() && history.has_foreign_issuer_forms() {
            info!(
                cik = %cik,
                requested = ?filter.form_types,
                "no matching filings; company files as a foreign private issuer (20-F/6-K/40-F)"
            );
        }
        info!(
            cik = %cik,
            company = %history.company.name,
            history = history.filings.len(),
            selected = filings.len(),
            "discovery complete"
        );
        Ok(Discovered {
            company: history.company,
            filings,
        })
    }

    pub fn document_url(&self, filing: &FilingRef) -> String {
        filing.document_url(&self.endpoints.archives_url)
    }

    /// First dedup level. False means the URL was stored or claimed already.
    pub fn claim(&self, url: &str) -> bool {
        let fresh = self.seen.claim(url);
        if !fresh {
            debug!(url, "already seen, skipping fetch");
        }
        fresh
    }

    /// Retrieve one filing document. `Ok(None)` when the run was cancelled
    /// before a request slot was granted.
    pub async fn fetch(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<TransportResponse>, FilingError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            permit = self.budget.acquire() => permit?,
        };
        Ok(Some(self.send(url).await?))
    }
}

// ── Test transport ──
