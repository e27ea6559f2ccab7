//! Source adapter trait, fetch errors, and the shared HTTP session.
//!
//! Every adapter reaches the network through an [`HttpSession`], which owns an
//! injected [`HttpTransport`], a per-source [`CircuitBreaker`] and a
//! [`RetryPolicy`]. Tests swap the transport for a scripted one so parsing and
//! retry behaviour can be checked without a network.

use super::circuit_breaker::CircuitBreaker;
use super::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Coarse failure category reported by batch runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    Network,
    Timeout,
    Parse,
    CircuitOpen,
    Panicked,
}

/// Structured error for one unit of fetch work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("malformed document: {0}")]
    Parse(String),

    #[error("circuit breaker open for {provider}")]
    CircuitOpen { provider: String },

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Network(_) | FetchError::HttpStatus { .. } => FailureKind::Network,
            FetchError::Timeout(_) => FailureKind::Timeout,
            FetchError::Parse(_) => FailureKind::Parse,
            FetchError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            FetchError::Panicked(_) => FailureKind::Panicked,
        }
    }

    /// Network-level failures that a retry may cure.
    pub fn is_transport(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        FetchError::Parse(msg.into())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// One external source. `Key` is a date for market-wide reports and a symbol
/// (or symbol batch) for per-symbol sources.
pub trait SourceAdapter: Send + Sync {
    type Key;
    type Payload;

    /// Human-readable name used in logs and failure reports.
    fn name(&self) -> &str;

    fn fetch(&self, key: &Self::Key) -> FetchResult<Self::Payload>;
}

/// Raw HTTP response: status plus undecoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking GET transport.
pub trait HttpTransport: Send + Sync {
    fn get(&self, url: &str) -> FetchResult<HttpResponse>;
}

/// Production transport: a blocking reqwest client with a cookie jar, so a
/// priming request establishes session cookies for the calls that follow.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> FetchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn get(&self, url: &str) -> FetchResult<HttpResponse> {
        let resp = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(format!("{url}: {e}"))
            } else {
                FetchError::Network(format!("{url}: {e}"))
            }
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .map_err(|e| FetchError::Network(format!("{url}: reading body: {e}")))?;
        Ok(HttpResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Knobs for building an [`HttpSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker_cooldown: Duration,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            breaker_cooldown: Duration::from_secs(30 * 60),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Shared, read-mostly HTTP session for one source.
///
/// Safe to share across worker threads behind an `Arc`.
pub struct HttpSession {
    name: String,
    transport: Arc<dyn HttpTransport>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSession")
            .field("name", &self.name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl HttpSession {
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
        config: &SessionConfig,
    ) -> Self {
        Self {
            name: name.into(),
            transport,
            breaker: CircuitBreaker::new(config.breaker_cooldown),
            retry: config.retry,
        }
    }

    /// Session backed by the reqwest transport.
    pub fn connect(name: impl Into<String>, config: &SessionConfig) -> FetchResult<Self> {
        let transport = ReqwestTransport::new(config.timeout, &config.user_agent)?;
        Ok(Self::new(name, Arc::new(transport), config))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn is_available(&self) -> bool {
        self.breaker.is_allowed()
    }

    /// GET with breaker checks and bounded retry on transport failures.
    pub fn get_bytes(&self, url: &str) -> FetchResult<Vec<u8>> {
        self.retry.run(FetchError::is_transport, |_| self.get_once(url))
    }

    /// GET and decode the body as UTF-8 (lossy).
    pub fn get_text(&self, url: &str) -> FetchResult<String> {
        let bytes = self.get_bytes(url)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// One attempt, no retry.
    ///
    /// Only site-wide signals reach the shared breaker: a 403 trips it at
    /// once and 429s count toward the threshold. A 5xx or transport error
    /// belongs to this URL alone and is left to the caller's retries.
    pub fn get_once(&self, url: &str) -> FetchResult<Vec<u8>> {
        if !self.breaker.is_allowed() {
            return Err(self.circuit_open());
        }

        debug!(source = %self.name, url, "GET");
        let resp = self.transport.get(url)?;

        match resp.status {
            403 => {
                warn!(source = %self.name, url, "403 Forbidden, tripping circuit breaker");
                self.breaker.trip();
                Err(self.circuit_open())
            }
            429 => {
                self.breaker.record_failure();
                Err(FetchError::HttpStatus {
                    status: 429,
                    url: url.to_string(),
                })
            }
            _ if !resp.is_success() => Err(FetchError::HttpStatus {
                status: resp.status,
                url: url.to_string(),
            }),
            _ => {
                self.breaker.record_success();
                Ok(resp.body)
            }
        }
    }

    fn circuit_open(&self) -> FetchError {
        FetchError::CircuitOpen {
            provider: self.name.clone(),
        }
    }
}
