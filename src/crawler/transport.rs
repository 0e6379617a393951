//! Raw HTTP transport
//!
//! The transport performs exactly one GET per call: no redirect following, no
//! retries, and no status interpretation. Redirects, retries and policy checks
//! belong to the fetch engine.

use crate::config::UserAgentConfig;
use crate::url::{is_public_ip, Resolver, SystemResolver};
use async_trait::async_trait;
use hyper::client::connect::dns::Name;
use reqwest::dns::{Addrs, Resolve, Resolving};
use reqwest::header::{HeaderMap, LOCATION, RETRY_AFTER};
use reqwest::{redirect::Policy, Client};
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// A complete response from a single request
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Decoded response body
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, ignoring values that are not valid header text
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Returns the `Location` header, if present and valid text
    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    /// Parses a delay-seconds `Retry-After` header
    ///
    /// HTTP-date values are not interpreted and yield `None`.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}

/// Classified network-level failure of a single request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection reset: {0}")]
    ConnectionReset(String),

    #[error("DNS resolution failed: {0}")]
    Dns(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns true for failures that may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Connect(_) | Self::ConnectionReset(_)
        )
    }
}

/// Performs single HTTP GET requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues one GET for `url` bounded by `timeout`
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Builds a transport whose connections only reach public addresses
    pub fn new(user_agent: &UserAgentConfig) -> Result<Self, reqwest::Error> {
        let resolver = GuardedDnsResolver::new(Arc::new(SystemResolver));
        Ok(Self {
            client: build_http_client(user_agent, Some(resolver))?,
        })
    }

    /// Wraps an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are disabled so the fetch engine can re-validate every hop. When
/// `resolver` is given, name resolution goes through it.
///
/// # Example
///
/// ```no_run
/// use polite_crawler::config::UserAgentConfig;
/// use polite_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), None).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    resolver: Option<GuardedDnsResolver>,
) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.header_value())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none()) // Handle redirects manually
        .gzip(true)
        .brotli(true);

    if let Some(resolver) = resolver {
        builder = builder.dns_resolver(Arc::new(resolver));
    }

    builder.build()
}

/// Maps a reqwest error onto the transport taxonomy
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout;
    }

    let message = err.to_string();

    if source_chain_has(err, |e| e.is::<RefusedAddress>())
        || source_chain_has(err, |e| e.to_string().contains("dns error"))
    {
        return TransportError::Dns(message);
    }

    if source_chain_has(err, |e| {
        e.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::ConnectionReset)
    }) {
        return TransportError::ConnectionReset(message);
    }

    if err.is_connect() {
        return TransportError::Connect(message);
    }

    if err.is_decode() || err.is_body() {
        return TransportError::Malformed(message);
    }

    TransportError::Other(message)
}

fn source_chain_has(
    err: &reqwest::Error,
    predicate: impl Fn(&(dyn StdError + 'static)) -> bool,
) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if predicate(e) {
            return true;
        }
        source = e.source();
    }
    false
}

/// Error raised when a name resolves into non-public address space
#[derive(Debug, Error)]
#[error("{host} resolves to non-public address {addr}")]
pub struct RefusedAddress {
    host: String,
    addr: std::net::IpAddr,
}

type BoxError = Box<dyn StdError + Send + Sync>;

/// DNS resolver for reqwest that refuses non-public answers
///
/// The safety guard checks a name before the request; this resolver checks the
/// answer the connection actually uses, so a rebinding name cannot slip a
/// private address in between the two lookups.
#[derive(Clone)]
pub struct GuardedDnsResolver {
    inner: Arc<dyn Resolver>,
}

impl GuardedDnsResolver {
    pub fn new(inner: Arc<dyn Resolver>) -> Self {
        Self { inner }
    }
}

impl Resolve for GuardedDnsResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let host = name.as_str().to_string();
            // The connector fills in the real port afterwards
            let ips = inner
                .resolve(&host, 0)
                .await
                .map_err(|e| Box::new(e) as BoxError)?;

            if let Some(addr) = ips.iter().copied().find(|ip| !is_public_ip(*ip)) {
                tracing::warn!("Refusing connection: {} resolved to {}", host, addr);
                return Err(Box::new(RefusedAddress { host, addr }) as BoxError);
            }

            let addrs: Addrs = Box::new(
                ips.into_iter()
                    .map(|ip| SocketAddr::new(ip, 0))
                    .collect::<Vec<_>>()
                    .into_iter(),
            );
            Ok::<Addrs, BoxError>(addrs)
        })
    }
}
