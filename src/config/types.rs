use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
///
/// Every section is optional; missing sections and keys fall back to the
/// defaults documented on each field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub robots: RobotsConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub safety: SafetyConfig,
}

/// Crawl run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Number of concurrent workers (default 8)
    pub workers: u32,

    /// Maximum link distance from the seed (default 3)
    pub max_depth: u32,

    /// Optional cap on the number of fetches dispatched in one run
    pub max_pages: Option<u64>,

    /// Minimum time between requests to the same origin, in milliseconds (default 1000)
    pub min_interval_ms: u64,

    /// Only follow links that stay on the seed's origin (default false)
    pub stay_on_origin: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            max_depth: 3,
            max_pages: None,
            min_interval_ms: 1000,
            stay_on_origin: false,
        }
    }
}

impl CrawlerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

/// HTTP fetch and retry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetchConfig {
    /// Per-request timeout in milliseconds (default 10000)
    pub request_timeout_ms: u64,

    /// Maximum redirect hops followed for one fetch (default 5)
    pub max_redirects: u32,

    /// Total attempts for retryable failures, including the first (default 3)
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on each further retry (default 1000)
    pub backoff_base_ms: u64,

    /// Cool-down applied to an origin after HTTP 429 without Retry-After (default 5000)
    pub rate_limit_cooldown_ms: u64,

    /// Use robots.txt Crawl-delay when it exceeds the minimum interval (default true)
    pub respect_crawl_delay: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            max_redirects: 5,
            max_attempts: 3,
            backoff_base_ms: 1000,
            rate_limit_cooldown_ms: 5000,
            respect_crawl_delay: true,
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

/// robots.txt caching configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RobotsConfig {
    /// How long a parsed robots.txt stays cached, in seconds (default 86400)
    pub cache_ttl_secs: u64,

    /// How long a default-allow record from a failed fetch stays cached (default 3600)
    pub failure_ttl_secs: u64,

    /// Timeout for robots.txt requests in milliseconds (default 5000)
    pub fetch_timeout_ms: u64,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 24 * 60 * 60,
            failure_ttl_secs: 60 * 60,
            fetch_timeout_ms: 5000,
        }
    }
}

impl RobotsConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "PoliteCrawler".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{})",
            self.crawler_name, self.crawler_version, self.contact_url
        )
    }

    /// Product token matched against robots.txt `User-agent` lines
    pub fn robots_token(&self) -> &str {
        &self.crawler_name
    }
}

/// SSRF guard configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SafetyConfig {
    /// Host patterns refused in addition to the built-in localhost names
    pub blocked_hosts: Vec<String>,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            blocked_hosts: vec!["*.internal".to_string(), "*.local".to_string()],
        }
    }
}
