//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end over real HTTP.
//!
//! The safety guard refuses loopback addresses, so crawls target the name
//! `site.test`: the test resolver maps it to a public address for the guard,
//! and the test transport rewrites it to the mock server when connecting.

use async_trait::async_trait;
use polite_crawler::config::{Config, UserAgentConfig};
use polite_crawler::crawler::{
    build_http_client, FailureKind, HtmlLinkExtractor, HttpTransport, RawResponse, Transport,
    TransportError,
};
use polite_crawler::url::Resolver;
use polite_crawler::{CrawlSummary, Orchestrator};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SITE: &str = "http://site.test";

/// Sends requests for `site.test` to the mock server
struct MockSiteTransport {
    inner: HttpTransport,
    port: u16,
}

#[async_trait]
impl Transport for MockSiteTransport {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<RawResponse, TransportError> {
        let mut target = url.clone();
        if target.host_str() == Some("site.test") {
            target.set_host(Some("127.0.0.1")).unwrap();
            target.set_port(Some(self.port)).unwrap();
        }
        self.inner.get(&target, timeout).await
    }
}

/// Resolves every name to a public address
struct PublicResolver;

#[async_trait]
impl Resolver for PublicResolver {
    async fn resolve(&self, _host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        Ok(vec!["93.184.216.34".parse().unwrap()])
    }
}

/// Creates a test configuration with short delays
fn create_test_config() -> Config {
    let mut config = Config::default();
    config.crawler.workers = 4;
    config.crawler.max_depth = 2;
    config.crawler.min_interval_ms = 0;
    config.fetch.backoff_base_ms = 10;
    config.fetch.request_timeout_ms = 2000;
    config.user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
    };
    config
}

fn create_orchestrator(server: &MockServer, config: Config) -> Orchestrator {
    let client = build_http_client(&config.user_agent, None).unwrap();
    let transport = MockSiteTransport {
        inner: HttpTransport::from_client(client),
        port: server.address().port(),
    };

    Orchestrator::with_collaborators(
        config,
        Arc::new(transport),
        Arc::new(PublicResolver),
        Arc::new(HtmlLinkExtractor::new()),
    )
}

async fn crawl(server: &MockServer, config: Config, seed_path: &str) -> CrawlSummary {
    create_orchestrator(server, config)
        .run(&format!("{}{}", SITE, seed_path))
        .await
        .expect("crawl should complete")
}

async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: &str, html: String, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .expect(expected_hits)
        .mount(server)
        .await;
}

fn html_with_links(links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">link</a>"#, href))
        .collect();
    format!("<html><body><h1>Page</h1>{}</body></html>", anchors)
}

#[tokio::test]
async fn test_full_crawl_fetches_each_page_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(
        &server,
        "/",
        html_with_links(&["/about", "/about#team", "/", "http://site.test:80/about"]),
        1,
    )
    .await;
    mount_page(&server, "/about", html_with_links(&["/"]), 1).await;

    let summary = crawl(&server, create_test_config(), "/").await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.visited, 2);
    assert_eq!(summary.failed, 0);
    assert!(!summary.stopped);
}

#[tokio::test]
async fn test_robots_disallow_respected() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private").await;

    mount_page(
        &server,
        "/",
        html_with_links(&["/private/secret", "/public"]),
        1,
    )
    .await;
    mount_page(&server, "/public", html_with_links(&[]), 1).await;
    mount_page(&server, "/private/secret", html_with_links(&[]), 0).await;

    let summary = crawl(&server, create_test_config(), "/").await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.forbidden_robots, 1);
}

#[tokio::test]
async fn test_missing_robots_allows_everything() {
    let server = MockServer::start().await;

    mount_page(&server, "/", html_with_links(&["/next"]), 1).await;
    mount_page(&server, "/next", html_with_links(&[]), 1).await;

    let summary = crawl(&server, create_test_config(), "/").await;
    assert_eq!(summary.fetched, 2);
}

#[tokio::test]
async fn test_depth_zero_fetches_only_seed() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(&server, "/", html_with_links(&["/a", "/b"]), 1).await;
    mount_page(&server, "/a", html_with_links(&[]), 0).await;
    mount_page(&server, "/b", html_with_links(&[]), 0).await;

    let mut config = create_test_config();
    config.crawler.max_depth = 0;

    let summary = crawl(&server, config, "/").await;
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.visited, 1);
}

#[tokio::test]
async fn test_redirect_to_metadata_address_refused() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(&server, "/", html_with_links(&["/go"]), 1).await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let summary = crawl(&server, create_test_config(), "/").await;

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.forbidden_unsafe, 1);
}

#[tokio::test]
async fn test_redirect_followed_within_site() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/new", html_with_links(&["/new", "/old"]), 1).await;

    let summary = crawl(&server, create_test_config(), "/old").await;

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.visited, 2);
}

#[tokio::test]
async fn test_redirect_to_fetched_page_not_refetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    mount_page(&server, "/", html_with_links(&["/a", "/b"]), 1).await;
    mount_page(&server, "/a", html_with_links(&[]), 1).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/a"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = create_test_config();
    config.crawler.workers = 1;

    let summary = crawl(&server, config, "/").await;

    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.visited, 3);
}

#[tokio::test]
async fn test_transient_503_retried_then_succeeds() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    // Mounted first, so it answers until exhausted
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/flaky", html_with_links(&[]), 1).await;

    let summary = crawl(&server, create_test_config(), "/flaky").await;

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_persistent_500_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let summary = crawl(&server, create_test_config(), "/broken").await;

    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        summary.failures_by_kind.get(&FailureKind::Exhausted),
        Some(&1)
    );
}

#[tokio::test]
async fn test_404_not_retried() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let summary = crawl(&server, create_test_config(), "/gone").await;

    assert_eq!(
        summary.failures_by_kind.get(&FailureKind::HttpStatus(404)),
        Some(&1)
    );
}

#[tokio::test]
async fn test_rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", html_with_links(&[]), 1).await;

    let summary = crawl(&server, create_test_config(), "/").await;

    assert_eq!(summary.fetched, 1);
    assert!(summary.elapsed >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1").await;

    mount_page(&server, "/", html_with_links(&["/second"]), 1).await;
    mount_page(&server, "/second", html_with_links(&[]), 1).await;

    let summary = crawl(&server, create_test_config(), "/").await;

    assert_eq!(summary.fetched, 2);
    assert!(summary.elapsed >= Duration::from_millis(900));
}

#[tokio::test]
async fn test_stop_before_start_sends_nothing() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_with_links(&["/a"]), 0).await;

    let orchestrator = create_orchestrator(&server, create_test_config());
    orchestrator.stop_handle().cancel();

    let summary = orchestrator
        .run(&format!("{}/", SITE))
        .await
        .expect("crawl should complete");

    assert!(summary.stopped);
    assert_eq!(summary.processed(), 0);
}

#[tokio::test]
async fn test_invalid_seed_rejected() {
    let server = MockServer::start().await;
    let result = create_orchestrator(&server, create_test_config())
        .run("not a url")
        .await;

    assert!(result.is_err());
}
