//! HTML link extraction
//!
//! Extraction yields raw `href` strings in document order. Resolution and
//! canonicalization happen in the orchestrator against the page's final URL.

use scraper::{Html, Selector};

/// Extracts outbound hyperlink targets from a document body
pub trait LinkExtractor: Send + Sync {
    /// Returns raw link strings in document order
    fn extract_links(&self, body: &str) -> Vec<String>;
}

/// Link extractor for HTML documents
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links (same-page anchors)
///
/// `rel="nofollow"` links are followed.
///
/// # Example
///
/// ```
/// use polite_crawler::crawler::{HtmlLinkExtractor, LinkExtractor};
///
/// let html = r#"<html><body><a href="/page">Link</a><a href="mailto:x@y.z">Mail</a></body></html>"#;
/// let links = HtmlLinkExtractor::new().extract_links(html);
/// assert_eq!(links, vec!["/page".to_string()]);
/// ```
#[derive(Debug, Clone)]
pub struct HtmlLinkExtractor {
    selector: Option<Selector>,
}

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self {
            selector: Selector::parse("a[href], link[rel='canonical'][href]").ok(),
        }
    }
}

impl Default for HtmlLinkExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, body: &str) -> Vec<String> {
        let Some(selector) = &self.selector else {
            return Vec::new();
        };

        let document = Html::parse_document(body);
        document
            .select(selector)
            .filter(|element| element.value().attr("download").is_none())
            .filter_map(|element| element.value().attr("href"))
            .map(str::trim)
            .filter(|href| is_followable(href))
            .map(str::to_string)
            .collect()
    }
}

/// Returns false for hrefs that never lead to a crawlable page
fn is_followable(href: &str) -> bool {
    if href.is_empty() || href.starts_with('#') {
        return false;
    }

    let lower = href.to_ascii_lowercase();
    !(lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:"))
}
