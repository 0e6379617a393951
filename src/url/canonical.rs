use crate::{UrlError, UrlResult};
use std::fmt;
use url::Url;

/// An absolute http(s) URL in canonical form
///
/// The invariant holds for every value: lowercase scheme and host, no fragment,
/// no default port, percent-normalized path, query kept as written. Values are
/// only produced by [`canonicalize`] and [`CanonicalUrl::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(Url);

impl CanonicalUrl {
    /// Canonicalizes an absolute URL string
    ///
    /// # Examples
    ///
    /// ```
    /// use polite_crawler::url::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("HTTP://Example.COM:80/a/%7Euser#top").unwrap();
    /// assert_eq!(url.as_str(), "http://example.com/a/~user");
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        finish(url)
    }

    /// Returns the canonical string form
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the URL scheme (`http` or `https`)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// Returns the host as it appears in the URL (IPv6 literals keep their brackets)
    pub fn host_str(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Returns the explicit port or the scheme's default port
    pub fn port(&self) -> u16 {
        self.0.port_or_known_default().unwrap_or(80)
    }

    /// Derives the origin used for rate limiting and robots.txt caching
    pub fn origin(&self) -> Origin {
        Origin {
            scheme: self.0.scheme().to_string(),
            host: self.host_str().to_string(),
            port: self.port(),
        }
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// The (scheme, host, port) triple identifying a site
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    scheme: String,
    host: String,
    port: u16,
}

impl Origin {
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the robots.txt location for this origin
    pub fn robots_url(&self) -> UrlResult<CanonicalUrl> {
        CanonicalUrl::parse(&format!("{}/robots.txt", self))
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if Some(self.port) == default_port(&self.scheme) {
            write!(f, "{}://{}", self.scheme, self.host)
        } else {
            write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
        }
    }
}

/// Canonicalizes `raw` against `base`
///
/// # Rules
///
/// 1. Resolve `raw` against `base` with standard relative-URL resolution
/// 2. Lowercase scheme and host
/// 3. Strip the fragment
/// 4. Drop the port when it is the scheme default (80 for http, 443 for https)
/// 5. Collapse an empty path to `/`
///
/// Percent-encodings in the path are normalized as well: encoded unreserved
/// characters are decoded and the remaining escapes use uppercase hex digits.
/// The query is preserved as written.
///
/// # Errors
///
/// Returns `UrlError::Parse` for unparseable input and `UrlError::InvalidScheme`
/// when the resolved scheme is not http or https.
///
/// # Examples
///
/// ```
/// use polite_crawler::url::{canonicalize, CanonicalUrl};
///
/// let base = CanonicalUrl::parse("https://example.com/docs/index.html").unwrap();
/// let url = canonicalize("../About?b=2&a=1#team", &base).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/About?b=2&a=1");
/// ```
pub fn canonicalize(raw: &str, base: &CanonicalUrl) -> UrlResult<CanonicalUrl> {
    let url = base
        .as_url()
        .join(raw.trim())
        .map_err(|e| UrlError::Parse(e.to_string()))?;
    finish(url)
}

/// Applies the canonical-form rules to an already absolute URL
fn finish(mut url: Url) -> UrlResult<CanonicalUrl> {
    // The url crate lowercases the scheme and, for http(s), the host; it also
    // elides default ports and turns an empty path into "/".
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    if url.port() == default_port(url.scheme()) {
        // set_port only fails for cannot-be-a-base URLs, which http(s) never are
        let _ = url.set_port(None);
    }

    let path = normalize_percent_encoding(url.path());
    if path.is_empty() {
        url.set_path("/");
    } else if path != url.path() {
        url.set_path(&path);
    }

    Ok(CanonicalUrl(url))
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}

/// Decodes percent-escapes of unreserved characters and uppercases the rest
fn normalize_percent_encoding(path: &str) -> String {
    let bytes = path.as_bytes();
    let mut out = String::with_capacity(path.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = hi << 4 | lo;
                if is_unreserved(decoded) {
                    out.push(decoded as char);
                } else {
                    out.push('%');
                    out.push(bytes[i + 1].to_ascii_uppercase() as char);
                    out.push(bytes[i + 2].to_ascii_uppercase() as char);
                }
                i += 3;
                continue;
            }
        }
        // Paths produced by the url crate are ASCII, so byte-wise copying is safe.
        out.push(bytes[i] as char);
        i += 1;
    }

    out
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}
