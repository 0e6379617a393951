//! SSRF guard
//!
//! Classifies canonical URLs as crawlable or forbidden based on scheme, host
//! name patterns and every address the host resolves to.

use crate::url::matcher::matches_host_pattern;
use crate::url::CanonicalUrl;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::Host;

/// Host patterns that are always refused, regardless of configuration
pub const BUILTIN_BLOCKED_HOSTS: &[&str] = &["localhost", "*.localhost", "localhost.localdomain"];

/// Name resolution used by the guard
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `host` to every address it maps to
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (via tokio)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Decides whether a URL may be fetched
///
/// # Decision procedure
///
/// 1. Reject schemes other than http/https
/// 2. Reject host names matching a blocked pattern (`localhost`, configured suffixes)
/// 3. Reject IP literals outside public unicast space
/// 4. Resolve the name and reject if resolution fails, returns nothing, or
///    returns **any** non-public address
///
/// The check never errors: every failure is a `false`.
#[derive(Clone)]
pub struct SafetyGuard {
    blocked_hosts: Vec<String>,
    resolver: Arc<dyn Resolver>,
}

impl SafetyGuard {
    /// Creates a guard using the system resolver
    ///
    /// `extra_blocked_hosts` are added to [`BUILTIN_BLOCKED_HOSTS`].
    pub fn new(extra_blocked_hosts: &[String]) -> Self {
        Self::with_resolver(extra_blocked_hosts, Arc::new(SystemResolver))
    }

    /// Creates a guard with a custom resolver
    pub fn with_resolver(extra_blocked_hosts: &[String], resolver: Arc<dyn Resolver>) -> Self {
        let blocked_hosts = BUILTIN_BLOCKED_HOSTS
            .iter()
            .map(|p| p.to_string())
            .chain(extra_blocked_hosts.iter().map(|p| p.to_ascii_lowercase()))
            .collect();

        Self {
            blocked_hosts,
            resolver,
        }
    }

    /// Returns true only if the URL is safe to request
    pub async fn is_safe(&self, url: &CanonicalUrl) -> bool {
        if url.scheme() != "http" && url.scheme() != "https" {
            tracing::debug!("Refusing {}: unsupported scheme", url);
            return false;
        }

        let host = match url.as_url().host() {
            Some(host) => host,
            None => return false,
        };

        match host {
            Host::Ipv4(ip) => self.check_literal(url, IpAddr::V4(ip)),
            Host::Ipv6(ip) => self.check_literal(url, IpAddr::V6(ip)),
            Host::Domain(name) => {
                if self.is_blocked_name(name) {
                    tracing::debug!("Refusing {}: host {} is blocklisted", url, name);
                    return false;
                }
                self.check_resolved(url, name).await
            }
        }
    }

    /// Returns true if the host name matches any blocked pattern
    pub fn is_blocked_name(&self, host: &str) -> bool {
        self.blocked_hosts
            .iter()
            .any(|pattern| matches_host_pattern(pattern, host))
    }

    fn check_literal(&self, url: &CanonicalUrl, ip: IpAddr) -> bool {
        let public = is_public_ip(ip);
        if !public {
            tracing::debug!("Refusing {}: {} is not a public address", url, ip);
        }
        public
    }

    async fn check_resolved(&self, url: &CanonicalUrl, name: &str) -> bool {
        let addrs = match self.resolver.resolve(name, url.port()).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::debug!("Refusing {}: resolution of {} failed: {}", url, name, e);
                return false;
            }
        };

        if addrs.is_empty() {
            tracing::debug!("Refusing {}: {} resolved to no addresses", url, name);
            return false;
        }

        match addrs.iter().find(|ip| !is_public_ip(**ip)) {
            Some(ip) => {
                tracing::debug!("Refusing {}: {} resolves to non-public {}", url, name, ip);
                false
            }
            None => true,
        }
    }
}

impl std::fmt::Debug for SafetyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyGuard")
            .field("blocked_hosts", &self.blocked_hosts)
            .finish_non_exhaustive()
    }
}

/// Returns true if `ip` is a public, non-reserved unicast address
///
/// Rejected ranges include loopback, unspecified, RFC1918 private space,
/// link-local (and with it the 169.254.169.254 metadata address), carrier-grade
/// NAT, documentation and benchmarking blocks, multicast, broadcast, reserved
/// 240/4, IPv6 unique-local and link-local space, and IPv4 addresses embedded in
/// IPv6 (mapped, compatible, NAT64) that fall in any of those ranges.
pub fn is_public_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_ipv4(v4),
        IpAddr::V6(v6) => is_public_ipv6(v6),
    }
}

fn is_public_ipv4(ip: Ipv4Addr) -> bool {
    let [a, b, c, _] = ip.octets();

    let reserved = ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ip.is_documentation()
        || a == 0 // "this network"
        || (a == 100 && (64..=127).contains(&b)) // carrier-grade NAT
        || (a == 192 && b == 0 && c == 0) // IETF protocol assignments
        || (a == 198 && (18..=19).contains(&b)) // benchmarking
        || a >= 240; // reserved, includes broadcast

    !reserved
}

fn is_public_ipv6(ip: Ipv6Addr) -> bool {
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_public_ipv4(v4);
    }

    let segments = ip.segments();

    // NAT64 well-known prefix 64:ff9b::/96 embeds an IPv4 address
    if segments[..6] == [0x64, 0xff9b, 0, 0, 0, 0] {
        let o = ip.octets();
        return is_public_ipv4(Ipv4Addr::new(o[12], o[13], o[14], o[15]));
    }

    // Deprecated IPv4-compatible form ::a.b.c.d
    if segments[..6] == [0, 0, 0, 0, 0, 0] && !ip.is_loopback() && !ip.is_unspecified() {
        let o = ip.octets();
        return is_public_ipv4(Ipv4Addr::new(o[12], o[13], o[14], o[15]));
    }

    let reserved = ip.is_unspecified()
        || ip.is_loopback()
        || ip.is_multicast()
        || (segments[0] & 0xfe00) == 0xfc00 // unique local fc00::/7
        || (segments[0] & 0xffc0) == 0xfe80 // link-local fe80::/10
        || (segments[0] & 0xffc0) == 0xfec0 // site-local fec0::/10 (deprecated)
        || (segments[0] == 0x2001 && segments[1] == 0x0db8) // documentation
        || (segments[0] == 0x0100 && segments[1..4] == [0, 0, 0]); // discard-only 100::/64

    !reserved
}
