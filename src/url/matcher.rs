/// Checks whether a host name matches a blocklist pattern
///
/// Two pattern forms are supported:
/// 1. Exact name: `"localhost"` matches only `localhost`
/// 2. Suffix wildcard: `"*.internal"` matches `internal` itself and every name
///    ending in `.internal` (`db.internal`, `a.b.internal`)
///
/// Comparison is ASCII case-insensitive and ignores a single trailing dot on
/// the candidate, so `LOCALHOST.` is treated like `localhost`.
///
/// # Examples
///
/// ```
/// use polite_crawler::url::matches_host_pattern;
///
/// assert!(matches_host_pattern("localhost", "LocalHost."));
/// assert!(matches_host_pattern("*.internal", "metadata.internal"));
/// assert!(!matches_host_pattern("*.internal", "internal-docs.example.com"));
/// ```
pub fn matches_host_pattern(pattern: &str, candidate: &str) -> bool {
    let candidate = candidate.strip_suffix('.').unwrap_or(candidate);
    if candidate.is_empty() {
        return false;
    }

    if let Some(base) = pattern.strip_prefix("*.") {
        if candidate.eq_ignore_ascii_case(base) {
            return true;
        }
        // Wildcard: any label sequence followed by ".base"
        let bytes = candidate.as_bytes();
        bytes.len() > base.len() + 1
            && bytes[bytes.len() - base.len() - 1] == b'.'
            && bytes[bytes.len() - base.len()..].eq_ignore_ascii_case(base.as_bytes())
    } else {
        candidate.eq_ignore_ascii_case(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_host_pattern("localhost", "localhost"));
        assert!(matches_host_pattern(
            "localhost.localdomain",
            "localhost.localdomain"
        ));
    }

    #[test]
    fn test_exact_no_match() {
        assert!(!matches_host_pattern("localhost", "localhost.example.com"));
        assert!(!matches_host_pattern("localhost", "mylocalhost"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_host_pattern("localhost", "LOCALHOST"));
        assert!(matches_host_pattern("*.internal", "API.Internal"));
    }

    #[test]
    fn test_trailing_dot_ignored() {
        assert!(matches_host_pattern("localhost", "localhost."));
        assert!(matches_host_pattern("*.internal", "db.internal."));
    }

    #[test]
    fn test_wildcard_matches_bare_suffix() {
        assert!(matches_host_pattern("*.internal", "internal"));
        assert!(matches_host_pattern("*.corp.example", "corp.example"));
    }

    #[test]
    fn test_wildcard_matches_nested_names() {
        assert!(matches_host_pattern("*.internal", "db.internal"));
        assert!(matches_host_pattern("*.internal", "a.b.c.internal"));
    }

    #[test]
    fn test_wildcard_requires_label_boundary() {
        assert!(!matches_host_pattern("*.internal", "notinternal"));
        assert!(!matches_host_pattern("*.internal", "internal.example.com"));
        assert!(!matches_host_pattern("*.local", "example.locality"));
    }

    #[test]
    fn test_empty_candidate() {
        assert!(!matches_host_pattern("*.internal", ""));
        assert!(!matches_host_pattern("localhost", "."));
    }
}
