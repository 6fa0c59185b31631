//! Canonical site-key derivation and matching
//!
//! Every component compares hostnames through this module. The reduction must
//! stay identical everywhere; two components normalizing differently would
//! silently fail to match a managed site.

/// Reduce a raw URL or host string to its canonical site key.
///
/// Steps, in order: trim whitespace, lowercase, strip a leading `http://` or
/// `https://`, strip a leading `www.`, truncate at the first `/`, `?` or `#`.
/// Total and deterministic; an empty result means "no site" and callers must
/// fail closed on it.
pub fn normalize(raw: &str) -> String {
    let mut host = raw.trim().to_lowercase();

    for scheme in ["http://", "https://"] {
        if let Some(rest) = host.strip_prefix(scheme) {
            host = rest.to_string();
            break;
        }
    }

    if let Some(rest) = host.strip_prefix("www.") {
        host = rest.to_string();
    }

    if let Some(end) = host.find(['/', '?', '#']) {
        host.truncate(end);
    }

    host
}

/// Derive the site key for a full page URL.
///
/// Same reduction as [`normalize`], with any `:port` suffix dropped so that
/// `https://example.com:8080/x` keys the same as `example.com`.
pub fn from_url(url: &str) -> String {
    let mut key = normalize(url);
    if let Some(colon) = key.find(':') {
        key.truncate(colon);
    }
    key
}

/// Site-key match policy: two keys match when they are equal or when either
/// is a substring of the other.
///
/// The substring rule lets a bare registered domain (`example.com`) match
/// subdomains encountered at runtime (`news.example.com`). It also allows
/// false positives between unrelated hosts sharing a substring
/// (`example.com` vs `notexample.com`); that imprecision is intentional and
/// not special-cased further. Empty keys never match anything.
pub fn keys_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.contains(b) || b.contains(a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scheme_www_and_path() {
        assert_eq!(normalize("HTTPS://WWW.Example.com/path?q=1"), "example.com");
        assert_eq!(normalize("http://news.ycombinator.com/item?id=1"), "news.ycombinator.com");
        assert_eq!(normalize("  reddit.com/r/rust  "), "reddit.com");
        assert_eq!(normalize("example.com#fragment"), "example.com");
    }

    #[test]
    fn leaves_plain_hosts_alone() {
        assert_eq!(normalize("example.com"), "example.com");
        assert_eq!(normalize("sub.example.co.uk"), "sub.example.co.uk");
    }

    #[test]
    fn only_leading_www_is_stripped() {
        assert_eq!(normalize("www.example.com"), "example.com");
        assert_eq!(normalize("notwww.example.com"), "notwww.example.com");
        assert_eq!(normalize("example.www.com"), "example.www.com");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in [
            "HTTPS://WWW.Example.com/path?q=1",
            "  http://a.b.c/d  ",
            "",
            "plain",
            "www.www.example.com",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn empty_and_degenerate_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("https://"), "");
        assert_eq!(normalize("/just/a/path"), "");
    }

    #[test]
    fn from_url_drops_port() {
        assert_eq!(from_url("https://example.com:8080/x"), "example.com");
        assert_eq!(from_url("localhost:3000"), "localhost");
        assert_eq!(from_url("example.com"), "example.com");
    }

    #[test]
    fn match_policy_is_substring_based() {
        assert!(keys_match("example.com", "example.com"));
        assert!(keys_match("example.com", "news.example.com"));
        assert!(keys_match("news.example.com", "example.com"));
        // documented imprecision, kept as specified
        assert!(keys_match("example.com", "notexample.com"));
        assert!(!keys_match("example.com", "rust-lang.org"));
    }

    #[test]
    fn empty_keys_never_match() {
        assert!(!keys_match("", ""));
        assert!(!keys_match("", "example.com"));
        assert!(!keys_match("example.com", ""));
    }
}
