//! Shared helpers for provider modules: regex statics, link absolutization,
//! host comparison, and block-page detection.

use regex::Regex;
use url::Url;

/// Compiles a regex at static init; panics on invalid pattern.
pub fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

/// Lowercase markers that identify a captcha or bot-challenge page.
const BLOCK_MARKERS: [&str; 5] = [
    "captcha",
    "cloudflare",
    "unusual traffic",
    "cf-challenge",
    "are you a robot",
];

/// Normalizes a host string: trim, strip leading "www.", trailing '.', and lowercases.
#[must_use]
pub fn canonical_host(host: &str) -> String {
    host.trim()
        .trim_start_matches("www.")
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Returns true if `url` points at `host` after normalization.
#[must_use]
pub fn url_has_host(url: &str, host: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(canonical_host))
        .is_some_and(|h| h == canonical_host(host))
}

/// Resolves a possibly relative link against `base_url`.
///
/// Absolute links are returned as-is; `//host/...` becomes `https://host/...`.
#[must_use]
pub fn absolutize_url(value: &str, base_url: &Url) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        return Some(value.to_string());
    }
    if value.starts_with("//") {
        return Some(format!("https:{value}"));
    }
    base_url.join(value).ok().map(|url| url.to_string())
}

/// Returns the block marker found in `body`, if any.
#[must_use]
pub fn find_block_marker(body: &str) -> Option<&'static str> {
    let lower = body.to_ascii_lowercase();
    BLOCK_MARKERS.into_iter().find(|marker| lower.contains(marker))
}

/// True when a response advertises a PDF body.
#[must_use]
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/pdf"))
}

/// True when a URL path ends in `.pdf` (query and fragment ignored).
#[must_use]
pub fn has_pdf_extension(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    path.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_host_trim_www_and_trailing_dot_lowercase() {
        assert_eq!(canonical_host("  www.Example.COM.  "), "example.com");
        assert_eq!(canonical_host("doi.org"), "doi.org");
    }

    #[test]
    fn test_url_has_host() {
        assert!(url_has_host("https://www.sci-hub.se/x.pdf", "sci-hub.se"));
        assert!(!url_has_host("https://cdn.example.org/x.pdf", "sci-hub.se"));
        assert!(!url_has_host("not a url", "sci-hub.se"));
    }

    #[test]
    fn test_absolutize_url_variants() {
        let base = Url::parse("https://sci-hub.se/10.1/x").unwrap();
        assert_eq!(
            absolutize_url("https://a.org/p.pdf", &base).as_deref(),
            Some("https://a.org/p.pdf")
        );
        assert_eq!(
            absolutize_url("//cdn.org/p.pdf", &base).as_deref(),
            Some("https://cdn.org/p.pdf")
        );
        assert_eq!(
            absolutize_url("/downloads/p.pdf", &base).as_deref(),
            Some("https://sci-hub.se/downloads/p.pdf")
        );
        assert_eq!(absolutize_url("  ", &base), None);
    }

    #[test]
    fn test_find_block_marker_case_insensitive() {
        assert_eq!(
            find_block_marker("<title>Please solve the CAPTCHA</title>"),
            Some("captcha")
        );
        assert_eq!(find_block_marker("<html>paper</html>"), None);
    }

    #[test]
    fn test_pdf_content_type_and_extension() {
        assert!(is_pdf_content_type(Some("application/pdf; charset=binary")));
        assert!(!is_pdf_content_type(Some("text/html")));
        assert!(!is_pdf_content_type(None));
        assert!(has_pdf_extension("https://x.org/files/paper.PDF?download=1"));
        assert!(!has_pdf_extension("https://x.org/files/paper.html"));
    }
}
