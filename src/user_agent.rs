//! Shared User-Agent strings for provider and artifact HTTP traffic.
//!
//! Query APIs get an identifying UA (polite-pool etiquette). Scrape targets and
//! artifact hosts get a browser UA since many of them reject tool identifiers.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/paperfetch";

/// Browser User-Agent used for scrape providers, mirrors, and artifact fetches.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default User-Agent for query-API providers (identifies the tool).
#[must_use]
pub(crate) fn default_api_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("paperfetch/{version} (research-tool; +{PROJECT_UA_URL})")
}
