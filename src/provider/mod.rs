//! Content providers that turn a DOI into a PDF artifact or a link to one.
//!
//! # Architecture
//!
//! - [`Provider`] - Async trait every source implements
//! - [`ProviderRegistry`] - Name-keyed constructors that build the priority chain
//! - [`Resolved`] / [`Payload`] - What a successful probe hands back
//! - [`MirrorRotation`] - Shared mirror list for mirror-rotating providers
//!
//! Providers never pick their own network path. Each probe receives a
//! [`RoutedClient`] already bound to the route the policy chose.

mod arxiv;
mod error;
mod mirror;
mod open_access_button;
mod registry;
mod scihub;
mod scrape;
mod semantic_scholar;
mod unpaywall;
pub(crate) mod utils;

pub use arxiv::ArxivProvider;
pub use error::{ProviderError, ProviderErrorKind};
pub use mirror::{DEFAULT_MIRROR_DISCOVERY_URL, DEFAULT_MIRRORS, MirrorRotation, parse_mirror_listing};
pub use open_access_button::OpenAccessButtonProvider;
pub use registry::{BUILTIN_PROVIDERS, ProviderConstructor, ProviderRegistry};
pub use scihub::SciHubProvider;
pub use scrape::{ScrapeProvider, ScrapeSite};
pub use semantic_scholar::SemanticScholarProvider;
pub use unpaywall::UnpaywallProvider;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ProviderSettings;
use crate::routing::RoutedClient;

/// How a provider finds artifacts. Used for listings and log context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Structured JSON API.
    QueryApi,
    /// HTML or XML page scraped for a link.
    Scrape,
    /// Rotating list of mirrors.
    MirrorRotating,
    /// Link derived from the identifier alone.
    Derived,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::QueryApi => "query-api",
            Self::Scrape => "scrape",
            Self::MirrorRotating => "mirror-rotating",
            Self::Derived => "derived",
        })
    }
}

/// Artifact handed back by a successful probe.
#[derive(Clone, PartialEq, Eq)]
pub enum Payload {
    /// The probe already downloaded the bytes.
    Bytes {
        /// Where the bytes came from
        url: String,
        /// Artifact body
        bytes: Vec<u8>,
    },
    /// A link still to be fetched.
    Url(String),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes { url, bytes } => f
                .debug_struct("Bytes")
                .field("url", url)
                .field("len", &bytes.len())
                .finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
        }
    }
}

impl Payload {
    /// URL the payload came from or points to.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Bytes { url, .. } | Self::Url(url) => url,
        }
    }
}

/// Successful probe outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Provider that produced the payload.
    pub provider: String,
    /// Artifact or link.
    pub payload: Payload,
}

impl Resolved {
    /// Link result.
    #[must_use]
    pub fn url(provider: &str, url: impl Into<String>) -> Self {
        Self {
            provider: provider.to_string(),
            payload: Payload::Url(url.into()),
        }
    }

    /// Prefetched-bytes result.
    #[must_use]
    pub fn bytes(provider: &str, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            provider: provider.to_string(),
            payload: Payload::Bytes {
                url: url.into(),
                bytes,
            },
        }
    }
}

/// A content source that can be asked for a DOI's artifact.
///
/// # Object Safety
///
/// Uses `async_trait` so providers can live in a `Vec<Arc<dyn Provider>>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name used in config, logs, and filenames.
    fn name(&self) -> &str;

    /// How the provider finds artifacts.
    fn kind(&self) -> ProviderKind;

    /// Probes the source for `doi`.
    ///
    /// Implementations must not panic on malformed input.
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError>;
}

/// Probe timeout from settings, or `default_secs`.
pub(crate) fn probe_timeout(settings: &ProviderSettings, default_secs: u64) -> Duration {
    Duration::from_secs(settings.timeout_secs.unwrap_or(default_secs))
}

/// Endpoint base from settings, or `default_base`, without a trailing slash.
pub(crate) fn endpoint_base(settings: &ProviderSettings, default_base: &str) -> String {
    settings
        .base_url
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(default_base)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_url_for_both_variants() {
        let link = Resolved::url("unpaywall", "https://x.org/a.pdf");
        assert_eq!(link.payload.url(), "https://x.org/a.pdf");

        let bytes = Resolved::bytes("scihub", "https://m.se/10.1/x", b"%PDF".to_vec());
        assert_eq!(bytes.payload.url(), "https://m.se/10.1/x");
        assert_eq!(bytes.provider, "scihub");
    }

    #[test]
    fn test_payload_debug_hides_body() {
        let bytes = Resolved::bytes("scihub", "https://m.se/x", vec![0; 4096]);
        let debug = format!("{:?}", bytes.payload);
        assert!(debug.contains("4096"), "{debug}");
        assert!(!debug.contains("0, 0, 0"), "{debug}");
    }

    #[test]
    fn test_endpoint_base_override_and_trailing_slash() {
        let settings = ProviderSettings {
            base_url: Some("http://127.0.0.1:9999/".to_string()),
            ..ProviderSettings::default()
        };
        assert_eq!(endpoint_base(&settings, "https://api.x.org"), "http://127.0.0.1:9999");
        assert_eq!(
            endpoint_base(&ProviderSettings::default(), "https://api.x.org"),
            "https://api.x.org"
        );
    }

    #[test]
    fn test_probe_timeout_override() {
        let settings = ProviderSettings {
            timeout_secs: Some(3),
            ..ProviderSettings::default()
        };
        assert_eq!(probe_timeout(&settings, 10), Duration::from_secs(3));
        assert_eq!(
            probe_timeout(&ProviderSettings::default(), 10),
            Duration::from_secs(10)
        );
    }
}
