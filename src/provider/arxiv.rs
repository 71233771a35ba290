//! arXiv provider: derives the canonical PDF link from arXiv DOIs without any request.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::routing::RoutedClient;

use super::utils::compile_static_regex;
use super::{Provider, ProviderError, ProviderKind, Resolved};

const NAME: &str = "arxiv";
const ARXIV_BASE_URL: &str = "https://arxiv.org";

/// Matches `10.48550/arXiv.2101.00001`, `arxiv/2101.00001`, and similar.
static ARXIV_DOI_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"(?i)(?:10\.\d+/)?arxiv\.?/?(\d{4}\.\d{4,5})(v\d+)?"));

/// Resolves arXiv DOIs to `https://arxiv.org/pdf/{id}.pdf`.
#[derive(Debug, Default)]
pub struct ArxivProvider;

impl ArxivProvider {
    /// Creates a new `ArxivProvider`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn extract_arxiv_id(doi: &str) -> Option<String> {
    let caps = ARXIV_DOI_ID_RE.captures(doi)?;
    let id = caps.get(1)?.as_str();
    let version = caps.get(2).map_or("", |m| m.as_str());
    Some(format!("{id}{version}"))
}

#[async_trait]
impl Provider for ArxivProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Derived
    }

    async fn resolve(&self, doi: &str, _client: &RoutedClient) -> Result<Resolved, ProviderError> {
        if !doi.to_ascii_lowercase().contains("arxiv") {
            return Err(ProviderError::no_artifact(NAME, "not an arXiv DOI"));
        }
        let id = extract_arxiv_id(doi)
            .ok_or_else(|| ProviderError::no_artifact(NAME, "cannot parse arXiv id"))?;
        Ok(Resolved::url(NAME, format!("{ARXIV_BASE_URL}/pdf/{id}.pdf")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provider::Payload;
    use crate::routing::HttpPool;
    use std::sync::Arc;

    fn client() -> RoutedClient {
        Arc::new(HttpPool::direct_only().unwrap()).client_for(NAME)
    }

    #[test]
    fn test_extract_arxiv_id_variants() {
        assert_eq!(extract_arxiv_id("10.48550/arXiv.2101.00001").as_deref(), Some("2101.00001"));
        assert_eq!(extract_arxiv_id("arxiv/1706.03762v5").as_deref(), Some("1706.03762v5"));
        assert_eq!(extract_arxiv_id("10.1000/xyz"), None);
    }

    #[tokio::test]
    async fn test_resolve_arxiv_doi_to_pdf_url() {
        let resolved = ArxivProvider::new()
            .resolve("10.48550/arXiv.2301.12345", &client())
            .await
            .unwrap();
        assert_eq!(
            resolved.payload,
            Payload::Url("https://arxiv.org/pdf/2301.12345.pdf".to_string())
        );
    }

    #[tokio::test]
    async fn test_resolve_non_arxiv_doi_is_no_artifact() {
        let err = ArxivProvider::new()
            .resolve("10.1038/nature12373", &client())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NoArtifact { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_resolve_arxiv_without_id_is_no_artifact() {
        let err = ArxivProvider::new()
            .resolve("10.48550/arxiv.bogus", &client())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot parse"), "{err}");
    }
}
