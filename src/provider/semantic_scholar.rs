//! Semantic Scholar paper lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::routing::{RequestSpec, RoutedClient};

use super::{Provider, ProviderError, ProviderKind, Resolved, endpoint_base, probe_timeout};

const NAME: &str = "semantic-scholar";
const DEFAULT_BASE_URL: &str = "https://api.semanticscholar.org";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperRecord {
    open_access_pdf: Option<OpenAccessPdf>,
    #[serde(default)]
    sources: Vec<PaperSource>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaperSource {
    url: Option<String>,
}

/// Looks up a paper's open-access PDF on Semantic Scholar.
#[derive(Debug)]
pub struct SemanticScholarProvider {
    base_url: String,
    timeout: Duration,
}

impl SemanticScholarProvider {
    /// Builds the provider from its settings.
    #[must_use]
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            base_url: endpoint_base(settings, DEFAULT_BASE_URL),
            timeout: probe_timeout(settings, DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn pick_pdf_url(record: PaperRecord) -> Option<String> {
    if let Some(url) = record
        .open_access_pdf
        .and_then(|pdf| pdf.url)
        .filter(|url| !url.trim().is_empty())
    {
        return Some(url);
    }
    record
        .sources
        .into_iter()
        .filter_map(|source| source.url)
        .find(|url| url.to_ascii_lowercase().contains("pdf"))
}

#[async_trait]
impl Provider for SemanticScholarProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::QueryApi
    }

    #[tracing::instrument(skip(self, client), fields(provider = NAME))]
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError> {
        let url = format!("{}/v1/paper/DOI:{}", self.base_url, doi.trim());
        let body = client.get_text(&url, &RequestSpec::api(self.timeout)).await?;
        let record: PaperRecord = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(NAME, &url, e.to_string()))?;

        pick_pdf_url(record)
            .map(|pdf_url| Resolved::url(NAME, pdf_url))
            .ok_or_else(|| ProviderError::no_artifact(NAME, "no PDF link"))
    }
}
