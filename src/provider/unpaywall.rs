//! Unpaywall open-access lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::routing::{RequestSpec, RoutedClient};

use super::{Provider, ProviderError, ProviderKind, Resolved, endpoint_base, probe_timeout};

const NAME: &str = "unpaywall";
const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct UnpaywallRecord {
    is_oa: Option<bool>,
    best_oa_location: Option<OaLocation>,
    #[serde(default)]
    oa_locations: Vec<OaLocation>,
}

#[derive(Debug, Deserialize)]
struct OaLocation {
    url_for_pdf: Option<String>,
    url: Option<String>,
}

/// Asks Unpaywall for the best open-access PDF location.
pub struct UnpaywallProvider {
    base_url: String,
    email: String,
    timeout: Duration,
}

impl std::fmt::Debug for UnpaywallProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnpaywallProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UnpaywallProvider {
    /// Builds the provider from its settings.
    #[must_use]
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            base_url: endpoint_base(settings, DEFAULT_BASE_URL),
            email: settings.contact_email().to_string(),
            timeout: probe_timeout(settings, DEFAULT_TIMEOUT_SECS),
        }
    }

    fn lookup_url(&self, doi: &str) -> String {
        format!(
            "{}/v2/{}?email={}",
            self.base_url,
            doi.trim(),
            urlencoding::encode(&self.email)
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Best location's PDF link, else its landing URL, else any other PDF link.
fn pick_pdf_url(record: UnpaywallRecord) -> Option<String> {
    if let Some(best) = record.best_oa_location {
        let url_for_pdf = non_empty(best.url_for_pdf);
        if url_for_pdf.is_some() {
            return url_for_pdf;
        }
        if let Some(url) = non_empty(best.url) {
            return Some(url);
        }
    }
    record
        .oa_locations
        .into_iter()
        .find_map(|location| non_empty(location.url_for_pdf))
}

#[async_trait]
impl Provider for UnpaywallProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::QueryApi
    }

    #[tracing::instrument(skip(self, client), fields(provider = NAME))]
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError> {
        let url = self.lookup_url(doi);
        let body = client.get_text(&url, &RequestSpec::api(self.timeout)).await?;
        let record: UnpaywallRecord = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(NAME, &url, e.to_string()))?;

        if record.is_oa == Some(false) {
            return Err(ProviderError::no_artifact(NAME, "not open access"));
        }
        match pick_pdf_url(record) {
            Some(pdf_url) => {
                debug!(pdf_url = %pdf_url, "open-access location found");
                Ok(Resolved::url(NAME, pdf_url))
            }
            None => Err(ProviderError::no_artifact(NAME, "no open-access PDF location")),
        }
    }
}
