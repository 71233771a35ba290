//! Open Access Button availability lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::ProviderSettings;
use crate::routing::{RequestSpec, RoutedClient};

use super::{Provider, ProviderError, ProviderKind, Resolved, endpoint_base, probe_timeout};

const NAME: &str = "open-access-button";
const DEFAULT_BASE_URL: &str = "https://api.openaccessbutton.org";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct AvailabilityRecord {
    status: Option<String>,
    file_type: Option<String>,
    file_url: Option<String>,
}

impl AvailabilityRecord {
    fn pdf_url(self) -> Option<String> {
        let ok = self.status.as_deref() == Some("success")
            && self.file_type.as_deref() == Some("pdf");
        if ok {
            self.file_url.filter(|url| !url.trim().is_empty())
        } else {
            None
        }
    }
}

/// Queries Open Access Button for a legal PDF copy.
pub struct OpenAccessButtonProvider {
    base_url: String,
    email: String,
    timeout: Duration,
}

impl std::fmt::Debug for OpenAccessButtonProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAccessButtonProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenAccessButtonProvider {
    /// Builds the provider from its settings.
    #[must_use]
    pub fn new(settings: &ProviderSettings) -> Self {
        Self {
            base_url: endpoint_base(settings, DEFAULT_BASE_URL),
            email: settings.contact_email().to_string(),
            timeout: probe_timeout(settings, DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl Provider for OpenAccessButtonProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::QueryApi
    }

    #[tracing::instrument(skip(self, client), fields(provider = NAME))]
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError> {
        let url = format!(
            "{}/v2/{}?email={}",
            self.base_url,
            doi.trim(),
            urlencoding::encode(&self.email)
        );
        let body = client.get_text(&url, &RequestSpec::api(self.timeout)).await?;
        let record: AvailabilityRecord = serde_json::from_str(&body)
            .map_err(|e| ProviderError::invalid_response(NAME, &url, e.to_string()))?;

        record
            .pdf_url()
            .map(|pdf_url| Resolved::url(NAME, pdf_url))
            .ok_or_else(|| ProviderError::no_artifact(NAME, "no PDF link"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn record(json: &str) -> AvailabilityRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_success_pdf_returns_file_url() {
        let r = record(r#"{"status":"success","file_type":"pdf","file_url":"https://r.org/a.pdf"}"#);
        assert_eq!(r.pdf_url().as_deref(), Some("https://r.org/a.pdf"));
    }

    #[test]
    fn test_non_pdf_file_type_rejected() {
        let r = record(r#"{"status":"success","file_type":"html","file_url":"https://r.org/a"}"#);
        assert_eq!(r.pdf_url(), None);
    }

    #[test]
    fn test_non_success_status_rejected() {
        let r = record(r#"{"status":"error","file_type":"pdf","file_url":"https://r.org/a.pdf"}"#);
        assert_eq!(r.pdf_url(), None);
    }
}
