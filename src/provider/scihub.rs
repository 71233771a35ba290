//! Sci-Hub mirror-rotating provider.
//!
//! The mirror list is built lazily on the first probe, from live discovery
//! when enabled, else from configuration, else from [`DEFAULT_MIRRORS`]. A
//! single call probes at most [`MAX_MIRRORS_PER_CALL`] mirrors. Mirrors that
//! block or fail at the network level are dropped for the rest of the run.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use scraper::{Html, Selector};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProviderSettings;
use crate::routing::{RequestSpec, RoutedClient};

use super::mirror::{DEFAULT_MIRROR_DISCOVERY_URL, DEFAULT_MIRRORS, MirrorRotation, parse_mirror_listing};
use super::utils::{absolutize_url, compile_static_regex, find_block_marker, is_pdf_content_type, url_has_host};
use super::{Provider, ProviderError, ProviderKind, Resolved, probe_timeout};

const NAME: &str = "scihub";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const DISCOVERY_TIMEOUT_SECS: u64 = 10;

/// Upper bound on mirrors probed by one `resolve` call.
pub const MAX_MIRRORS_PER_CALL: usize = 3;

/// Statuses mirrors use for bot protection.
const BLOCK_STATUSES: [u16; 3] = [403, 429, 503];

static ONCLICK_LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"location\.href\s*=\s*['"]([^'"]+)['"]"#));

/// Mirror-rotating provider for Sci-Hub.
pub struct SciHubProvider {
    configured_mirrors: Vec<String>,
    discovery_url: Option<String>,
    timeout: Duration,
    rotation: OnceCell<MirrorRotation>,
}

impl std::fmt::Debug for SciHubProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SciHubProvider")
            .field("configured_mirrors", &self.configured_mirrors)
            .field("discovery_url", &self.discovery_url)
            .field("mirrors", &self.rotation.get())
            .finish_non_exhaustive()
    }
}

impl SciHubProvider {
    /// Builds the provider from its settings.
    #[must_use]
    pub fn new(settings: &ProviderSettings) -> Self {
        let discovery_url = settings.discover_mirrors.then(|| {
            settings
                .discovery_url
                .clone()
                .unwrap_or_else(|| DEFAULT_MIRROR_DISCOVERY_URL.to_string())
        });
        Self {
            configured_mirrors: settings.mirrors.clone(),
            discovery_url,
            timeout: probe_timeout(settings, DEFAULT_TIMEOUT_SECS),
            rotation: OnceCell::new(),
        }
    }

    /// Provider over a fixed mirror list with discovery disabled.
    #[must_use]
    pub fn with_mirrors<I, S>(mirrors: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            configured_mirrors: mirrors.into_iter().map(Into::into).collect(),
            discovery_url: None,
            timeout,
            rotation: OnceCell::new(),
        }
    }

    /// Remaining mirrors, head first; `None` before the first probe.
    #[must_use]
    pub fn mirror_snapshot(&self) -> Option<Vec<String>> {
        self.rotation.get().map(MirrorRotation::snapshot)
    }

    async fn rotation(&self, client: &RoutedClient) -> &MirrorRotation {
        self.rotation
            .get_or_init(|| self.initial_rotation(client))
            .await
    }

    async fn initial_rotation(&self, client: &RoutedClient) -> MirrorRotation {
        if let Some(discovery_url) = &self.discovery_url {
            match discover_mirrors(client, discovery_url).await {
                Ok(found) if !found.is_empty() => {
                    info!(count = found.len(), "discovered live mirrors");
                    return MirrorRotation::new(found);
                }
                Ok(_) => debug!("mirror listing had no entries; using configured mirrors"),
                Err(error) => warn!(error = %error, "mirror discovery failed; using configured mirrors"),
            }
        }
        if self.configured_mirrors.is_empty() {
            MirrorRotation::new(DEFAULT_MIRRORS)
        } else {
            MirrorRotation::new(&self.configured_mirrors)
        }
    }

    /// One request against one mirror.
    async fn probe(
        &self,
        mirror: &str,
        doi: &str,
        client: &RoutedClient,
    ) -> Result<Resolved, ProviderError> {
        let url = format!("{mirror}/{}", doi.trim());
        let response = client.get(&url, &RequestSpec::browser(self.timeout)).await?;
        let status = response.status();
        let pdf_body = is_pdf_content_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        );

        if status.is_success() && pdf_body {
            let bytes = response
                .bytes()
                .await
                .map_err(|e| ProviderError::network(NAME, &url, &e))?;
            debug!(mirror, len = bytes.len(), "mirror served the artifact directly");
            return Ok(Resolved::bytes(NAME, url, bytes.to_vec()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(NAME, &url, &e))?;

        if !status.is_success() {
            if BLOCK_STATUSES.contains(&status.as_u16()) || find_block_marker(&body).is_some() {
                return Err(ProviderError::blocked(
                    NAME,
                    &url,
                    format!("HTTP {}", status.as_u16()),
                ));
            }
            return Err(ProviderError::http_status(NAME, &url, status.as_u16()));
        }

        if let Some(link) = extract_payload_link(&body, &url) {
            debug!(mirror, link = %link, "payload link found on mirror page");
            return Ok(Resolved::url(NAME, link));
        }
        if let Some(marker) = find_block_marker(&body) {
            return Err(ProviderError::blocked(NAME, &url, marker));
        }
        Err(ProviderError::no_artifact(NAME, "no payload link on mirror page"))
    }
}

async fn discover_mirrors(
    client: &RoutedClient,
    discovery_url: &str,
) -> Result<Vec<String>, ProviderError> {
    let spec = RequestSpec::browser(Duration::from_secs(DISCOVERY_TIMEOUT_SECS));
    let html = client.get_text(discovery_url, &spec).await?;
    Ok(parse_mirror_listing(&html))
}

fn looks_like_payload_src(src: &str) -> bool {
    src.to_ascii_lowercase().contains(".pdf") || src.starts_with("http") || src.starts_with("//")
}

/// Finds the payload link on a mirror page.
///
/// Order: embedded viewer, iframe, `.pdf` anchor off the mirror's own host,
/// then a download button's `location.href`.
fn extract_payload_link(html: &str, page_url: &str) -> Option<String> {
    let page = Url::parse(page_url).ok()?;
    let mirror_host = page.host_str().unwrap_or_default().to_string();
    let document = Html::parse_document(html);

    for selector in ["embed[src]", "iframe[src]"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(link) = document
            .select(&selector)
            .filter_map(|el| el.value().attr("src"))
            .map(str::trim)
            .find(|src| looks_like_payload_src(src))
            .and_then(|src| absolutize_url(src, &page))
        {
            return Some(link);
        }
    }

    if let Ok(anchors) = Selector::parse("a[href]")
        && let Some(link) = document
            .select(&anchors)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| href.to_ascii_lowercase().contains(".pdf"))
            .filter_map(|href| absolutize_url(href, &page))
            .find(|link| !url_has_host(link, &mirror_host))
    {
        return Some(link);
    }

    let buttons = Selector::parse("button[onclick]").ok()?;
    document
        .select(&buttons)
        .filter_map(|el| el.value().attr("onclick"))
        .find_map(|onclick| {
            ONCLICK_LOCATION_RE
                .captures(onclick)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .and_then(|href| absolutize_url(&href, &page))
}

#[async_trait]
impl Provider for SciHubProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::MirrorRotating
    }

    #[tracing::instrument(skip(self, client), fields(provider = NAME))]
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError> {
        let rotation = self.rotation(client).await;
        let budget = MAX_MIRRORS_PER_CALL.min(rotation.remaining());
        if budget == 0 {
            return Err(ProviderError::unavailable(NAME, "all mirrors exhausted"));
        }

        let mut last_error = None;
        for _ in 0..budget {
            let Some(mirror) = rotation.current() else {
                break;
            };
            match self.probe(&mirror, doi, client).await {
                Ok(resolved) => return Ok(resolved),
                Err(error) if error.should_rotate_mirror() => {
                    let next = rotation.advance_from(&mirror);
                    warn!(
                        mirror = %mirror,
                        next = next.as_deref().unwrap_or("<none>"),
                        error = %error,
                        "mirror failed; rotating"
                    );
                    last_error = Some(error);
                }
                Err(error) => return Err(error),
            }
        }

        if rotation.remaining() == 0 {
            return Err(ProviderError::unavailable(NAME, "all mirrors exhausted"));
        }
        Err(last_error
            .unwrap_or_else(|| ProviderError::unavailable(NAME, "all mirrors exhausted")))
    }
}
