//! Search-page scrapers.
//!
//! Each [`ScrapeSite`] describes one search page: how to build the query URL,
//! which link pattern to pull out of the body, how many matches to inspect,
//! and which of those to accept. [`ScrapeProvider`] runs any site.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderValue, REFERER};
use tracing::debug;
use url::Url;

use crate::config::ProviderSettings;
use crate::routing::{RequestSpec, RoutedClient};

use super::utils::{absolutize_url, compile_static_regex, find_block_marker};
use super::{Provider, ProviderError, ProviderKind, Resolved, endpoint_base, probe_timeout};

static PDF_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)href=["']([^"']*\.pdf[^"']*)["']"#));

static PDF_PATH_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)href=["']([^"']*/pdf/[^"']*)["']"#));

static FULLTEXT_PDF_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)href=["']([^"']*/fullText/pdf/[^"']*)["']"#));

static OPEN_ACCESS_TEXT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)openAccess="Y"[^>]*>([^<]+)<"#));

/// Pattern used to pull candidate links out of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPattern {
    /// `href` values containing `.pdf`.
    PdfHref,
    /// `href` values containing a `/pdf/` path segment.
    PdfPathHref,
    /// `href` values containing `/fullText/pdf/`.
    FullTextPdfHref,
    /// Text of XML elements flagged `openAccess="Y"`.
    OpenAccessText,
}

impl LinkPattern {
    fn regex(self) -> &'static Regex {
        match self {
            Self::PdfHref => &PDF_HREF_RE,
            Self::PdfPathHref => &PDF_PATH_HREF_RE,
            Self::FullTextPdfHref => &FULLTEXT_PDF_HREF_RE,
            Self::OpenAccessText => &OPEN_ACCESS_TEXT_RE,
        }
    }
}

/// Which candidates a site accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFilter {
    /// Every candidate.
    Any,
    /// Candidates starting with an absolute `http(s)` scheme.
    Absolute,
    /// Candidates starting with the given prefix.
    StartsWith(&'static str),
    /// Candidates containing the given text, case-insensitive.
    Contains(&'static str),
}

impl LinkFilter {
    fn accepts(self, link: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Absolute => link.starts_with("http://") || link.starts_with("https://"),
            Self::StartsWith(prefix) => link.starts_with(prefix),
            Self::Contains(needle) => link
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
        }
    }
}

/// Query URL shape of a site's search endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchQuery {
    /// `{base}{path}{encoded doi}`.
    Encoded(&'static str),
    /// `{base}{path}{raw doi}{suffix}`.
    Raw(&'static str, &'static str),
}

impl SearchQuery {
    fn build(self, base: &str, doi: &str) -> String {
        match self {
            Self::Encoded(path) => format!("{base}{path}{}", urlencoding::encode(doi)),
            Self::Raw(path, suffix) => format!("{base}{path}{doi}{suffix}"),
        }
    }
}

/// Static description of one scraped search page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSite {
    /// Provider name.
    pub name: &'static str,
    default_base: &'static str,
    query: SearchQuery,
    pattern: LinkPattern,
    scan_limit: usize,
    filter: LinkFilter,
    default_timeout_secs: u64,
}

impl ScrapeSite {
    /// CORE aggregator search.
    pub const CORE: Self = Self {
        name: "core",
        default_base: "https://core.ac.uk",
        query: SearchQuery::Encoded("/search?q="),
        pattern: LinkPattern::PdfHref,
        scan_limit: 3,
        filter: LinkFilter::StartsWith("https://core.ac.uk/download"),
        default_timeout_secs: 15,
    };

    /// Europe PMC REST search (XML).
    pub const EUROPE_PMC: Self = Self {
        name: "europe-pmc",
        default_base: "https://www.ebi.ac.uk/europepmc/webservices/rest",
        query: SearchQuery::Raw("/search?query=DOI:", "&resulttype=core"),
        pattern: LinkPattern::OpenAccessText,
        scan_limit: 3,
        filter: LinkFilter::Contains("pdf"),
        default_timeout_secs: 10,
    };

    /// PubMed search page.
    pub const PUBMED: Self = Self {
        name: "pubmed",
        default_base: "https://pubmed.ncbi.nlm.nih.gov",
        query: SearchQuery::Encoded("/?term="),
        pattern: LinkPattern::PdfPathHref,
        scan_limit: 2,
        filter: LinkFilter::Contains("pdf"),
        default_timeout_secs: 10,
    };

    /// Paperity search page.
    pub const PAPERITY: Self = Self {
        name: "paperity",
        default_base: "https://paperity.org",
        query: SearchQuery::Encoded("/search/?q="),
        pattern: LinkPattern::PdfHref,
        scan_limit: 3,
        filter: LinkFilter::Contains("download"),
        default_timeout_secs: 10,
    };

    /// Google Scholar results page.
    pub const GOOGLE_SCHOLAR: Self = Self {
        name: "google-scholar",
        default_base: "https://scholar.google.com",
        query: SearchQuery::Encoded("/scholar?q="),
        pattern: LinkPattern::PdfHref,
        scan_limit: 2,
        filter: LinkFilter::Absolute,
        default_timeout_secs: 20,
    };

    /// ResearchGate search page.
    pub const RESEARCHGATE: Self = Self {
        name: "researchgate",
        default_base: "https://www.researchgate.net",
        query: SearchQuery::Encoded("/search?q="),
        pattern: LinkPattern::FullTextPdfHref,
        scan_limit: 2,
        filter: LinkFilter::Any,
        default_timeout_secs: 20,
    };

    /// First accepted candidate among the first `scan_limit` matches.
    fn pick_link(&self, body: &str) -> Option<String> {
        self.pattern
            .regex()
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().replace("&amp;", "&"))
            .filter(|link| !link.is_empty())
            .take(self.scan_limit)
            .find(|link| self.filter.accepts(link))
    }
}

/// Runs a [`ScrapeSite`] against its search page.
#[derive(Debug)]
pub struct ScrapeProvider {
    site: ScrapeSite,
    base_url: String,
    timeout: Duration,
}

impl ScrapeProvider {
    /// Builds a scraper for `site`.
    #[must_use]
    pub fn new(site: ScrapeSite, settings: &ProviderSettings) -> Self {
        Self {
            base_url: endpoint_base(settings, site.default_base),
            timeout: probe_timeout(settings, site.default_timeout_secs),
            site,
        }
    }

    /// Search URL for `doi`.
    #[must_use]
    pub fn search_url(&self, doi: &str) -> String {
        self.site.query.build(&self.base_url, doi.trim())
    }
}

#[async_trait]
impl Provider for ScrapeProvider {
    fn name(&self) -> &str {
        self.site.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Scrape
    }

    #[tracing::instrument(skip(self, client), fields(provider = self.site.name))]
    async fn resolve(&self, doi: &str, client: &RoutedClient) -> Result<Resolved, ProviderError> {
        let name = self.site.name;
        let search_url = self.search_url(doi);
        let spec = RequestSpec::browser(self.timeout)
            .header(REFERER, HeaderValue::from_static("https://www.google.com/"));
        let body = client.get_text(&search_url, &spec).await?;

        let Some(link) = self.site.pick_link(&body) else {
            if let Some(marker) = find_block_marker(&body) {
                return Err(ProviderError::blocked(name, &search_url, marker));
            }
            return Err(ProviderError::no_artifact(name, "no PDF link on search page"));
        };

        let page = Url::parse(&search_url)
            .map_err(|e| ProviderError::invalid_response(name, &search_url, e.to_string()))?;
        let pdf_url = absolutize_url(&link, &page)
            .ok_or_else(|| ProviderError::invalid_response(name, &search_url, "unusable link"))?;
        debug!(pdf_url = %pdf_url, "link found on search page");
        Ok(Resolved::url(name, pdf_url))
    }
}
