//! Per-identifier bibliographic metadata.

use serde::Serialize;

/// Placeholder for any missing metadata field.
pub const UNKNOWN: &str = "Unknown";

/// Bibliographic fields used for naming artifacts.
///
/// Every field is optional; accessors substitute [`UNKNOWN`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Publication year (four characters at most).
    pub year: Option<String>,
    /// Journal or secondary title.
    pub journal: Option<String>,
    /// Family name of the first author.
    pub first_author: Option<String>,
    /// Article title.
    pub title: Option<String>,
}

fn or_unknown(value: Option<&String>) -> &str {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN)
}

impl Metadata {
    /// Year or `Unknown`.
    #[must_use]
    pub fn year(&self) -> &str {
        or_unknown(self.year.as_ref())
    }

    /// Journal or `Unknown`.
    #[must_use]
    pub fn journal(&self) -> &str {
        or_unknown(self.journal.as_ref())
    }

    /// First author or `Unknown`.
    #[must_use]
    pub fn first_author(&self) -> &str {
        or_unknown(self.first_author.as_ref())
    }

    /// Title or `Unknown`.
    #[must_use]
    pub fn title(&self) -> &str {
        or_unknown(self.title.as_ref())
    }
}

/// One identifier to fetch plus its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BibEntry {
    /// DOI, trimmed and stripped of resolver prefixes.
    pub doi: String,
    /// Naming metadata.
    pub metadata: Metadata,
}

impl BibEntry {
    /// Entry with no metadata.
    #[must_use]
    pub fn new(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            metadata: Metadata::default(),
        }
    }

    /// Entry with metadata.
    #[must_use]
    pub fn with_metadata(doi: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            doi: doi.into(),
            metadata,
        }
    }
}
