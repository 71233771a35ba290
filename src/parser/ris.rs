//! RIS bibliography parsing.
//!
//! Lines look like `TAG  - value`. A record ends at `ER`. Only the tags needed
//! for fetching and naming are read; everything else is ignored.

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::provider::utils::compile_static_regex;

use super::{BibEntry, Metadata, ParseError};

static RIS_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r"^([A-Z][A-Z0-9])\s*-(?:\s+(.*))?$"));

/// Characters removed from journal names.
const JOURNAL_STRIP: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Prefixes commonly pasted in front of a DOI.
const DOI_PREFIXES: [&str; 4] = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"];

/// Outcome of parsing one RIS document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RisParseResult {
    /// Entries in file order, one per distinct DOI.
    pub entries: Vec<BibEntry>,
    /// Records without a DOI.
    pub skipped_records: usize,
    /// Records whose DOI repeated an earlier one.
    pub duplicate_dois: usize,
}

#[derive(Debug, Default)]
struct RecordBuilder {
    doi: Option<String>,
    metadata: Metadata,
    has_fields: bool,
}

impl RecordBuilder {
    fn apply(&mut self, tag: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.has_fields = true;
        match tag {
            "DO" if self.doi.is_none() => self.doi = normalize_doi(value),
            "PY" | "Y1" if self.metadata.year.is_none() => {
                self.metadata.year = Some(value.chars().take(4).collect());
            }
            "T2" | "J9" | "JI" | "JO" | "JF" if self.metadata.journal.is_none() => {
                let journal: String = value.chars().filter(|c| !JOURNAL_STRIP.contains(c)).collect();
                let journal = journal.trim();
                if !journal.is_empty() {
                    self.metadata.journal = Some(journal.to_string());
                }
            }
            "AU" | "A1" if self.metadata.first_author.is_none() => {
                let family = value.split(',').next().unwrap_or(value).trim();
                self.metadata.first_author = Some(family.to_string());
            }
            "TI" | "T1" if self.metadata.title.is_none() => {
                self.metadata.title = Some(value.to_string());
            }
            _ => {}
        }
    }
}

/// Strips resolver prefixes and whitespace; `None` when nothing DOI-like remains.
fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in DOI_PREFIXES {
        if let Some(head) = doi.get(..prefix.len())
            && head.eq_ignore_ascii_case(prefix)
        {
            doi = doi[prefix.len()..].trim();
        }
    }
    if doi.starts_with("10.") && doi.contains('/') {
        Some(doi.to_string())
    } else {
        None
    }
}

/// Parses RIS text into entries.
#[must_use]
pub fn parse_ris(text: &str) -> RisParseResult {
    let mut result = RisParseResult::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut record = RecordBuilder::default();

    let mut finish = |record: RecordBuilder, result: &mut RisParseResult| {
        if !record.has_fields {
            return;
        }
        match record.doi {
            Some(doi) => {
                if seen.insert(doi.to_ascii_lowercase()) {
                    result.entries.push(BibEntry::with_metadata(doi, record.metadata));
                } else {
                    debug!(doi = %doi, "duplicate DOI skipped");
                    result.duplicate_dois += 1;
                }
            }
            None => result.skipped_records += 1,
        }
    };

    for line in text.trim_start_matches('\u{feff}').lines() {
        let line = line.trim();
        let Some(caps) = RIS_LINE_RE.captures(line) else {
            continue;
        };
        let tag = caps.get(1).map_or("", |m| m.as_str());
        if tag == "ER" {
            finish(std::mem::take(&mut record), &mut result);
            continue;
        }
        let value = caps.get(2).map_or("", |m| m.as_str().trim());
        record.apply(tag, value);
    }
    finish(record, &mut result);

    result
}

/// Reads and parses a RIS file.
///
/// # Errors
///
/// Returns [`ParseError::Read`] when the file cannot be read as UTF-8.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn load_ris(path: &Path) -> Result<RisParseResult, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let result = parse_ris(&text);
    info!(
        entries = result.entries.len(),
        skipped = result.skipped_records,
        duplicates = result.duplicate_dois,
        "parsed bibliography"
    );
    Ok(result)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const TWO_RECORDS: &str = "\
TY  - JOUR
AU  - Smith, John
AU  - Doe, Jane
PY  - 2020/05/01
T2  - Journal of Things: A/B
TI  - On things
DO  - 10.1000/abc
ER  -

TY  - JOUR
DO  - https://doi.org/10.2000/XYZ
JI  - J. Other
ER  -
";

    #[test]
    fn test_parse_two_records() {
        let result = parse_ris(TWO_RECORDS);
        assert_eq!(result.entries.len(), 2);

        let first = &result.entries[0];
        assert_eq!(first.doi, "10.1000/abc");
        assert_eq!(first.metadata.year(), "2020");
        assert_eq!(first.metadata.journal(), "Journal of Things AB");
        assert_eq!(first.metadata.first_author(), "Smith");
        assert_eq!(first.metadata.title(), "On things");

        let second = &result.entries[1];
        assert_eq!(second.doi, "10.2000/XYZ");
        assert_eq!(second.metadata.journal(), "J. Other");
        // Fields never leak from the previous record.
        assert_eq!(second.metadata.year(), "Unknown");
        assert_eq!(second.metadata.first_author(), "Unknown");
    }

    #[test]
    fn test_first_journal_tag_wins() {
        let text = "DO  - 10.1/x\nJ9  - ABBR\nT2  - Full Name\nER  -\n";
        let result = parse_ris(text);
        assert_eq!(result.entries[0].metadata.journal(), "ABBR");
    }

    #[test]
    fn test_record_without_doi_is_skipped() {
        let text = "TY  - BOOK\nTI  - No identifier\nER  -\nDO  - 10.1/y\nER  -\n";
        let result = parse_ris(text);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.skipped_records, 1);
    }

    #[test]
    fn test_duplicate_doi_case_insensitive_keeps_first() {
        let text = "DO  - 10.1/AbC\nPY  - 2001\nER  -\nDO  - 10.1/abc\nPY  - 2002\nER  -\n";
        let result = parse_ris(text);
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].metadata.year(), "2001");
        assert_eq!(result.duplicate_dois, 1);
    }

    #[test]
    fn test_trailing_record_without_er_is_kept() {
        let result = parse_ris("\u{feff}TY  - JOUR\nDO  - 10.5/tail\n");
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.entries[0].doi, "10.5/tail");
    }

    #[test]
    fn test_non_doi_value_not_accepted() {
        let result = parse_ris("DO  - not-a-doi\nER  -\n");
        assert!(result.entries.is_empty());
        assert_eq!(result.skipped_records, 1);
    }

    #[test]
    fn test_normalize_doi_prefixes() {
        assert_eq!(normalize_doi("doi:10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("HTTPS://DOI.ORG/10.1/x").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("  10.1/x  ").as_deref(), Some("10.1/x"));
        assert_eq!(normalize_doi("10.1"), None);
    }

    #[test]
    fn test_load_ris_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_ris(&dir.path().join("none.ris")).unwrap_err();
        assert!(matches!(err, ParseError::Read { .. }));
    }

    #[test]
    fn test_load_ris_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refs.ris");
        std::fs::write(&path, TWO_RECORDS).unwrap();
        assert_eq!(load_ris(&path).unwrap().entries.len(), 2);
    }
}
