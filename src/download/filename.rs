//! Artifact filenames derived from bibliographic metadata.
//!
//! Pattern: `{year}-{journal}-{firstAuthor}-{provider}.pdf`, each component
//! defaulting to `Unknown`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::parser::{Metadata, UNKNOWN};

/// Longest stem, in characters, before the extension.
pub const MAX_STEM_CHARS: usize = 180;

/// Extension of saved artifacts.
pub const ARTIFACT_EXTENSION: &str = "pdf";

/// Suffix of the temporary file an artifact is written to before validation.
pub const PARTIAL_SUFFIX: &str = "part";

/// Source of per-write tokens for partial files.
static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Removes characters that are illegal in filenames on common filesystems.
pub(crate) fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
        .filter(|c| !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('.');
    if cleaned.is_empty() {
        UNKNOWN.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Builds the filename stem for an artifact.
#[must_use]
pub fn build_artifact_stem(metadata: &Metadata, provider: &str) -> String {
    let stem = [
        metadata.year(),
        metadata.journal(),
        metadata.first_author(),
        provider,
    ]
    .iter()
    .map(|part| sanitize_component(part))
    .collect::<Vec<_>>()
    .join("-");
    truncate_chars(&stem, MAX_STEM_CHARS)
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => value[..byte_index].trim_end().to_string(),
        None => value.to_string(),
    }
}

/// Final artifact path for `stem` inside `output_dir`.
#[must_use]
pub fn artifact_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{stem}.{ARTIFACT_EXTENSION}"))
}

/// Temporary path an artifact is written to before it is validated.
///
/// Unique per call, so writers that share a stem never share a partial file.
#[must_use]
pub fn partial_path(output_dir: &Path, stem: &str) -> PathBuf {
    let token = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();
    output_dir.join(format!(
        "{stem}.{pid}-{token}.{ARTIFACT_EXTENSION}.{PARTIAL_SUFFIX}"
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn metadata(year: &str, journal: &str, author: &str) -> Metadata {
        Metadata {
            year: Some(year.to_string()),
            journal: Some(journal.to_string()),
            first_author: Some(author.to_string()),
            title: None,
        }
    }

    #[test]
    fn test_stem_from_full_metadata() {
        let stem = build_artifact_stem(&metadata("2020", "Nature", "Smith"), "unpaywall");
        assert_eq!(stem, "2020-Nature-Smith-unpaywall");
    }

    #[test]
    fn test_stem_defaults_missing_components() {
        let stem = build_artifact_stem(&Metadata::default(), "arxiv");
        assert_eq!(stem, "Unknown-Unknown-Unknown-arxiv");
    }

    #[test]
    fn test_stem_strips_illegal_characters() {
        let stem = build_artifact_stem(&metadata("2021", "A/B: C?", "O\"Neil|x"), "core");
        assert_eq!(stem, "2021-AB C-ONeilx-core");
    }

    #[test]
    fn test_component_of_only_illegal_characters_becomes_unknown() {
        assert_eq!(sanitize_component("<>|"), "Unknown");
        assert_eq!(sanitize_component("\u{7}"), "Unknown");
    }

    #[test]
    fn test_stem_bounded_on_char_boundary() {
        let journal = "é".repeat(400);
        let stem = build_artifact_stem(&metadata("2019", &journal, "Li"), "scihub");
        assert_eq!(stem.chars().count(), MAX_STEM_CHARS);
        assert!(stem.starts_with("2019-é"));
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("/tmp/out");
        assert_eq!(artifact_path(dir, "a"), PathBuf::from("/tmp/out/a.pdf"));
        let partial = partial_path(dir, "a");
        assert_eq!(partial.parent(), Some(dir));
        let name = partial.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("a."), "{name}");
        assert!(name.ends_with(".pdf.part"), "{name}");
    }

    #[test]
    fn test_partial_paths_never_repeat_for_one_stem() {
        let dir = Path::new("/tmp/out");
        let first = partial_path(dir, "Unknown-Unknown-Unknown-scihub");
        let second = partial_path(dir, "Unknown-Unknown-Unknown-scihub");
        assert_ne!(first, second);
    }
}
