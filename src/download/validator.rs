//! Structural checks applied to an artifact before it is kept.

use lopdf::Document;
use thiserror::Error;
use tracing::debug;

/// Smallest buffer accepted as a PDF.
pub const MIN_PDF_BYTES: usize = 100;

/// Window at the end of the buffer searched for the `%%EOF` trailer.
pub const TRAILER_WINDOW: usize = 1024;

const PDF_MAGIC: &[u8] = b"%PDF";
const EOF_MARKER: &[u8] = b"%EOF";

/// Why a buffer was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    /// Fewer than [`MIN_PDF_BYTES`] bytes.
    #[error("too small")]
    TooSmall,
    /// Does not start with `%PDF`.
    #[error("bad header")]
    BadHeader,
    /// No `%EOF` near the end.
    #[error("incomplete (no trailer)")]
    NoTrailer,
    /// Parses as a document with zero pages.
    #[error("no pages")]
    NoPages,
}

/// Validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Buffer accepted.
    Valid,
    /// Buffer rejected.
    Invalid(ValidationFailure),
}

impl Validation {
    /// True when accepted.
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Converts into a `Result` for `?` chains.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationFailure`] for rejected buffers.
    pub fn into_result(self) -> Result<(), ValidationFailure> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid(failure) => Err(failure),
        }
    }
}

/// Decides whether downloaded bytes are worth keeping.
pub trait Validator: Send + Sync {
    /// Checks `bytes`.
    fn validate(&self, bytes: &[u8]) -> Validation;
}

/// PDF structure check: size, magic, trailer, then page count when the
/// document parses.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfValidator;

impl PdfValidator {
    fn count_pages(bytes: &[u8]) -> Option<usize> {
        let document = match Document::load_mem(bytes) {
            Ok(document) => document,
            Err(error) => {
                debug!(error = %error, "pdf did not parse; skipping page count");
                return None;
            }
        };
        // Without a catalog there is no page tree to count.
        document.catalog().ok()?;
        Some(document.get_pages().len())
    }
}

impl Validator for PdfValidator {
    fn validate(&self, bytes: &[u8]) -> Validation {
        if bytes.len() < MIN_PDF_BYTES {
            return Validation::Invalid(ValidationFailure::TooSmall);
        }
        if !bytes.starts_with(PDF_MAGIC) {
            return Validation::Invalid(ValidationFailure::BadHeader);
        }
        let tail = &bytes[bytes.len().saturating_sub(TRAILER_WINDOW)..];
        if !tail.windows(EOF_MARKER.len()).any(|w| w == EOF_MARKER) {
            return Validation::Invalid(ValidationFailure::NoTrailer);
        }
        if Self::count_pages(bytes) == Some(0) {
            return Validation::Invalid(ValidationFailure::NoPages);
        }
        Validation::Valid
    }
}

/// Accepts everything; installed when validation is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _bytes: &[u8]) -> Validation {
        Validation::Valid
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use lopdf::{Object, dictionary};

    fn document_bytes(page_count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let kids: Vec<Object> = (0..page_count)
            .map(|_| {
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
                })
                .into()
            })
            .collect();
        let count = i64::try_from(kids.len()).unwrap();
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn unparseable_pdf() -> Vec<u8> {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(std::iter::repeat_n(b'x', 200));
        bytes.extend_from_slice(b"\n%%EOF\n");
        bytes
    }

    #[test]
    fn test_real_document_is_valid() {
        assert_eq!(PdfValidator.validate(&document_bytes(1)), Validation::Valid);
    }

    #[test]
    fn test_zero_page_document_rejected() {
        assert_eq!(
            PdfValidator.validate(&document_bytes(0)),
            Validation::Invalid(ValidationFailure::NoPages)
        );
    }

    #[test]
    fn test_too_small() {
        assert_eq!(
            PdfValidator.validate(b"%PDF-1.4 %%EOF"),
            Validation::Invalid(ValidationFailure::TooSmall)
        );
    }

    #[test]
    fn test_html_body_has_bad_header() {
        let html = format!("<html>{}</html>%%EOF", " ".repeat(200));
        assert_eq!(
            PdfValidator.validate(html.as_bytes()),
            Validation::Invalid(ValidationFailure::BadHeader)
        );
    }

    #[test]
    fn test_truncated_body_has_no_trailer() {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend(std::iter::repeat_n(b'a', 4096));
        assert_eq!(
            PdfValidator.validate(&bytes),
            Validation::Invalid(ValidationFailure::NoTrailer)
        );
    }

    #[test]
    fn test_trailer_outside_window_rejected() {
        let mut bytes = b"%PDF-1.7\n%%EOF\n".to_vec();
        bytes.extend(std::iter::repeat_n(b'a', TRAILER_WINDOW + 10));
        assert!(!PdfValidator.validate(&bytes).is_valid());
    }

    #[test]
    fn test_unparseable_body_skips_page_count() {
        assert!(PdfValidator.validate(&unparseable_pdf()).is_valid());
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(ValidationFailure::NoTrailer.to_string(), "incomplete (no trailer)");
        assert_eq!(ValidationFailure::TooSmall.to_string(), "too small");
    }

    #[test]
    fn test_accept_all() {
        assert!(AcceptAll.validate(b"").is_valid());
        assert_eq!(AcceptAll.validate(b"junk").into_result(), Ok(()));
    }
}
