//! Error types for bibliography loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading a bibliography file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// File could not be read (missing, unreadable, or not UTF-8)
    #[error("cannot read bibliography '{path}': {source}\n  Suggestion: check the path and that the file is UTF-8 RIS text")]
    Read {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}
