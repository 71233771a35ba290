//! Error types for payload acquisition and persistence.

use std::path::PathBuf;

use thiserror::Error;

use crate::provider::{ProviderError, ProviderErrorKind};

use super::validator::ValidationFailure;

/// Errors fetching the payload a provider pointed at.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Request failed before a response arrived.
    #[error(transparent)]
    Request(#[from] ProviderError),

    /// Payload host answered with a non-success status.
    #[error("HTTP {status}")]
    HttpStatus {
        /// Payload URL
        url: String,
        /// Status code
        status: u16,
    },

    /// Neither the content type nor the URL suggested a PDF.
    #[error("not a PDF (content-type {content_type})")]
    NotPdf {
        /// Payload URL
        url: String,
        /// Reported content type, or `none`
        content_type: String,
    },

    /// Body exceeded the size cap.
    #[error("payload larger than {limit} bytes")]
    TooLarge {
        /// Payload URL
        url: String,
        /// Cap in bytes
        limit: u64,
    },

    /// Body stream broke mid-transfer.
    #[error("error reading body from {url}: {message}")]
    Body {
        /// Payload URL
        url: String,
        /// Transport error text
        message: String,
    },
}

impl FetchError {
    /// True for transport failures.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Request(error) => error.kind() == ProviderErrorKind::Network,
            Self::Body { .. } => true,
            Self::HttpStatus { .. } | Self::NotPdf { .. } | Self::TooLarge { .. } => false,
        }
    }
}

/// Errors writing an artifact to disk.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Temporary file could not be written.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Temporary file could not be moved into place.
    #[error("failed to rename {from} to {to}: {source}")]
    Rename {
        /// Temporary path
        from: PathBuf,
        /// Final path
        to: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Everything that can go wrong between a provider's answer and a saved file.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Payload fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Bytes arrived but were rejected.
    #[error("validation failed: {0}")]
    Invalid(#[from] ValidationFailure),

    /// Bytes were accepted but could not be saved.
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl AcquireError {
    /// True for transport failures.
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetch(error) if error.is_network())
    }
}
