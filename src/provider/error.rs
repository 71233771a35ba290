//! Error types for provider probes.
//!
//! Each variant maps onto one failure class the orchestrator reacts to:
//! network trouble and blocks rotate mirrors, HTTP and no-artifact outcomes
//! only count as a failed attempt.

use thiserror::Error;

/// Failure classes reported by [`ProviderError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, DNS, TLS, or timeout failure.
    Network,
    /// Non-success HTTP status.
    HttpStatus,
    /// The provider answered but had nothing downloadable.
    NoArtifact,
    /// Captcha or bot-detection page.
    Blocked,
}

/// Errors produced while asking a provider for an artifact.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Transport-level failure
    #[error("{provider}: network error fetching {url}: {message}")]
    Network {
        /// Provider that issued the request
        provider: String,
        /// URL that failed
        url: String,
        /// Transport error text
        message: String,
        /// Whether the failure was a timeout
        timed_out: bool,
    },

    /// Non-success status code
    #[error("{provider}: HTTP {status} from {url}")]
    HttpStatus {
        /// Provider that issued the request
        provider: String,
        /// URL that answered
        url: String,
        /// Status code
        status: u16,
    },

    /// Provider answered without a usable artifact
    #[error("{provider}: no artifact found ({reason})")]
    NoArtifact {
        /// Provider name
        provider: String,
        /// Why nothing was found
        reason: String,
    },

    /// Captcha or bot-detection response
    #[error("{provider}: blocked at {url} ({reason})")]
    Blocked {
        /// Provider name
        provider: String,
        /// URL that served the block page
        url: String,
        /// Marker that identified the block
        reason: String,
    },

    /// Body could not be decoded as the expected format
    #[error("{provider}: malformed response from {url}: {reason}")]
    InvalidResponse {
        /// Provider name
        provider: String,
        /// URL that answered
        url: String,
        /// Decode error
        reason: String,
    },

    /// Provider cannot run at all (exhausted mirrors, unusable endpoint)
    #[error("{provider}: unavailable: {reason}")]
    Unavailable {
        /// Provider name
        provider: String,
        /// Why it cannot run
        reason: String,
    },
}

impl ProviderError {
    /// Creates a `Network` error from a transport failure.
    #[must_use]
    pub fn network(provider: &str, url: &str, error: &reqwest::Error) -> Self {
        Self::Network {
            provider: provider.to_string(),
            url: url.to_string(),
            message: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }

    /// Creates an `HttpStatus` error.
    #[must_use]
    pub fn http_status(provider: &str, url: &str, status: u16) -> Self {
        Self::HttpStatus {
            provider: provider.to_string(),
            url: url.to_string(),
            status,
        }
    }

    /// Creates a `NoArtifact` error.
    #[must_use]
    pub fn no_artifact(provider: &str, reason: impl Into<String>) -> Self {
        Self::NoArtifact {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a `Blocked` error.
    #[must_use]
    pub fn blocked(provider: &str, url: &str, reason: impl Into<String>) -> Self {
        Self::Blocked {
            provider: provider.to_string(),
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidResponse` error.
    #[must_use]
    pub fn invalid_response(provider: &str, url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidResponse {
            provider: provider.to_string(),
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(provider: &str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider: provider.to_string(),
            reason: reason.into(),
        }
    }

    /// Failure class of this error.
    ///
    /// Decode failures and unusable providers count as "nothing found".
    #[must_use]
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::Network { .. } => ProviderErrorKind::Network,
            Self::HttpStatus { .. } => ProviderErrorKind::HttpStatus,
            Self::Blocked { .. } => ProviderErrorKind::Blocked,
            Self::NoArtifact { .. } | Self::InvalidResponse { .. } | Self::Unavailable { .. } => {
                ProviderErrorKind::NoArtifact
            }
        }
    }

    /// Whether a mirror that produced this error should be rotated out.
    #[must_use]
    pub fn should_rotate_mirror(&self) -> bool {
        matches!(
            self.kind(),
            ProviderErrorKind::Network | ProviderErrorKind::Blocked
        )
    }

    /// Name of the provider that raised the error.
    #[must_use]
    pub fn provider(&self) -> &str {
        match self {
            Self::Network { provider, .. }
            | Self::HttpStatus { provider, .. }
            | Self::NoArtifact { provider, .. }
            | Self::Blocked { provider, .. }
            | Self::InvalidResponse { provider, .. }
            | Self::Unavailable { provider, .. } => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_decode_and_unavailable_to_no_artifact() {
        let err = ProviderError::invalid_response("unpaywall", "http://x", "eof");
        assert_eq!(err.kind(), ProviderErrorKind::NoArtifact);
        let err = ProviderError::unavailable("scihub", "all mirrors exhausted");
        assert_eq!(err.kind(), ProviderErrorKind::NoArtifact);
    }

    #[test]
    fn test_rotation_only_for_network_and_blocked() {
        let blocked = ProviderError::blocked("scihub", "http://m", "captcha");
        assert!(blocked.should_rotate_mirror());

        let network = ProviderError::Network {
            provider: "scihub".to_string(),
            url: "http://m".to_string(),
            message: "connection refused".to_string(),
            timed_out: false,
        };
        assert!(network.should_rotate_mirror());

        assert!(!ProviderError::http_status("scihub", "http://m", 404).should_rotate_mirror());
        assert!(!ProviderError::no_artifact("scihub", "no link").should_rotate_mirror());
    }

    #[test]
    fn test_display_names_provider_and_status() {
        let err = ProviderError::http_status("arxiv", "https://arxiv.org/abs/1", 503);
        let msg = err.to_string();
        assert!(msg.contains("arxiv"), "{msg}");
        assert!(msg.contains("503"), "{msg}");
        assert_eq!(err.provider(), "arxiv");
        assert_eq!(err.kind(), ProviderErrorKind::HttpStatus);
    }
}
