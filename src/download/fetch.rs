//! Fetches the payload a provider pointed at.
//!
//! The request goes through the provider's own routed client, so a payload
//! host is reached over the same route the provider uses.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderValue, REFERER};
use tracing::debug;

use crate::provider::utils::{has_pdf_extension, is_pdf_content_type};
use crate::routing::{RequestSpec, RoutedClient};

use super::error::FetchError;

/// Largest payload accepted.
pub const MAX_PAYLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Downloads `url` for `doi` and returns the body.
///
/// # Errors
///
/// Returns [`FetchError`] on transport failure, non-success status, a body
/// that is neither labelled nor named as a PDF, or one above
/// [`MAX_PAYLOAD_BYTES`].
#[tracing::instrument(skip(client), fields(provider = client.provider()))]
pub async fn fetch_payload(
    client: &RoutedClient,
    url: &str,
    doi: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let mut spec = RequestSpec::browser(timeout);
    if let Ok(referer) = HeaderValue::from_str(&format!("https://doi.org/{doi}")) {
        spec = spec.header(REFERER, referer);
    }

    let response = client.get(url, &spec).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if !is_pdf_content_type(content_type.as_deref()) && !has_pdf_extension(url) {
        return Err(FetchError::NotPdf {
            url: url.to_string(),
            content_type: content_type.unwrap_or_else(|| "none".to_string()),
        });
    }

    if let Some(length) = response.content_length()
        && length > MAX_PAYLOAD_BYTES
    {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if (body.len() + chunk.len()) as u64 > MAX_PAYLOAD_BYTES {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        body.extend_from_slice(&chunk);
    }

    debug!(len = body.len(), "payload fetched");
    Ok(body)
}
