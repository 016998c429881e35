//! Error types for image generation and editing.

use std::time::Duration;

/// Longest error body kept from an API response.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors that can occur while talking to the image service or driving the studio.
#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Billing is not enabled or quota is exhausted.
    #[error("billing error: {0}")]
    Billing(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Rate limit exceeded. Reported to the caller, never retried.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// Wait suggested by the `Retry-After` header.
        retry_after: Option<Duration>,
    },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// The API answered but the response carried no usable images.
    #[error("{0}")]
    NoImages(String),

    /// Invalid request parameters or form input.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 or a data URL.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (reading attachments, saving downloads).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for studio operations.
pub type Result<T> = std::result::Result<T, StudioError>;

/// Reads the `Retry-After` header as whole seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Redacts API keys and truncates long error bodies before they reach the user.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut cleaned = text
        .split_whitespace()
        .map(|word| {
            if word.starts_with("AIza") || word.contains("key=") {
                "[REDACTED]"
            } else {
                word
            }
        })
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN;
        while !cleaned.is_char_boundary(cut) {
            cut -= 1;
        }
        cleaned.truncate(cut);
        cleaned.push_str("...");
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    #[test]
    fn test_error_display() {
        let err = StudioError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = StudioError::ContentBlocked("Safety filter triggered".into());
        assert_eq!(err.to_string(), "content blocked: Safety filter triggered");

        let err = StudioError::NoImages("The API did not return any images in the response.".into());
        assert_eq!(
            err.to_string(),
            "The API did not return any images in the response."
        );
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));
        assert_eq!(parse_retry_after(&headers), Some(30));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let msg = sanitize_error_message("bad request for AIzaSyD-secret at url?key=abc");
        assert!(!msg.contains("AIzaSyD-secret"));
        assert!(!msg.contains("key=abc"));
        assert!(msg.contains("[REDACTED]"));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(2000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.len(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }
}
