//! Error types for the search module.
//!
//! [`SearchError`] is what one call to a [`SearchClient`](super::SearchClient)
//! can fail with. Whether a failure is worth another attempt is decided by
//! [`classify`](super::classify), never by the client itself.

use thiserror::Error;

/// Maximum number of response-body bytes kept on an API error.
pub const MAX_ERROR_BODY_BYTES: usize = 8192;

/// Errors that can occur during a single search API call.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The API answered with a non-200 status.
    #[error("{}", api_error_message(*status, status_text, body))]
    Api {
        /// The HTTP status code.
        status: u16,
        /// Status line text, e.g. `429 Too Many Requests`.
        status_text: String,
        /// Trimmed excerpt of the response body (at most 8 KiB).
        body: String,
    },

    /// Network-level failure (DNS, connection refused, TLS, proxy, etc.)
    #[error("network error calling search API: {source}")]
    Network {
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete before the client timeout.
    #[error("timeout calling search API")]
    Timeout,

    /// A 200 response whose body could not be decoded.
    #[error("failed to decode search response: {message}")]
    Decode {
        /// Decoder error description.
        message: String,
    },

    /// The request URL could not be built.
    #[error("invalid search request: {message}")]
    InvalidRequest {
        /// What was wrong with the request.
        message: String,
    },
}

impl SearchError {
    /// Creates an API status error, trimming and capping the body excerpt.
    pub fn api(status: u16, status_text: impl Into<String>, body: &str) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            body: excerpt(body),
        }
    }

    /// Creates a transport error, mapping reqwest timeouts to [`SearchError::Timeout`].
    pub fn transport(source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout
        } else {
            Self::Network { source }
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns the HTTP status for API errors.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn api_error_message(status: u16, status_text: &str, body: &str) -> String {
    if body.is_empty() {
        format!("api error: status={status} ({status_text})")
    } else {
        format!("api error: status={status} ({status_text}): {body}")
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_ERROR_BODY_BYTES {
        return trimmed.to_string();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}
