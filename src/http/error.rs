//! Error types for the HTTP client layer

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for transport and content-guard failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connect or read timeout, after retries were exhausted
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// Connection could not be established
    #[error("connection to {url} failed: {detail}")]
    Connect { url: String, detail: String },

    /// Final response status was not a success
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The response is not an HTML document
    #[error("unsupported content type '{content_type}' at {url}")]
    UnsupportedContentType { url: String, content_type: String },

    /// The response body exceeds the configured ceiling
    #[error("body of {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    /// Any other request failure
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Client construction failed
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
}

impl FetchError {
    /// Classify a reqwest error for the given URL
    pub(crate) fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() {
            FetchError::Connect {
                url: url.to_string(),
                detail: err.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source: err,
            }
        }
    }

    /// Content guards are final; they are never retried.
    pub fn is_content_rejection(&self) -> bool {
        matches!(
            self,
            FetchError::UnsupportedContentType { .. } | FetchError::TooLarge { .. }
        )
    }
}

impl From<FetchError> for CrateError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Request { source, .. } => CrateError::Http(source),
            FetchError::Setup(msg) => CrateError::Config(msg),
            other => CrateError::Fetch(other.to_string()),
        }
    }
}
