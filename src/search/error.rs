//! # Search Error Types Module
//!
//! Error types for the web-search collaborator used by the homepage resolver.

use thiserror::Error;

use crate::http::FetchError;

/// Errors that can occur while querying a search provider
#[derive(Debug, Error)]
pub enum SearchError {
    /// The provider is not configured
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    /// Transport failure talking to the provider
    #[error("Search transport error: {0}")]
    Transport(#[from] FetchError),

    /// The provider answered with a non-success status
    #[error("Search provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The response could not be interpreted
    #[error("Malformed search response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Malformed(err.to_string())
    }
}

impl From<SearchError> for crate::error::Error {
    fn from(err: SearchError) -> Self {
        crate::error::Error::Search(err.to_string())
    }
}
