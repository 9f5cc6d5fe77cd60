//! Error types for the lead-crawler crate

use thiserror::Error;

/// Result type for lead-crawler operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for lead-crawler operations
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Transport-level failure after retries were exhausted
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Web search error
    #[error("Search error: {0}")]
    Search(String),

    /// Summarization error
    #[error("Summarize error: {0}")]
    Summarize(String),

    /// Rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Web crawling error
    #[error("Crawl error: {0}")]
    Crawl(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
