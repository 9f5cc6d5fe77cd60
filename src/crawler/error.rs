//! Error types for the crawler module

use crate::error::Error as CrateError;
use thiserror::Error;

/// Error type for crawler operations
///
/// Only `ResolutionFailure` ends a crawl. Every other variant describes a skipped
/// page or a degraded stage and is reported through diagnostics.
#[derive(Debug, Clone, Error)]
pub enum CrawlError {
    /// No company homepage could be determined
    #[error("no homepage found for '{query}': {reason}")]
    ResolutionFailure { query: String, reason: String },

    /// No sitemap yielded page URLs; the crawl continues with the homepage only
    #[error("sitemap discovery failed for {base}: {reason}")]
    DiscoveryFailure { base: String, reason: String },

    /// robots.txt disallows the page
    #[error("{url} disallowed by robots.txt")]
    PolicyDenied { url: String },

    /// Network failure or deadline expiry
    #[error("{url} could not be fetched: {detail}")]
    TransportFailure { url: String, detail: String },

    /// Non-HTML document or oversized body
    #[error("{url} rejected: {reason}")]
    ContentRejected { url: String, reason: String },

    /// The page contained no usable text
    #[error("{url} yielded no text")]
    ExtractionEmpty { url: String },

    /// Invalid crawler setup
    #[error("crawler configuration error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlError::ResolutionFailure { .. } => "resolution_failure",
            CrawlError::DiscoveryFailure { .. } => "discovery_failure",
            CrawlError::PolicyDenied { .. } => "policy_denied",
            CrawlError::TransportFailure { .. } => "transport_failure",
            CrawlError::ContentRejected { .. } => "content_rejected",
            CrawlError::ExtractionEmpty { .. } => "extraction_empty",
            CrawlError::Config(_) => "config",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlError::ResolutionFailure { .. } | CrawlError::Config(_))
    }
}

impl From<CrawlError> for CrateError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Config(msg) => CrateError::Config(msg),
            other => CrateError::Crawl(other.to_string()),
        }
    }
}
