//! # Web Search Module
//!
//! This module defines the search collaborator the homepage resolver queries to turn
//! a company name into candidate websites. Providers return a single page of
//! organic results; ranking them is the resolver's job.
//!
//! ## Key Components
//!
//! - `SearchHit`: One organic result (title, url, snippet)
//! - `SearchProvider`: The injectable search interface
//! - `SerperSearch`: Google results through the Serper API

mod error;
mod serper;

pub use error::SearchError;
pub use serper::SerperSearch;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single organic search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
}

impl SearchHit {
    pub fn new(title: impl Into<String>, url: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }
}

/// Web search collaborator
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query and return a single page of results
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;
}

/// Fixed results, for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticSearch {
    hits: Vec<SearchHit>,
}

impl StaticSearch {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Ok(self.hits.clone())
    }
}
