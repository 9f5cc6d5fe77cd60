//! # lead-crawler - Company Website Research for Rust
//!
//! This crate finds a company's website from its name, crawls the pages that
//! describe the organization (imprint, contact, team, about, locations) and turns
//! them into a summarized research report for lead qualification.
//!
//! ## Features
//!
//! - Homepage resolution from web search with platform exclusion
//! - Sitemap discovery with relevance-ranked child sitemaps
//! - Polite crawling: robots.txt, shared request pacing, bounded concurrency
//! - Layered content extraction with an optional headless-rendering fallback
//! - LLM summarization through `rig`, rate-limited with `governor`
//! - Degrades to partial results instead of failing
//!
//! ## Example
//!
//! ```rust,no_run
//! use lead_crawler::crawler::{Crawler, CrawlerConfig};
//! use lead_crawler::http::HttpClient;
//! use lead_crawler::model::Client;
//! use lead_crawler::search::SerperSearch;
//! use lead_crawler::summarize::AgentSummarizer;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CrawlerConfig::default();
//!     let http = HttpClient::new(&config)?;
//!
//!     let crawler = Crawler::builder(config)
//!         .search(Arc::new(SerperSearch::from_env(http)?))
//!         .summarizer(Arc::new(AgentSummarizer::new(
//!             Client::new_gemini_from_env()?.into_completion(),
//!         )))
//!         .build()?;
//!
//!     let report = crawler.crawl("Acme GmbH", Some("80331")).await;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```

mod error;
pub mod model;

pub mod crawler;
pub mod http;
pub mod render;
pub mod robots;
pub mod search;
pub mod summarize;

pub use error::Error;

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::crawler::{CrawlError, CrawlQuery, CrawlReport, Crawler, CrawlerConfig};
    pub use crate::error::Error;
    pub use crate::error::Result;
}
