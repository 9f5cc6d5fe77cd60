//! # Crawler Configuration Module
//!
//! This module provides configuration options for the company-website crawler:
//! identity headers, politeness pacing, concurrency and page budgets, sitemap
//! recursion bounds, timeouts and retry policy, and the thresholds that drive
//! content extraction and the rendering fallback. It uses a builder pattern for
//! flexible configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! The defaults are tuned for polite crawling of small company sites.

use std::time::Duration;

/// Browser-like identity sent with every request.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; LeadCrawler/0.1; +https://example.com/bot)";

/// Product token matched against `User-agent:` groups in robots.txt.
pub const DEFAULT_ROBOTS_AGENT: &str = "LeadCrawler";

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// User agent to use for requests
    pub user_agent: String,

    /// Agent token used when evaluating robots.txt rules
    pub robots_user_agent: String,

    /// Value of the `Accept-Language` header
    pub accept_language: String,

    /// Minimum interval in milliseconds between two outbound requests
    pub rate_limit_ms: u64,

    /// Number of pages fetched concurrently
    pub max_workers: usize,

    /// Maximum number of pages selected for fetching, homepage included
    pub max_pages: usize,

    /// Maximum sitemap recursion depth
    pub sitemap_max_depth: usize,

    /// Number of child sitemaps expanded from a top-level sitemap index
    pub max_child_sitemaps: usize,

    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Per-request timeout in milliseconds
    pub read_timeout_ms: u64,

    /// Retries for transient failures, not counting the first attempt
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential retry backoff
    pub backoff_base_ms: u64,

    /// Largest response body accepted, in bytes
    pub max_body_bytes: usize,

    /// Text length a main-content container must exceed to be accepted
    pub min_main_content_chars: usize,

    /// Text length a heading section must exceed to be kept
    pub min_section_chars: usize,

    /// Pages whose extractable text is shorter than this are rendered
    pub render_min_text_chars: usize,

    /// Wall-clock budget in milliseconds for one rendering attempt
    pub render_budget_ms: u64,

    /// Overall deadline in milliseconds for the fetch stage of a crawl
    pub crawl_deadline_ms: u64,

    /// Fall back to homepage navigation links when no sitemap yields pages
    pub navigation_fallback: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            robots_user_agent: DEFAULT_ROBOTS_AGENT.to_string(),
            accept_language: "de-DE,de;q=0.9,en;q=0.8".to_string(),
            rate_limit_ms: 500,
            max_workers: 4,
            max_pages: 8,
            sitemap_max_depth: 2,
            max_child_sitemaps: 3,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 15_000,
            max_retries: 2,
            backoff_base_ms: 300,
            max_body_bytes: 10 * 1024 * 1024,
            min_main_content_chars: 120,
            min_section_chars: 30,
            render_min_text_chars: 200,
            render_budget_ms: 25_000,
            crawl_deadline_ms: 180_000,
            navigation_fallback: false,
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the agent token used for robots.txt matching
    pub fn robots_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.robots_user_agent = agent.into();
        self
    }

    /// Set the `Accept-Language` header value
    pub fn accept_language(mut self, accept_language: impl Into<String>) -> Self {
        self.config.accept_language = accept_language.into();
        self
    }

    /// Set the minimum interval in milliseconds between requests
    pub fn rate_limit_ms(mut self, rate_limit_ms: u64) -> Self {
        self.config.rate_limit_ms = rate_limit_ms;
        self
    }

    /// Set the number of concurrent fetch workers
    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    /// Set the maximum number of pages to fetch
    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the maximum sitemap recursion depth
    pub fn sitemap_max_depth(mut self, depth: usize) -> Self {
        self.config.sitemap_max_depth = depth;
        self
    }

    /// Set how many child sitemaps of a top-level index are expanded
    pub fn max_child_sitemaps(mut self, count: usize) -> Self {
        self.config.max_child_sitemaps = count;
        self
    }

    /// Set the connect timeout in milliseconds
    pub fn connect_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.connect_timeout_ms = timeout_ms;
        self
    }

    /// Set the per-request timeout in milliseconds
    pub fn read_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.read_timeout_ms = timeout_ms;
        self
    }

    /// Set the retry count for transient failures
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the base backoff delay in milliseconds
    pub fn backoff_base_ms(mut self, backoff_ms: u64) -> Self {
        self.config.backoff_base_ms = backoff_ms;
        self
    }

    /// Set the response body ceiling in bytes
    pub fn max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.config.max_body_bytes = max_body_bytes;
        self
    }

    /// Set the minimum text length of an accepted main-content container
    pub fn min_main_content_chars(mut self, chars: usize) -> Self {
        self.config.min_main_content_chars = chars;
        self
    }

    /// Set the minimum text length of a kept heading section
    pub fn min_section_chars(mut self, chars: usize) -> Self {
        self.config.min_section_chars = chars;
        self
    }

    /// Set the text length below which a page is rendered
    pub fn render_min_text_chars(mut self, chars: usize) -> Self {
        self.config.render_min_text_chars = chars;
        self
    }

    /// Set the rendering budget in milliseconds
    pub fn render_budget_ms(mut self, budget_ms: u64) -> Self {
        self.config.render_budget_ms = budget_ms;
        self
    }

    /// Set the overall crawl deadline in milliseconds
    pub fn crawl_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.config.crawl_deadline_ms = deadline_ms;
        self
    }

    /// Enable or disable the navigation-link discovery fallback
    pub fn navigation_fallback(mut self, enabled: bool) -> Self {
        self.config.navigation_fallback = enabled;
        self
    }

    /// Build the configuration
    pub fn build(mut self) -> CrawlerConfig {
        self.config.max_workers = self.config.max_workers.max(1);
        self.config.max_pages = self.config.max_pages.max(1);
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the rate limit as a Duration
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn render_budget(&self) -> Duration {
        Duration::from_millis(self.render_budget_ms)
    }

    pub fn crawl_deadline(&self) -> Duration {
        Duration::from_millis(self.crawl_deadline_ms)
    }
}
