//! # Company Website Crawler
//!
//! This module turns a company name into a research report built from the
//! company's own website. It is the single entry point the surrounding lead
//! research pipeline calls.
//!
//! ## Stages
//!
//! 1. `resolver`: pick the company homepage from web search results
//! 2. `sitemap`: find and expand the site's sitemaps into page URLs
//! 3. `relevance`: keep the organizational pages (imprint, contact, team, ...)
//! 4. `pipeline`: fetch and extract those pages with bounded concurrency
//! 5. `report`: summarize each page and join the summaries
//!
//! Every network call goes through the shared [`HttpClient`], is paced by one
//! [`RequestPacer`] and checked against the [`RobotsCache`]. Only a failed homepage
//! resolution ends a crawl early; everything else degrades to a partial report.

mod config;
pub mod content_extraction;
mod domain;
mod error;
pub mod pipeline;
pub mod relevance;
pub mod report;
pub mod resolver;
pub mod sitemap;

pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_ROBOTS_AGENT, DEFAULT_USER_AGENT};
pub use domain::BaseDomain;
pub use error::CrawlError;
pub use pipeline::{FetchOutcome, FetchPipeline, PageOutcome};
pub use relevance::{PageCandidate, PageCategory, filter_candidates};
pub use report::{CrawlReport, EMPTY_REPORT_MESSAGE, PageSummary, ReportAssembler, SkippedPage};
pub use resolver::HomepageResolver;
pub use sitemap::{SitemapCandidate, SitemapDiscovery};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::http::{HttpClient, RequestPacer};
use crate::render::Renderer;
use crate::robots::RobotsCache;
use crate::search::SearchProvider;
use crate::summarize::Summarizer;
use content_extraction::{ContentExtractor, extract_navigation_links};

/// Report text when no homepage could be determined
pub const NO_HOMEPAGE_MESSAGE: &str = "No company homepage could be determined.";

/// Separator of the pipeline's `name AND postal code` query form
const QUERY_SEPARATOR: &str = " AND ";

/// Input of one crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlQuery {
    pub company_name: String,
    pub postal_code: Option<String>,
}

impl CrawlQuery {
    pub fn new(company_name: impl Into<String>, postal_code: Option<String>) -> Self {
        Self {
            company_name: company_name.into(),
            postal_code: postal_code.filter(|code| !code.trim().is_empty()),
        }
    }

    /// Parse `"Acme GmbH AND 80331"`; the postal code part is optional.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(QUERY_SEPARATOR) {
            Some((name, code)) => Self::new(name.trim(), Some(code.trim().to_string())),
            None => Self::new(raw.trim(), None),
        }
    }
}

/// The crawler facade wiring all stages together
pub struct Crawler {
    config: CrawlerConfig,
    http: HttpClient,
    pacer: Arc<RequestPacer>,
    robots: Arc<RobotsCache>,
    resolver: HomepageResolver,
    discovery: SitemapDiscovery,
    pipeline: FetchPipeline,
    assembler: ReportAssembler,
}

/// Builder for [`Crawler`]
pub struct CrawlerBuilder {
    config: CrawlerConfig,
    search: Option<Arc<dyn SearchProvider>>,
    summarizer: Option<Arc<dyn Summarizer>>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl CrawlerBuilder {
    pub fn new(config: CrawlerConfig) -> Self {
        Self {
            config,
            search: None,
            summarizer: None,
            renderer: None,
        }
    }

    pub fn search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Enable the rendering fallback
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> Result<Crawler, CrawlError> {
        let search = self
            .search
            .ok_or_else(|| CrawlError::Config("no search provider configured".to_string()))?;
        let summarizer = self
            .summarizer
            .ok_or_else(|| CrawlError::Config("no summarizer configured".to_string()))?;

        let config = self.config;
        let pacer = Arc::new(RequestPacer::new(config.rate_limit()));
        let http = HttpClient::new(&config)
            .map_err(|e| CrawlError::Config(e.to_string()))?
            .with_pacer(pacer.clone());
        let robots = Arc::new(RobotsCache::new(
            http.clone(),
            pacer.clone(),
            config.robots_user_agent.clone(),
        ));
        let extractor = Arc::new(ContentExtractor::new(&config));

        let discovery = SitemapDiscovery::new(
            http.clone(),
            pacer.clone(),
            robots.clone(),
            config.sitemap_max_depth,
            config.max_child_sitemaps,
        );
        let mut pipeline =
            FetchPipeline::new(http.clone(), pacer.clone(), robots.clone(), extractor, &config);
        if let Some(renderer) = self.renderer {
            pipeline = pipeline.with_renderer(renderer);
        }

        Ok(Crawler {
            resolver: HomepageResolver::new(search),
            assembler: ReportAssembler::new(summarizer, config.max_workers),
            discovery,
            pipeline,
            http,
            pacer,
            robots,
            config,
        })
    }
}

impl Crawler {
    pub fn builder(config: CrawlerConfig) -> CrawlerBuilder {
        CrawlerBuilder::new(config)
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawl and return the report text. Never fails: a missing homepage yields
    /// [`NO_HOMEPAGE_MESSAGE`], an unproductive crawl [`EMPTY_REPORT_MESSAGE`].
    pub async fn crawl(&self, company_name: &str, postal_code: Option<&str>) -> String {
        match self.crawl_report(company_name, postal_code).await {
            Ok(report) => report.render(),
            Err(e) => {
                warn!(error = %e, "Crawl aborted");
                NO_HOMEPAGE_MESSAGE.to_string()
            }
        }
    }

    /// [`Crawler::crawl`] for a parsed pipeline query
    pub async fn crawl_query(&self, query: &CrawlQuery) -> String {
        self.crawl(&query.company_name, query.postal_code.as_deref())
            .await
    }

    /// Crawl and return the structured report; only resolution failures are errors.
    #[instrument(skip(self))]
    pub async fn crawl_report(
        &self,
        company_name: &str,
        postal_code: Option<&str>,
    ) -> Result<CrawlReport, CrawlError> {
        // Only the company name is searched; the postal code is informational.
        let base = self.resolver.resolve(company_name).await?;
        Ok(self.crawl_domain(&base).await)
    }

    pub async fn resolve(&self, company_name: &str) -> Result<BaseDomain, CrawlError> {
        self.resolver.resolve(company_name).await
    }

    /// Crawl a known domain under the overall deadline
    #[instrument(skip(self), fields(base = %base))]
    pub async fn crawl_domain(&self, base: &BaseDomain) -> CrawlReport {
        let deadline = Instant::now() + self.config.crawl_deadline();

        let urls = match tokio::time::timeout_at(deadline, self.discover_urls(base)).await {
            Ok(urls) => urls,
            Err(_) => {
                warn!("Deadline reached during discovery");
                Vec::new()
            }
        };
        let discovery_failed = urls.is_empty();

        let candidates = filter_candidates(base, &urls, self.config.max_pages);
        info!(
            discovered = urls.len(),
            selected = candidates.len(),
            "Pages selected for fetching"
        );

        let outcomes = self
            .pipeline
            .fetch_and_extract(base, candidates, deadline)
            .await;
        let mut report = self.assembler.assemble(outcomes).await;

        if discovery_failed {
            let failure = CrawlError::DiscoveryFailure {
                base: base.origin(),
                reason: "no sitemap yielded page URLs".to_string(),
            };
            report.skipped.insert(
                0,
                SkippedPage {
                    url: base.origin(),
                    kind: failure.kind().to_string(),
                    reason: failure.to_string(),
                },
            );
        }
        report
    }

    async fn discover_urls(&self, base: &BaseDomain) -> Vec<String> {
        let urls = self.discovery.discover_pages(base).await;
        if !urls.is_empty() {
            return urls;
        }
        info!(base = %base, "No sitemap pages, continuing with the homepage");
        if self.config.navigation_fallback {
            return self.navigation_links(base).await;
        }
        Vec::new()
    }

    /// Organizational links from the homepage navigation
    async fn navigation_links(&self, base: &BaseDomain) -> Vec<String> {
        let homepage = base.homepage().as_str();
        if !self.robots.is_allowed(base, homepage).await {
            return Vec::new();
        }
        self.pacer.wait().await;
        match self.http.fetch_html(homepage, self.http.default_timeout()).await {
            Ok(response) => {
                let links = extract_navigation_links(&response.body, base);
                info!(links = links.len(), "Using navigation links");
                links
            }
            Err(e) => {
                warn!(error = %e, "Homepage unavailable for navigation fallback");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchHit, StaticSearch};
    use crate::summarize::tests::RecordingSummarizer;
    use mockito::Server;

    fn config() -> CrawlerConfig {
        CrawlerConfig::builder()
            .rate_limit_ms(1)
            .max_retries(0)
            .build()
    }

    fn crawler(config: CrawlerConfig, hits: Vec<SearchHit>) -> Crawler {
        Crawler::builder(config)
            .search(Arc::new(StaticSearch::new(hits)))
            .summarizer(Arc::new(RecordingSummarizer::default()))
            .build()
            .unwrap()
    }

    fn page(text: &str) -> String {
        format!(
            "<html><body><nav><a href=\"/impressum\">Impressum</a></nav><main><h1>{}</h1><p>{}</p></main></body></html>",
            text,
            "Die Acme GmbH fertigt Sondermaschinen in München. ".repeat(5)
        )
    }

    #[test]
    fn test_query_parsing() {
        assert_eq!(
            CrawlQuery::parse("Acme GmbH AND 80331"),
            CrawlQuery::new("Acme GmbH", Some("80331".to_string()))
        );
        assert_eq!(CrawlQuery::parse("  Acme GmbH ").company_name, "Acme GmbH");
        assert_eq!(CrawlQuery::parse("Acme GmbH AND ").postal_code, None);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = Crawler::builder(config()).build();
        assert!(matches!(result, Err(CrawlError::Config(_))));
    }

    #[tokio::test]
    async fn test_unresolvable_company_returns_sentinel() {
        let crawler = crawler(
            config(),
            vec![SearchHit::new("Acme", "https://www.linkedin.com/company/acme", "")],
        );
        assert_eq!(crawler.crawl("Acme GmbH", Some("80331")).await, NO_HOMEPAGE_MESSAGE);
        assert_eq!(
            crawler
                .crawl_query(&CrawlQuery::parse("Acme GmbH AND 80331"))
                .await,
            NO_HOMEPAGE_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_crawl_domain_end_to_end() {
        let mut server = Server::new_async().await;
        let url = server.url();

        let _sitemap = server
            .mock("GET", "/sitemap.xml")
            .with_status(200)
            .with_body(format!(
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                    <url><loc>{url}/kontakt</loc></url>
                    <url><loc>{url}/en/about</loc></url>
                    <url><loc>{url}/produkte/fraesen</loc></url>
                </urlset>"#
            ))
            .create_async()
            .await;
        let home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page("Willkommen"))
            .expect(1)
            .create_async()
            .await;
        let contact = server
            .mock("GET", "/kontakt")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page("Kontakt"))
            .expect(1)
            .create_async()
            .await;
        let english = server
            .mock("GET", "/en/about")
            .expect(0)
            .create_async()
            .await;

        let crawler = crawler(config(), Vec::new());
        let base = BaseDomain::from_url(&url).unwrap();
        let report = crawler.crawl_domain(&base).await;

        assert!(!report.is_empty);
        let mut urls: Vec<String> = report.sections.iter().map(|s| s.url.clone()).collect();
        urls.sort();
        assert_eq!(urls, vec![format!("{}/", url), format!("{}/kontakt", url)]);
        assert!(report.skipped.is_empty());
        home.assert_async().await;
        contact.assert_async().await;
        english.assert_async().await;
    }

    #[tokio::test]
    async fn test_unreachable_site_yields_empty_sentinel() {
        let mut server = Server::new_async().await;
        let _down = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let crawler = crawler(config(), Vec::new());
        let base = BaseDomain::from_url(&server.url()).unwrap();
        let report = crawler.crawl_domain(&base).await;

        assert!(report.is_empty);
        assert_eq!(report.render(), EMPTY_REPORT_MESSAGE);
        let kinds: Vec<&str> = report.skipped.iter().map(|s| s.kind.as_str()).collect();
        assert_eq!(kinds, vec!["discovery_failure", "transport_failure"]);
    }

    #[tokio::test]
    async fn test_navigation_fallback_when_enabled() {
        let mut server = Server::new_async().await;
        let url = server.url();
        let home = server
            .mock("GET", "/")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page("Willkommen"))
            .expect(2)
            .create_async()
            .await;
        let imprint = server
            .mock("GET", "/impressum")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(page("Impressum"))
            .expect(1)
            .create_async()
            .await;

        let config = CrawlerConfig::builder()
            .rate_limit_ms(1)
            .max_retries(0)
            .navigation_fallback(true)
            .build();
        let crawler = crawler(config, Vec::new());
        let base = BaseDomain::from_url(&url).unwrap();
        let report = crawler.crawl_domain(&base).await;

        assert_eq!(report.sections.len(), 2);
        home.assert_async().await;
        imprint.assert_async().await;
    }
}
