//! Bounded-concurrency fetch and extraction of ranked pages

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::crawler::content_extraction::{
    ContentExtractor, ExtractionSource, PageAnalysis, append_social_links, extract_social_links,
};
use crate::crawler::relevance::PageCandidate;
use crate::crawler::{BaseDomain, CrawlError, CrawlerConfig};
use crate::http::{FetchError, HttpClient, RequestPacer};
use crate::render::{RenderError, Renderer};
use crate::robots::RobotsCache;

/// Result of attempting one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Success {
        text: String,
        source: ExtractionSource,
        rendered: bool,
    },
    RobotsDenied,
    NetworkError {
        detail: String,
    },
    UnsupportedContentType {
        content_type: String,
    },
    TooLarge {
        limit: usize,
    },
    ExtractionEmpty,
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// The outcome for one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub url: String,
    #[serde(flatten)]
    pub outcome: FetchOutcome,
}

impl PageOutcome {
    fn new(url: impl Into<String>, outcome: FetchOutcome) -> Self {
        Self {
            url: url.into(),
            outcome,
        }
    }

    /// Why the page was skipped, `None` for successes
    pub fn skip_error(&self) -> Option<CrawlError> {
        let url = self.url.clone();
        match &self.outcome {
            FetchOutcome::Success { .. } => None,
            FetchOutcome::RobotsDenied => Some(CrawlError::PolicyDenied { url }),
            FetchOutcome::NetworkError { detail } => Some(CrawlError::TransportFailure {
                url,
                detail: detail.clone(),
            }),
            FetchOutcome::UnsupportedContentType { content_type } => {
                Some(CrawlError::ContentRejected {
                    url,
                    reason: format!("unsupported content type '{}'", content_type),
                })
            }
            FetchOutcome::TooLarge { limit } => Some(CrawlError::ContentRejected {
                url,
                reason: format!("body exceeds {} bytes", limit),
            }),
            FetchOutcome::ExtractionEmpty => Some(CrawlError::ExtractionEmpty { url }),
        }
    }
}

/// Fetches pages with a fixed worker count, shared pacing and an overall deadline
#[derive(Clone)]
pub struct FetchPipeline {
    http: HttpClient,
    pacer: Arc<RequestPacer>,
    robots: Arc<RobotsCache>,
    extractor: Arc<ContentExtractor>,
    renderer: Option<Arc<dyn Renderer>>,
    workers: usize,
    render_budget: Duration,
}

impl FetchPipeline {
    pub fn new(
        http: HttpClient,
        pacer: Arc<RequestPacer>,
        robots: Arc<RobotsCache>,
        extractor: Arc<ContentExtractor>,
        config: &CrawlerConfig,
    ) -> Self {
        Self {
            http,
            pacer,
            robots,
            extractor,
            renderer: None,
            workers: config.max_workers.max(1),
            render_budget: config.render_budget(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Fetch every candidate; outcomes arrive in completion order.
    ///
    /// Work still running at `deadline` is aborted and reported as a network error.
    #[instrument(skip(self, candidates), fields(base = %base, pages = candidates.len()))]
    pub async fn fetch_and_extract(
        &self,
        base: &BaseDomain,
        candidates: Vec<PageCandidate>,
        deadline: Instant,
    ) -> Vec<PageOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let mut pending = HashMap::new();

        for candidate in candidates {
            let pipeline = self.clone();
            let base = base.clone();
            let semaphore = semaphore.clone();
            let url = candidate.url;
            let task_url = url.clone();

            let handle = tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = pipeline.process(&base, &task_url).await;
                PageOutcome::new(task_url, outcome)
            });
            pending.insert(handle.id(), url);
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await {
                Ok(Some(Ok((id, page)))) => {
                    pending.remove(&id);
                    log_outcome(&page);
                    outcomes.push(page);
                }
                Ok(Some(Err(e))) => {
                    if let Some(url) = pending.remove(&e.id()) {
                        warn!(url = %url, error = %e, "Page task failed");
                        outcomes.push(PageOutcome::new(
                            url,
                            FetchOutcome::NetworkError {
                                detail: format!("task failed: {}", e),
                            },
                        ));
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(abandoned = pending.len(), "Crawl deadline exceeded");
                    tasks.abort_all();
                    for (_, url) in pending.drain() {
                        let page = PageOutcome::new(
                            url,
                            FetchOutcome::NetworkError {
                                detail: "deadline exceeded".to_string(),
                            },
                        );
                        log_outcome(&page);
                        outcomes.push(page);
                    }
                    break;
                }
            }
        }
        outcomes
    }

    async fn process(&self, base: &BaseDomain, url: &str) -> FetchOutcome {
        if !self.robots.is_allowed(base, url).await {
            return FetchOutcome::RobotsDenied;
        }

        self.pacer.wait().await;
        let response = match self.http.fetch_html(url, self.http.default_timeout()).await {
            Ok(response) => response,
            Err(FetchError::UnsupportedContentType { content_type, .. }) => {
                return FetchOutcome::UnsupportedContentType { content_type };
            }
            Err(FetchError::TooLarge { limit, .. }) => return FetchOutcome::TooLarge { limit },
            Err(e) => {
                return FetchOutcome::NetworkError {
                    detail: e.to_string(),
                };
            }
        };

        let mut html = response.body;
        let mut analysis = self.extractor.analyze(&html);
        let mut rendered = false;

        if let (Some(reason), Some(renderer)) = (analysis.render_reason, &self.renderer) {
            debug!(url, ?reason, chars = analysis.text_len(), "Escalating to renderer");
            match self.render(renderer.as_ref(), url).await {
                Ok(rendered_html) => {
                    let rendered_analysis = self.extractor.analyze(&rendered_html);
                    if prefer_rendered(&analysis, &rendered_analysis) {
                        html = rendered_html;
                        analysis = rendered_analysis;
                        rendered = true;
                    }
                }
                Err(e) => warn!(url, error = %e, "Rendering failed, keeping raw extraction"),
            }
        }

        match analysis.content {
            Some(content) => {
                let links = extract_social_links(&html);
                FetchOutcome::Success {
                    text: append_social_links(&content.text, &links),
                    source: content.source,
                    rendered,
                }
            }
            None => FetchOutcome::ExtractionEmpty,
        }
    }

    /// Rendered markup within the render budget
    async fn render(&self, renderer: &dyn Renderer, url: &str) -> Result<String, RenderError> {
        self.pacer.wait().await;
        tokio::time::timeout(self.render_budget, renderer.render(url, self.render_budget))
            .await
            .unwrap_or(Err(RenderError::Timeout(self.render_budget)))
    }
}

fn prefer_rendered(raw: &PageAnalysis, rendered: &PageAnalysis) -> bool {
    rendered.content.is_some() && rendered.text_len() >= raw.text_len()
}

fn log_outcome(page: &PageOutcome) {
    match page.skip_error() {
        None => debug!(url = %page.url, "Page extracted"),
        Some(reason) => info!(url = %page.url, kind = reason.kind(), %reason, "Page skipped"),
    }
}
