//! Crawl report assembly

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::crawler::pipeline::{FetchOutcome, PageOutcome};
use crate::summarize::{SummaryLimits, Summarizer, summarize_text, truncate_chars};

/// Report text when no page produced a summary
pub const EMPTY_REPORT_MESSAGE: &str = "No information could be extracted from the company website.";

const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Summary of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub text: String,
}

/// A page that did not contribute to the report, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPage {
    pub url: String,
    pub kind: String,
    pub reason: String,
}

/// Final aggregate of one crawl
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    /// Page summaries in completion order
    pub sections: Vec<PageSummary>,
    pub is_empty: bool,
    pub skipped: Vec<SkippedPage>,
}

impl CrawlReport {
    pub fn new(sections: Vec<PageSummary>, skipped: Vec<SkippedPage>) -> Self {
        Self {
            is_empty: sections.is_empty(),
            sections,
            skipped,
        }
    }

    /// Report text, or the empty-report sentinel
    pub fn render(&self) -> String {
        if self.is_empty {
            return EMPTY_REPORT_MESSAGE.to_string();
        }
        self.sections
            .iter()
            .map(|section| format!("## Summary of: {}\n\n{}", section.url, section.text))
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR)
    }
}

/// Summarizes successful pages and collects the rest as diagnostics
pub struct ReportAssembler {
    summarizer: Arc<dyn Summarizer>,
    limits: SummaryLimits,
    concurrency: usize,
}

impl ReportAssembler {
    pub fn new(summarizer: Arc<dyn Summarizer>, concurrency: usize) -> Self {
        Self {
            summarizer,
            limits: SummaryLimits::default(),
            concurrency: concurrency.max(1),
        }
    }

    pub fn with_limits(mut self, limits: SummaryLimits) -> Self {
        self.limits = limits;
        self
    }

    #[instrument(skip_all, fields(pages = outcomes.len()))]
    pub async fn assemble(&self, outcomes: Vec<PageOutcome>) -> CrawlReport {
        let mut skipped = Vec::new();
        let mut pages = Vec::new();

        for page in outcomes {
            if let Some(reason) = page.skip_error() {
                skipped.push(SkippedPage {
                    url: page.url,
                    kind: reason.kind().to_string(),
                    reason: reason.to_string(),
                });
                continue;
            }
            if let FetchOutcome::Success { text, .. } = page.outcome {
                pages.push((page.url, text));
            }
        }

        let sections: Vec<PageSummary> = stream::iter(pages)
            .map(|(url, text)| async move {
                let summary = summarize_text(self.summarizer.as_ref(), &text, &self.limits).await;
                let summary = if summary.trim().is_empty() {
                    truncate_chars(text.trim(), self.limits.fallback_chars).to_string()
                } else {
                    summary
                };
                PageSummary { url, text: summary }
            })
            .buffer_unordered(self.concurrency)
            .filter(|section| std::future::ready(!section.text.trim().is_empty()))
            .collect()
            .await;

        debug!(sections = sections.len(), skipped = skipped.len(), "Report assembled");
        if sections.is_empty() {
            info!("No page produced a summary");
        }
        CrawlReport::new(sections, skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::content_extraction::ExtractionSource;
    use crate::summarize::SummaryStage;
    use crate::summarize::tests::RecordingSummarizer;

    fn success(url: &str, text: &str) -> PageOutcome {
        PageOutcome {
            url: url.to_string(),
            outcome: FetchOutcome::Success {
                text: text.to_string(),
                source: ExtractionSource::Structural,
                rendered: false,
            },
        }
    }

    fn failure(url: &str) -> PageOutcome {
        PageOutcome {
            url: url.to_string(),
            outcome: FetchOutcome::NetworkError {
                detail: "connection refused".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_all_failures_yield_sentinel() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let assembler = ReportAssembler::new(summarizer.clone(), 2);

        let report = assembler
            .assemble(vec![
                failure("https://acme.de/"),
                failure("https://acme.de/kontakt"),
            ])
            .await;

        assert!(report.is_empty);
        assert_eq!(report.render(), EMPTY_REPORT_MESSAGE);
        assert_eq!(report.skipped.len(), 2);
        assert!(report.skipped.iter().all(|s| s.kind == "transport_failure"));
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sections_pair_summaries_with_urls() {
        let summarizer = Arc::new(RecordingSummarizer::default());
        let assembler = ReportAssembler::new(summarizer.clone(), 4);

        let report = assembler
            .assemble(vec![
                success("https://acme.de/", "Startseite der Acme GmbH"),
                PageOutcome {
                    url: "https://acme.de/intern".to_string(),
                    outcome: FetchOutcome::RobotsDenied,
                },
                success("https://acme.de/impressum", "Impressum Acme GmbH"),
            ])
            .await;

        assert!(!report.is_empty);
        let mut urls: Vec<&str> = report.sections.iter().map(|s| s.url.as_str()).collect();
        urls.sort();
        assert_eq!(urls, vec!["https://acme.de/", "https://acme.de/impressum"]);
        assert_eq!(report.skipped[0].kind, "policy_denied");

        let text = report.render();
        assert!(text.contains("## Summary of: https://acme.de/impressum\n\nsummary(Page)"));
        assert_eq!(text.matches("\n\n---\n\n").count(), 1);
        assert_eq!(summarizer.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_summaries_fall_back_to_page_text() {
        let summarizer = Arc::new(RecordingSummarizer {
            fail_stages: vec![SummaryStage::Page],
            ..Default::default()
        });
        let assembler = ReportAssembler::new(summarizer, 1);

        let report = assembler
            .assemble(vec![success("https://acme.de/team", "Team: Max Mustermann")])
            .await;

        assert_eq!(report.sections[0].text, "Team: Max Mustermann");
    }

    #[tokio::test]
    async fn test_fallback_excerpt_respects_limits() {
        let summarizer = Arc::new(RecordingSummarizer {
            fail_stages: vec![SummaryStage::Page],
            ..Default::default()
        });
        let assembler = ReportAssembler::new(summarizer, 1).with_limits(SummaryLimits {
            fallback_chars: 4,
            ..SummaryLimits::default()
        });

        let report = assembler
            .assemble(vec![success("https://acme.de/team", "Team: Max Mustermann")])
            .await;

        assert_eq!(report.sections[0].text, "Team");
    }
}
