//! # Page Summarization
//!
//! The crawler hands each page's extracted text to a [`Summarizer`]. Input is bounded:
//! text longer than [`SummaryLimits::max_input_chars`] is split into overlapping
//! windows, each window is summarized, and the partial summaries are summarized
//! once more. Every model failure degrades to a truncated excerpt instead of an
//! error.

use async_trait::async_trait;
use regex::Regex;
use rig::agent::Agent;
use rig::completion::{CompletionModel, Prompt, PromptError};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors reported by a summarization backend
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("model call failed: {0}")]
    Model(String),

    #[error("model returned an empty summary")]
    Empty,
}

impl From<PromptError> for SummarizeError {
    fn from(err: PromptError) -> Self {
        SummarizeError::Model(err.to_string())
    }
}

impl From<SummarizeError> for crate::error::Error {
    fn from(err: SummarizeError) -> Self {
        crate::error::Error::Summarize(err.to_string())
    }
}

/// Which step of the summarization a call belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStage {
    /// A whole page that fits the input bound
    Page,
    /// One window of an over-long page
    Window,
    /// The concatenated window summaries
    Combine,
}

/// Summarization collaborator
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, stage: SummaryStage) -> Result<String, SummarizeError>;
}

/// Input bounds and fallback excerpt lengths, in characters
#[derive(Debug, Clone)]
pub struct SummaryLimits {
    pub max_input_chars: usize,
    pub window_chars: usize,
    pub overlap_chars: usize,
    pub window_fallback_chars: usize,
    pub fallback_chars: usize,
}

impl Default for SummaryLimits {
    fn default() -> Self {
        Self {
            max_input_chars: 50_000,
            window_chars: 5_000,
            overlap_chars: 200,
            window_fallback_chars: 1_500,
            fallback_chars: 2_000,
        }
    }
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Collapse whitespace runs to single spaces
pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// First `max_chars` characters of `text`
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

/// Split into windows of `size` characters, consecutive windows sharing `overlap`.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= size || size == 0 {
        return vec![text.to_string()];
    }
    let step = size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Summarize `text` within `limits`. Never fails; model errors fall back to excerpts.
#[instrument(skip(summarizer, text, limits), fields(chars = text.len()))]
pub async fn summarize_text(
    summarizer: &dyn Summarizer,
    text: &str,
    limits: &SummaryLimits,
) -> String {
    let text = normalize_whitespace(text);
    if text.is_empty() {
        return String::new();
    }

    if text.chars().count() <= limits.max_input_chars {
        return match summarizer.summarize(&text, SummaryStage::Page).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Summary failed, using excerpt");
                truncate_chars(&text, limits.fallback_chars).to_string()
            }
        };
    }

    let windows = chunk_text(&text, limits.window_chars, limits.overlap_chars);
    debug!("Summarizing {} windows", windows.len());

    let mut partials = Vec::with_capacity(windows.len());
    for (index, window) in windows.iter().enumerate() {
        match summarizer.summarize(window, SummaryStage::Window).await {
            Ok(summary) => partials.push(summary.trim().to_string()),
            Err(e) => {
                warn!(window = index, error = %e, "Window summary failed, using excerpt");
                partials.push(truncate_chars(window, limits.window_fallback_chars).to_string());
            }
        }
    }

    let joined = partials.join("\n\n");
    let combined_input = truncate_chars(&joined, limits.max_input_chars);
    match summarizer.summarize(combined_input, SummaryStage::Combine).await {
        Ok(summary) => summary,
        Err(e) => {
            warn!(error = %e, "Combined summary failed, using partial summaries");
            truncate_chars(&joined, limits.fallback_chars).to_string()
        }
    }
}

const PAGE_PREAMBLE: &str = "You are an expert in company research. Summarize the relevant \
information about the company precisely and in a structured way. Where available, extract in \
this order: 1. Managing directors / leadership / partners. 2. Services / products, what the \
company does. 3. Number of employees / team size. 4. The company's LinkedIn link. 5. Imprint / \
contact details. Use a clear heading for each category. If a piece of information cannot be \
found, leave that category empty. Answer in the language of the page.";

const WINDOW_PREAMBLE: &str = "You are an expert in company research. Summarize only the \
relevant facts, precisely. Where available focus on: 1) leadership, 2) services/products, \
3) team size, 4) LinkedIn, 5) imprint/contact.";

const COMBINE_PREAMBLE: &str = "Combine the following partial summaries into one short, \
structured overview. Facts only, no repetitions.";

/// Summarizer backed by `rig` agents over any completion model
pub struct AgentSummarizer<M: CompletionModel> {
    page: Agent<M>,
    window: Agent<M>,
    combine: Agent<M>,
}

impl<M: CompletionModel> AgentSummarizer<M> {
    pub fn new(model: M) -> Self {
        let agent = |preamble: &str| {
            rig::agent::AgentBuilder::new(model.clone())
                .preamble(preamble)
                .temperature(0.1)
                .build()
        };
        Self {
            page: agent(PAGE_PREAMBLE),
            window: agent(WINDOW_PREAMBLE),
            combine: agent(COMBINE_PREAMBLE),
        }
    }
}

#[async_trait]
impl<M> Summarizer for AgentSummarizer<M>
where
    M: CompletionModel + 'static,
{
    async fn summarize(&self, text: &str, stage: SummaryStage) -> Result<String, SummarizeError> {
        let agent = match stage {
            SummaryStage::Page => &self.page,
            SummaryStage::Window => &self.window,
            SummaryStage::Combine => &self.combine,
        };
        let summary = agent.prompt(text).await?;
        if summary.trim().is_empty() {
            return Err(SummarizeError::Empty);
        }
        Ok(summary)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::mock_model::MockCompletionModel;
    use std::sync::Mutex;

    /// Records every call and echoes a tagged summary
    #[derive(Default)]
    pub(crate) struct RecordingSummarizer {
        pub calls: Mutex<Vec<(SummaryStage, usize)>>,
        pub fail_stages: Vec<SummaryStage>,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(
            &self,
            text: &str,
            stage: SummaryStage,
        ) -> Result<String, SummarizeError> {
            self.calls
                .lock()
                .unwrap()
                .push((stage, text.chars().count()));
            if self.fail_stages.contains(&stage) {
                return Err(SummarizeError::Model("boom".to_string()));
            }
            Ok(format!("summary({:?})", stage))
        }
    }

    fn small_limits() -> SummaryLimits {
        SummaryLimits {
            max_input_chars: 100,
            window_chars: 40,
            overlap_chars: 10,
            window_fallback_chars: 15,
            fallback_chars: 20,
        }
    }

    #[test]
    fn test_chunk_text_overlaps_windows() {
        let text: String = ('a'..='z').cycle().take(100).collect();
        let chunks = chunk_text(&text, 40, 10);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 40);
        assert_eq!(&chunks[0][30..], &chunks[1][..10]);
        assert!(text.ends_with(chunks.last().unwrap().as_str()));
    }

    #[test]
    fn test_chunk_text_is_char_safe() {
        let text = "Müller Straße Größe ".repeat(10);
        let chunks = chunk_text(&text, 7, 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
        assert_eq!(chunk_text("kurz", 10, 2), vec!["kurz".to_string()]);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("Öffnungszeiten", 3), "Öff");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }

    #[tokio::test]
    async fn test_short_text_is_summarized_once() {
        let summarizer = RecordingSummarizer::default();
        let summary = summarize_text(&summarizer, "Acme   GmbH\n\nImpressum", &small_limits()).await;

        assert_eq!(summary, "summary(Page)");
        let calls = summarizer.calls.lock().unwrap();
        assert_eq!(calls.as_slice(), &[(SummaryStage::Page, 19)]);
    }

    #[tokio::test]
    async fn test_long_text_is_windowed_then_combined() {
        let summarizer = RecordingSummarizer::default();
        let text = "x".repeat(150);
        let summary = summarize_text(&summarizer, &text, &small_limits()).await;

        assert_eq!(summary, "summary(Combine)");
        let calls = summarizer.calls.lock().unwrap();
        let windows = calls
            .iter()
            .filter(|(stage, _)| *stage == SummaryStage::Window)
            .count();
        assert_eq!(windows, 5);
        assert!(calls.iter().all(|(_, len)| *len <= 100));
    }

    #[tokio::test]
    async fn test_failures_fall_back_to_excerpts() {
        let summarizer = RecordingSummarizer {
            fail_stages: vec![SummaryStage::Page],
            ..Default::default()
        };
        let text = "y".repeat(50);
        let summary = summarize_text(&summarizer, &text, &small_limits()).await;
        assert_eq!(summary, "y".repeat(20));

        let summarizer = RecordingSummarizer {
            fail_stages: vec![SummaryStage::Window, SummaryStage::Combine],
            ..Default::default()
        };
        let text = "z".repeat(150);
        let summary = summarize_text(&summarizer, &text, &small_limits()).await;
        // Window excerpts are 15 chars, joined by blank lines, cut at 20.
        assert_eq!(summary, format!("{}\n\nzzz", "z".repeat(15)));
    }

    #[tokio::test]
    async fn test_empty_text_skips_the_model() {
        let summarizer = RecordingSummarizer::default();
        assert_eq!(summarize_text(&summarizer, "  \n\t ", &small_limits()).await, "");
        assert!(summarizer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_agent_summarizer_uses_model() {
        let mock = MockCompletionModel::new();
        mock.set_text_response("Geschäftsführer: Max Mustermann").await;
        let summarizer = AgentSummarizer::new(mock.clone());

        let summary = summarizer
            .summarize("Impressum Acme GmbH", SummaryStage::Page)
            .await
            .unwrap();

        assert_eq!(summary, "Geschäftsführer: Max Mustermann");
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_agent_summarizer_rejects_blank_answers() {
        let summarizer = AgentSummarizer::new(MockCompletionModel::new());
        let result = summarizer.summarize("text", SummaryStage::Page).await;
        assert!(matches!(result, Err(SummarizeError::Empty)));
    }
}
