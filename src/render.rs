//! Headless rendering fallback for sparse or script-driven pages.
//!
//! The pipeline only depends on the [`Renderer`] trait. [`RenderService`] talks to a
//! headless-browser HTTP service that loads the page, dismisses consent overlays,
//! scrolls to trigger lazy loading and waits for the DOM to settle before returning
//! the rendered markup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::http::{FetchError, HttpClient};

/// Consent-banner buttons commonly found on DACH sites
pub const CONSENT_SELECTORS: &[&str] = &[
    "button:has-text('Alle akzeptieren')",
    "button:has-text('Akzeptieren')",
    "button:has-text('Zustimmen')",
    "button:has-text('Accept all')",
    "button:has-text('I agree')",
    "#onetrust-accept-btn-handler",
    "button.ot-sdk-container",
    "div[role='dialog'] button:has-text('OK')",
    "button:has-text('Verstanden')",
    "button:has-text('Einverstanden')",
    "button:has-text('Alles akzeptieren')",
    "#cmpbntyestxt",
    ".cmplz-accept",
    ".cmplz-btn.cmplz-accept",
    ".borlabs-cookie-btn-accept-all",
];

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render transport failed: {0}")]
    Transport(#[from] FetchError),

    #[error("render service returned HTTP {status}")]
    Service { status: u16 },

    #[error("render service response unreadable: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("rendered document is empty")]
    Empty,

    #[error("rendering exceeded its {0:?} budget")]
    Timeout(Duration),
}

impl From<RenderError> for crate::error::Error {
    fn from(err: RenderError) -> Self {
        crate::error::Error::Render(err.to_string())
    }
}

/// Produces the rendered DOM of a page
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, url: &str, budget: Duration) -> Result<String, RenderError>;
}

/// Stabilization parameters sent with every render request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub locale: String,
    pub network_idle_ms: u64,
    pub min_text_length: usize,
    pub max_wait_iterations: u32,
    pub wait_interval_ms: u64,
    pub scroll_steps: u32,
    pub dismiss_selectors: Vec<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            locale: "de-DE".to_string(),
            network_idle_ms: 2_500,
            min_text_length: 800,
            max_wait_iterations: 12,
            wait_interval_ms: 500,
            scroll_steps: 4,
            dismiss_selectors: CONSENT_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    url: &'a str,
    timeout_ms: u64,
    #[serde(flatten)]
    options: &'a RenderOptions,
}

#[derive(Debug, Deserialize)]
struct RenderResponse {
    html: Option<String>,
    content: Option<String>,
}

/// Client for a remote headless-browser rendering service
pub struct RenderService {
    http: HttpClient,
    endpoint: String,
    options: RenderOptions,
}

impl RenderService {
    pub fn new(http: HttpClient, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            options: RenderOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl Renderer for RenderService {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn render(&self, url: &str, budget: Duration) -> Result<String, RenderError> {
        let request = RenderRequest {
            url,
            timeout_ms: budget.as_millis() as u64,
            options: &self.options,
        };

        let response = self
            .http
            .post_json(&self.endpoint, &[], &request, budget)
            .await?;
        if !response.is_success() {
            return Err(RenderError::Service {
                status: response.status,
            });
        }

        let parsed: RenderResponse = serde_json::from_str(&response.body)?;
        let html = parsed.html.or(parsed.content).unwrap_or_default();
        if html.trim().is_empty() {
            return Err(RenderError::Empty);
        }
        debug!(bytes = html.len(), "Rendered page");
        Ok(html)
    }
}
