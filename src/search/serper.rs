//! Google search results through the Serper API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::{SearchError, SearchHit, SearchProvider};
use crate::http::HttpClient;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Search provider backed by `google.serper.dev`
#[derive(Clone)]
pub struct SerperSearch {
    http: HttpClient,
    api_key: String,
    endpoint: String,
    num_results: u32,
}

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    location: &'a str,
    gl: &'a str,
    hl: &'a str,
    num: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<RawHit>,
    #[serde(default)]
    web: Option<WebResults>,
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Debug, Default, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    #[serde(default)]
    title: String,
    link: Option<String>,
    url: Option<String>,
    snippet: Option<String>,
    description: Option<String>,
}

impl SerperSearch {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            endpoint: SERPER_ENDPOINT.to_string(),
            num_results: 8,
        }
    }

    /// Read the key from `SERPER_API_KEY`
    pub fn from_env(http: HttpClient) -> Result<Self, SearchError> {
        let api_key = std::env::var("SERPER_API_KEY")
            .map_err(|_| SearchError::NotConfigured("SERPER_API_KEY is not set".to_string()))?;
        Ok(Self::new(http, api_key))
    }

    /// Point the provider at another endpoint (used by tests)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    #[instrument(skip(self))]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let request = SerperRequest {
            q: query,
            location: "Germany",
            gl: "de",
            hl: "de",
            num: self.num_results,
        };

        let response = self
            .http
            .post_json(
                &self.endpoint,
                &[("X-API-KEY", self.api_key.as_str())],
                &request,
                SEARCH_TIMEOUT,
            )
            .await?;

        if !response.is_success() {
            warn!(status = response.status, "Serper request failed");
            return Err(SearchError::Api {
                status: response.status,
                body: response.body,
            });
        }

        let hits = parse_response(&response.body)?;
        debug!("Serper returned {} hits", hits.len());
        Ok(hits)
    }
}

/// Read `organic`, falling back to `web.results` and then `results`.
fn parse_response(body: &str) -> Result<Vec<SearchHit>, SearchError> {
    let parsed: SerperResponse = serde_json::from_str(body)?;

    let raw = if !parsed.organic.is_empty() {
        parsed.organic
    } else {
        match parsed.web {
            Some(web) if !web.results.is_empty() => web.results,
            _ => parsed.results,
        }
    };

    Ok(raw
        .into_iter()
        .filter_map(|hit| {
            let url = hit.link.or(hit.url)?;
            Some(SearchHit {
                title: hit.title,
                url,
                snippet: hit.snippet.or(hit.description).unwrap_or_default(),
            })
        })
        .collect())
}
