//! HTTP client layer shared by every network-facing component
//!
//! This module provides a pooled `reqwest` client with a fixed identity header set,
//! bounded retries with exponential backoff for transient failures, and the content
//! guards (HTML-only, body ceiling) used by the page fetcher. It performs no caching.
//! Callers claim a slot from [`RequestPacer`] before each request; retries of that
//! request claim their own slots from the pacer attached with [`HttpClient::with_pacer`].

mod error;
pub mod pacer;

pub use error::FetchError;
pub use pacer::RequestPacer;

use crate::crawler::CrawlerConfig;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Method, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Statuses treated as transient and retried for idempotent methods
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Maximum redirects followed per request
const MAX_REDIRECTS: usize = 5;

/// A fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `Content-Type` header, if present and readable
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// HTTP client for crawling target sites and calling external services
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_retries: u32,
    backoff_base: Duration,
    max_body_bytes: usize,
    default_timeout: Duration,
    pacer: Option<Arc<RequestPacer>>,
}

impl HttpClient {
    /// Create a client with the identity headers and limits from `config`
    pub fn new(config: &CrawlerConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language)
                .map_err(|e| FetchError::Setup(format!("invalid Accept-Language: {}", e)))?,
        );

        // Accept-Encoding (gzip, deflate, br) is set by reqwest's decompression features.
        let client = ReqwestClient::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .timeout(config.read_timeout())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| FetchError::Setup(e.to_string()))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_base: config.backoff_base(),
            max_body_bytes: config.max_body_bytes,
            default_timeout: config.read_timeout(),
            pacer: None,
        })
    }

    /// Pace retry attempts through the shared pacer
    pub fn with_pacer(mut self, pacer: Arc<RequestPacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// GET `url` and return whatever final status the server answered with.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<HttpResponse, FetchError> {
        let response = self.send_with_retry(Method::GET, url, timeout).await?;
        self.into_http_response(url, response).await
    }

    /// GET an HTML page, rejecting non-HTML documents and oversized bodies.
    ///
    /// The content type is checked before the body is read.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch_html(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let response = self.send_with_retry(Method::GET, url, timeout).await?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            if !is_html_content_type(content_type) {
                return Err(FetchError::UnsupportedContentType {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        self.into_http_response(url, response).await
    }

    /// POST a JSON body once. Non-idempotent requests are never retried.
    #[instrument(skip(self, headers, body), level = "debug")]
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &B,
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.post(url).timeout(timeout).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        debug!("Sending POST request to {}", url);
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        self.into_http_response(url, response).await
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<Response, FetchError> {
        let idempotent = matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let mut attempt: u32 = 0;

        loop {
            debug!(attempt, "Sending {} request to {}", method, url);
            let result = self
                .client
                .request(method.clone(), url)
                .timeout(timeout)
                .send()
                .await;

            let transient = match &result {
                Ok(response) => RETRY_STATUSES.contains(&response.status().as_u16()),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if !transient || !idempotent || attempt >= self.max_retries {
                return result.map_err(|e| FetchError::from_reqwest(url, e));
            }

            let delay = self.backoff_base * 2u32.saturating_pow(attempt);
            match &result {
                Ok(response) => warn!(
                    url,
                    status = response.status().as_u16(),
                    "Transient status, retrying in {:?}",
                    delay
                ),
                Err(e) => warn!(url, error = %e, "Transient failure, retrying in {:?}", delay),
            }
            tokio::time::sleep(delay).await;
            if let Some(pacer) = &self.pacer {
                pacer.wait().await;
            }
            attempt += 1;
        }
    }

    async fn into_http_response(
        &self,
        url: &str,
        response: Response,
    ) -> Result<HttpResponse, FetchError> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = self.read_capped_body(url, response).await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    /// Read the body incrementally, aborting as soon as the ceiling is crossed.
    async fn read_capped_body(&self, url: &str, mut response: Response) -> Result<String, FetchError> {
        let too_large = || FetchError::TooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };

        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(too_large());
            }
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?
        {
            if buffer.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Whether a `Content-Type` value denotes an HTML document
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn test_client(max_body_bytes: usize) -> HttpClient {
        let config = CrawlerConfig::builder()
            .max_retries(2)
            .backoff_base_ms(1)
            .max_body_bytes(max_body_bytes)
            .build();
        HttpClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_status_and_body() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("User-agent: *\nDisallow:")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(1024);
        let response = client
            .fetch(&format!("{}/robots.txt", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.body.contains("User-agent"));
        assert_eq!(response.content_type(), Some("text/plain"));
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_identity_headers_are_sent() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/")
            .match_header("accept-language", "de-DE,de;q=0.9,en;q=0.8")
            .match_header(
                "user-agent",
                mockito::Matcher::Regex("LeadCrawler".to_string()),
            )
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html></html>")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(1024);
        client
            .fetch_html(&format!("{}/", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_transient_status_is_retried() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = test_client(1024);
        let response = client
            .fetch(&format!("{}/flaky", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_wait_for_the_pacer() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let interval = Duration::from_millis(150);
        let pacer = Arc::new(RequestPacer::new(interval));
        let client = test_client(1024).with_pacer(Arc::clone(&pacer));

        let start = pacer.wait().await;
        client
            .fetch(&format!("{}/flaky", server.url()), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(start.elapsed() >= interval * 2);
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(1024);
        let result = client
            .fetch_html(&format!("{}/missing", server.url()), Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_post_is_never_retried() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/search")
            .match_header("x-api-key", "secret")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let client = test_client(1024);
        let response = client
            .post_json(
                &format!("{}/search", server.url()),
                &[("X-API-KEY", "secret")],
                &serde_json::json!({"q": "acme"}),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 503);
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_html_is_rejected() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/brochure.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body("%PDF-1.4")
            .expect(1)
            .create_async()
            .await;

        let client = test_client(1024);
        let result = client
            .fetch_html(
                &format!("{}/brochure.pdf", server.url()),
                Duration::from_secs(5),
            )
            .await;

        match result {
            Err(e @ FetchError::UnsupportedContentType { .. }) => {
                assert!(e.is_content_rejection())
            }
            other => panic!("expected UnsupportedContentType, got {:?}", other),
        }
        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("GET", "/huge")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body("x".repeat(4096))
            .expect(1)
            .create_async()
            .await;

        let client = test_client(100);
        let result = client
            .fetch_html(&format!("{}/huge", server.url()), Duration::from_secs(5))
            .await;

        assert!(matches!(result, Err(FetchError::TooLarge { limit: 100, .. })));
        mock_server.assert_async().await;
    }

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=ISO-8859-1"));
        assert!(is_html_content_type("application/xhtml+xml"));
        assert!(!is_html_content_type("application/pdf"));
        assert!(!is_html_content_type("image/png"));
    }
}
