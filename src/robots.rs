//! Per-host robots.txt policies, fetched once and shared by every worker
//!
//! The cache populates each host single-flight: concurrent first lookups for the same
//! host share one fetch. Any fetch failure or non-success status yields an allow-all
//! policy, so an unreachable robots.txt never blocks a crawl.

use crate::crawler::BaseDomain;
use crate::http::{HttpClient, RequestPacer};
use chrono::{DateTime, Utc};
use robotstxt::DefaultMatcher;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Parsed robots directives for one host
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    pub host: String,
    /// Raw robots.txt body; `None` means allow everything
    rules: Option<String>,
    pub sitemaps: Vec<String>,
    pub fetched_at: DateTime<Utc>,
}

impl RobotsPolicy {
    /// A policy that allows every URL
    pub fn allow_all(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            rules: None,
            sitemaps: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    /// Parse a fetched robots.txt body. A leading byte-order mark is ignored.
    pub fn from_body(host: impl Into<String>, body: &str) -> Self {
        let body = body.strip_prefix('\u{feff}').unwrap_or(body);
        Self {
            host: host.into(),
            rules: Some(body.to_string()),
            sitemaps: parse_sitemap_directives(body),
            fetched_at: Utc::now(),
        }
    }

    /// True when the policy came from a failed fetch
    pub fn is_fail_open(&self) -> bool {
        self.rules.is_none()
    }

    pub fn is_allowed(&self, user_agent: &str, url: &str) -> bool {
        match &self.rules {
            None => true,
            Some(body) if body.trim().is_empty() => true,
            Some(body) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, user_agent, url)
            }
        }
    }
}

/// `Sitemap:` directives in file order, case-insensitive
fn parse_sitemap_directives(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| {
            let line = line.trim();
            let (key, value) = line.split_once(':')?;
            if !key.trim().eq_ignore_ascii_case("sitemap") {
                return None;
            }
            let value = value.split('#').next().unwrap_or_default().trim();
            (!value.is_empty()).then(|| value.to_string())
        })
        .collect()
}

type PolicySlot = Arc<OnceCell<Arc<RobotsPolicy>>>;

/// Process-lifetime cache of robots policies keyed by origin
pub struct RobotsCache {
    http: HttpClient,
    pacer: Arc<RequestPacer>,
    user_agent: String,
    policies: Mutex<HashMap<String, PolicySlot>>,
}

impl RobotsCache {
    pub fn new(http: HttpClient, pacer: Arc<RequestPacer>, user_agent: impl Into<String>) -> Self {
        Self {
            http,
            pacer,
            user_agent: user_agent.into(),
            policies: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `url` may be fetched. Relative URLs resolve against `base`.
    #[instrument(skip(self, base), fields(base = %base))]
    pub async fn is_allowed(&self, base: &BaseDomain, url: &str) -> bool {
        let Some(resolved) = base.join(url) else {
            warn!(url, "Unparseable URL, treating as allowed");
            return true;
        };
        let policy = self.policy_for(&resolved).await;
        let allowed = policy.is_allowed(&self.user_agent, resolved.as_str());
        if !allowed {
            info!(url = %resolved, "Disallowed by robots.txt");
        }
        allowed
    }

    /// The cached policy for the homepage host
    pub async fn policy(&self, base: &BaseDomain) -> Arc<RobotsPolicy> {
        self.policy_for(base.homepage()).await
    }

    /// Drop the cached policy so the next lookup refetches it
    pub fn invalidate(&self, base: &BaseDomain) {
        let key = cache_key(base.homepage());
        let mut policies = self.policies.lock().unwrap_or_else(|e| e.into_inner());
        if policies.remove(&key).is_some() {
            debug!(key, "Invalidated robots policy");
        }
    }

    async fn policy_for(&self, url: &Url) -> Arc<RobotsPolicy> {
        let key = cache_key(url);
        let slot = {
            let mut policies = self.policies.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(policies.entry(key.clone()).or_default())
        };

        let policy = slot.get_or_init(|| self.fetch_policy(key)).await;
        Arc::clone(policy)
    }

    async fn fetch_policy(&self, origin: String) -> Arc<RobotsPolicy> {
        let robots_url = format!("{}/robots.txt", origin);
        self.pacer.wait().await;

        let policy = match self.http.fetch(&robots_url, self.http.default_timeout()).await {
            Ok(response) if response.is_success() => {
                debug!(url = %robots_url, "Fetched robots.txt");
                RobotsPolicy::from_body(origin, &response.body)
            }
            Ok(response) => {
                debug!(url = %robots_url, status = response.status, "No usable robots.txt, allowing all");
                RobotsPolicy::allow_all(origin)
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt fetch failed, allowing all");
                RobotsPolicy::allow_all(origin)
            }
        };
        Arc::new(policy)
    }
}

/// `scheme://host[:port]`, lowercased
fn cache_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}
