//! Homepage resolution from web search results

use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};

use crate::crawler::domain::parse_lenient;
use crate::crawler::{BaseDomain, CrawlError};
use crate::search::{SearchHit, SearchProvider};

/// Social networks, job boards, registries and review sites that never count as a homepage
pub const EXCLUDED_DOMAINS: &[&str] = &[
    "facebook.com",
    "linkedin.com",
    "xing.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "youtube.com",
    "kununu.com",
    "stepstone.de",
    "glassdoor.de",
    "glassdoor.com",
    "indeed.com",
    "northdata.de",
    "northdata.com",
];

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w\-]+").expect("token pattern is valid"));

/// Lowercase query tokens longer than two characters
pub fn query_tokens(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TOKEN
        .find_iter(&query.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|token| token.chars().count() > 2 && seen.insert(token.clone()))
        .collect()
}

/// Whether `host` belongs to an excluded platform, subdomains included
pub fn is_excluded_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    EXCLUDED_DOMAINS
        .iter()
        .any(|excluded| host == *excluded || host.ends_with(&format!(".{}", excluded)))
}

/// `(domain token overlap, -path depth)`, or `None` for unusable or excluded hits
pub fn score_hit(tokens: &[String], hit: &SearchHit) -> Option<(usize, i64)> {
    let url = parse_lenient(&hit.url)?;
    let host = url.host_str()?.to_ascii_lowercase();
    if is_excluded_host(&host) {
        debug!(url = %hit.url, "Excluded platform hit");
        return None;
    }

    let host_tokens: HashSet<&str> = TOKEN.find_iter(&host).map(|m| m.as_str()).collect();
    let overlap = tokens
        .iter()
        .filter(|token| host_tokens.contains(token.as_str()))
        .count();
    let depth = url.path().split('/').filter(|s| !s.is_empty()).count() as i64;
    Some((overlap, -depth))
}

/// Picks the company homepage from one search query on the company name
pub struct HomepageResolver {
    search: Arc<dyn SearchProvider>,
}

impl HomepageResolver {
    pub fn new(search: Arc<dyn SearchProvider>) -> Self {
        Self { search }
    }

    #[instrument(skip(self))]
    pub async fn resolve(&self, company_name: &str) -> Result<BaseDomain, CrawlError> {
        let failure = |reason: String| CrawlError::ResolutionFailure {
            query: company_name.to_string(),
            reason,
        };

        let query = company_name.trim();
        if query.is_empty() {
            return Err(failure("empty company name".to_string()));
        }

        let hits = self.search.search(query).await.map_err(|e| {
            warn!(error = %e, "Search failed");
            failure(e.to_string())
        })?;
        debug!(hits = hits.len(), "Search returned");

        let base = select_homepage(query, &hits)
            .ok_or_else(|| failure(format!("none of {} search hits is usable", hits.len())))?;
        info!(base = %base, "Resolved company homepage");
        Ok(base)
    }
}

/// Highest-scoring usable hit; the earliest one wins ties.
pub fn select_homepage(query: &str, hits: &[SearchHit]) -> Option<BaseDomain> {
    let tokens = query_tokens(query);
    let mut best: Option<((usize, i64), &SearchHit)> = None;

    for hit in hits {
        let Some(score) = score_hit(&tokens, hit) else {
            continue;
        };
        if best.is_none_or(|(best_score, _)| score > best_score) {
            best = Some((score, hit));
        }
    }

    best.and_then(|(_, hit)| BaseDomain::from_search_url(&hit.url))
}
