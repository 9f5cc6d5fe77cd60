//! Sitemap discovery, prioritization and bounded recursive expansion

use futures::FutureExt;
use futures::future::BoxFuture;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::crawler::BaseDomain;
use crate::http::{HttpClient, RequestPacer};
use crate::robots::RobotsCache;

/// Conventional sitemap locations tried when robots.txt lists none
const FALLBACK_PATHS: [&str; 3] = ["/sitemap_index.xml", "/sitemap.xml", "/sitemapindex.xml"];

/// Child-sitemap relevance by filename keyword, first match wins
const CHILD_SITEMAP_SCORES: &[(&str, i32)] = &[
    ("page", 120),
    ("main", 90),
    ("content", 80),
    ("general", 70),
    ("index", 60),
    ("site", 50),
    ("about", 40),
    ("company", 35),
    ("contact", 30),
    ("service", 25),
    ("job", -100),
    ("jobs", -100),
    ("career", -100),
    ("careers", -100),
    ("news", -50),
    ("blog", -50),
    ("article", -50),
    ("product", -30),
    ("shop", -30),
    ("catalog", -30),
];

const DEFAULT_CHILD_SCORE: i32 = 10;

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML deserialization error: {0}")]
    Deserialize(#[from] quick_xml::errors::serialize::DeError),

    #[error("unexpected root element <{0}>")]
    UnknownRoot(String),

    #[error("document has no root element")]
    Empty,
}

/// A sitemap URL with its filename-convention priority
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapCandidate {
    pub url: String,
    pub priority: i32,
}

/// Parsed sitemap content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// `<sitemapindex>`: child sitemap URLs
    Index(Vec<String>),
    /// `<urlset>`: page URLs
    UrlSet(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct UrlSet {
    #[serde(rename = "url", default)]
    entries: Vec<LocEntry>,
}

#[derive(Debug, Deserialize)]
struct SitemapIndex {
    #[serde(rename = "sitemap", default)]
    entries: Vec<LocEntry>,
}

#[derive(Debug, Deserialize)]
struct LocEntry {
    loc: Option<String>,
}

fn locs(entries: Vec<LocEntry>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.loc)
        .map(|loc| loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}

/// Parse a sitemap document, detecting the root element first.
pub fn parse_sitemap(xml: &str) -> Result<SitemapDocument, SitemapError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let root = loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) => {
                break String::from_utf8_lossy(element.local_name().as_ref()).to_lowercase();
            }
            Event::Eof => return Err(SitemapError::Empty),
            _ => continue,
        }
    };

    match root.as_str() {
        "sitemapindex" => {
            let index: SitemapIndex = from_str(xml)?;
            Ok(SitemapDocument::Index(locs(index.entries)))
        }
        "urlset" => {
            let set: UrlSet = from_str(xml)?;
            Ok(SitemapDocument::UrlSet(locs(set.entries)))
        }
        other => Err(SitemapError::UnknownRoot(other.to_string())),
    }
}

fn filename(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/').next().unwrap_or_default().to_lowercase()
}

/// Priority of a top-level sitemap candidate by filename convention
pub fn candidate_priority(url: &str) -> i32 {
    let name = filename(url);
    if name.contains("page-sitemap") {
        110
    } else if name == "sitemap_index.xml" {
        100
    } else if name == "sitemap.xml" {
        90
    } else if name == "sitemapindex.xml" {
        80
    } else if name.contains("index") {
        70
    } else {
        60
    }
}

/// Relevance of a child sitemap listed in a top-level index
pub fn child_sitemap_score(url: &str) -> i32 {
    let stem = filename(url)
        .replace(".xml", "")
        .replace("-sitemap", "")
        .replace("_sitemap", "");
    CHILD_SITEMAP_SCORES
        .iter()
        .find(|(keyword, _)| stem.contains(keyword))
        .map(|(_, score)| *score)
        .unwrap_or(DEFAULT_CHILD_SCORE)
}

/// Keep positively scored children, best first, at most `limit`
pub fn select_child_sitemaps(children: Vec<String>, limit: usize) -> Vec<String> {
    let mut scored: Vec<(i32, String)> = children
        .into_iter()
        .map(|url| (child_sitemap_score(&url), url))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .take(limit)
        .map(|(_, url)| url)
        .collect()
}

/// Finds sitemaps for a domain and expands them into page URLs
pub struct SitemapDiscovery {
    http: HttpClient,
    pacer: Arc<RequestPacer>,
    robots: Arc<RobotsCache>,
    max_depth: usize,
    max_children: usize,
}

impl SitemapDiscovery {
    pub fn new(
        http: HttpClient,
        pacer: Arc<RequestPacer>,
        robots: Arc<RobotsCache>,
        max_depth: usize,
        max_children: usize,
    ) -> Self {
        Self {
            http,
            pacer,
            robots,
            max_depth,
            max_children,
        }
    }

    /// Sitemap candidates from robots.txt, else the conventional paths, best first
    #[instrument(skip(self), fields(base = %base))]
    pub async fn discover_sitemaps(&self, base: &BaseDomain) -> Vec<SitemapCandidate> {
        let policy = self.robots.policy(base).await;

        let mut urls: Vec<String> = policy
            .sitemaps
            .iter()
            .filter_map(|raw| base.join(raw))
            .map(|url| url.to_string())
            .collect();
        if urls.is_empty() {
            debug!("No Sitemap directives, trying conventional paths");
            urls = FALLBACK_PATHS
                .iter()
                .map(|path| format!("{}{}", base.origin(), path))
                .collect();
        }

        let mut seen = HashSet::new();
        let mut candidates: Vec<SitemapCandidate> = urls
            .into_iter()
            .filter(|url| seen.insert(url.clone()))
            .map(|url| SitemapCandidate {
                priority: candidate_priority(&url),
                url,
            })
            .collect();
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        candidates
    }

    /// Page URLs of the first candidate that yields any; empty when none does
    #[instrument(skip(self), fields(base = %base))]
    pub async fn discover_pages(&self, base: &BaseDomain) -> Vec<String> {
        let candidates = self.discover_sitemaps(base).await;
        let total = candidates.len();

        for (index, candidate) in candidates.into_iter().enumerate() {
            let pages = self.expand(candidate.url.clone(), 0).await;
            if !pages.is_empty() {
                info!(
                    sitemap = %candidate.url,
                    pages = pages.len(),
                    skipped = total - index - 1,
                    "Sitemap yielded pages"
                );
                return pages;
            }
            debug!(sitemap = %candidate.url, "Sitemap empty or unreadable, trying next");
        }
        Vec::new()
    }

    /// Recursively collect page URLs. Anything deeper than `max_depth` contributes nothing.
    pub fn expand(&self, url: String, depth: usize) -> BoxFuture<'_, Vec<String>> {
        async move {
            if depth > self.max_depth {
                debug!(sitemap = %url, depth, "Sitemap beyond depth bound, ignored");
                return Vec::new();
            }

            self.pacer.wait().await;
            let body = match self.http.fetch(&url, self.http.default_timeout()).await {
                Ok(response) if response.is_success() => response.body,
                Ok(response) => {
                    debug!(sitemap = %url, status = response.status, "Sitemap not available");
                    return Vec::new();
                }
                Err(e) => {
                    warn!(sitemap = %url, error = %e, "Sitemap fetch failed");
                    return Vec::new();
                }
            };

            match parse_sitemap(&body) {
                Ok(SitemapDocument::UrlSet(pages)) => pages,
                Ok(SitemapDocument::Index(children)) => {
                    let children = if depth == 0 {
                        let selected = select_child_sitemaps(children, self.max_children);
                        debug!(sitemap = %url, selected = ?selected, "Selected child sitemaps");
                        selected
                    } else {
                        children
                    };
                    let mut pages = Vec::new();
                    for child in children {
                        pages.extend(self.expand(child, depth + 1).await);
                    }
                    pages
                }
                Err(e) => {
                    warn!(sitemap = %url, error = %e, "Sitemap unparseable, skipped");
                    Vec::new()
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerConfig;
    use mockito::{Mock, Server, ServerGuard};
    use std::time::Duration;

    fn discovery() -> SitemapDiscovery {
        let config = CrawlerConfig::builder().max_retries(0).build();
        let http = HttpClient::new(&config).unwrap();
        let pacer = Arc::new(RequestPacer::new(Duration::from_millis(1)));
        let robots = Arc::new(RobotsCache::new(http.clone(), pacer.clone(), "LeadCrawler"));
        SitemapDiscovery::new(http, pacer, robots, 2, 3)
    }

    fn index_xml(children: &[String]) -> String {
        let entries: String = children
            .iter()
            .map(|c| format!("<sitemap><loc>{}</loc></sitemap>", c))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
            entries
        )
    }

    fn urlset_xml(pages: &[String]) -> String {
        let entries: String = pages
            .iter()
            .map(|p| format!("<url><loc>{}</loc><lastmod>2024-01-01</lastmod></url>", p))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
            entries
        )
    }

    async fn xml_mock(server: &mut ServerGuard, path: &str, body: String, hits: usize) -> Mock {
        server
            .mock("GET", path)
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    #[test]
    fn test_parse_urlset_and_index() {
        let urlset = urlset_xml(&["https://acme.de/kontakt".to_string()]);
        assert_eq!(
            parse_sitemap(&urlset).unwrap(),
            SitemapDocument::UrlSet(vec!["https://acme.de/kontakt".to_string()])
        );

        let index = index_xml(&["https://acme.de/page-sitemap.xml".to_string()]);
        assert_eq!(
            parse_sitemap(&index).unwrap(),
            SitemapDocument::Index(vec!["https://acme.de/page-sitemap.xml".to_string()])
        );

        assert!(matches!(parse_sitemap("<html></html>"), Err(SitemapError::UnknownRoot(_))));
        assert!(parse_sitemap("").is_err());
    }

    #[test]
    fn test_candidate_priorities() {
        assert_eq!(candidate_priority("https://acme.de/page-sitemap.xml"), 110);
        assert_eq!(candidate_priority("https://acme.de/sitemap_index.xml"), 100);
        assert_eq!(candidate_priority("https://acme.de/sitemap.xml"), 90);
        assert_eq!(candidate_priority("https://acme.de/sitemapindex.xml"), 80);
        assert_eq!(candidate_priority("https://acme.de/wp-sitemap-index.xml"), 70);
        assert_eq!(candidate_priority("https://acme.de/custom.xml"), 60);
    }

    #[test]
    fn test_child_selection_drops_negative_sitemaps() {
        let children = vec![
            "https://acme.de/jobs-sitemap.xml".to_string(),
            "https://acme.de/post-sitemap.xml".to_string(),
            "https://acme.de/news-sitemap.xml".to_string(),
            "https://acme.de/page-sitemap.xml".to_string(),
            "https://acme.de/product-sitemap.xml".to_string(),
        ];
        assert_eq!(child_sitemap_score("https://acme.de/career_sitemap.xml"), -100);

        let selected = select_child_sitemaps(children, 3);
        assert_eq!(
            selected,
            vec![
                "https://acme.de/page-sitemap.xml".to_string(),
                "https://acme.de/post-sitemap.xml".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_index_expands_only_relevant_children() {
        let mut server = Server::new_async().await;
        let url = server.url();
        let index = index_xml(&[
            format!("{}/page-sitemap.xml", url),
            format!("{}/jobs-sitemap.xml", url),
            format!("{}/news-sitemap.xml", url),
        ]);

        let _index = xml_mock(&mut server, "/sitemap_index.xml", index, 1).await;
        let page = xml_mock(
            &mut server,
            "/page-sitemap.xml",
            urlset_xml(&[format!("{}/kontakt", url), format!("{}/impressum", url)]),
            1,
        )
        .await;
        let jobs = xml_mock(&mut server, "/jobs-sitemap.xml", urlset_xml(&[]), 0).await;
        let news = xml_mock(&mut server, "/news-sitemap.xml", urlset_xml(&[]), 0).await;

        let pages = discovery()
            .expand(format!("{}/sitemap_index.xml", url), 0)
            .await;

        assert_eq!(pages, vec![format!("{}/kontakt", url), format!("{}/impressum", url)]);
        page.assert_async().await;
        jobs.assert_async().await;
        news.assert_async().await;
    }

    #[tokio::test]
    async fn test_expansion_stops_at_depth_bound() {
        let mut server = Server::new_async().await;
        let url = server.url();

        let _root = xml_mock(&mut server, "/sitemap_index.xml", index_xml(&[format!("{}/main-index.xml", url)]), 1).await;
        let _level1 = xml_mock(&mut server, "/main-index.xml", index_xml(&[format!("{}/nested-index.xml", url)]), 1).await;
        let _level2 = xml_mock(&mut server, "/nested-index.xml", index_xml(&[format!("{}/too-deep.xml", url)]), 1).await;
        let too_deep = xml_mock(&mut server, "/too-deep.xml", urlset_xml(&[format!("{}/kontakt", url)]), 0).await;

        let pages = discovery()
            .expand(format!("{}/sitemap_index.xml", url), 0)
            .await;

        assert!(pages.is_empty());
        too_deep.assert_async().await;
    }

    #[tokio::test]
    async fn test_first_productive_sitemap_short_circuits() {
        let mut server = Server::new_async().await;
        let url = server.url();
        let robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body(format!(
                "User-agent: *\nAllow: /\nSitemap: {url}/sitemap.xml\nSitemap: {url}/page-sitemap.xml\n"
            ))
            .expect(1)
            .create_async()
            .await;

        let first = xml_mock(&mut server, "/page-sitemap.xml", urlset_xml(&[format!("{}/team", url)]), 1).await;
        let second = xml_mock(&mut server, "/sitemap.xml", urlset_xml(&[format!("{}/kontakt", url)]), 0).await;

        let base = BaseDomain::from_url(&url).unwrap();
        let pages = discovery().discover_pages(&base).await;

        assert_eq!(pages, vec![format!("{}/team", url)]);
        robots.assert_async().await;
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_unparseable_sitemap_falls_through_to_next() {
        let mut server = Server::new_async().await;
        let url = server.url();

        let broken = server
            .mock("GET", "/sitemap_index.xml")
            .with_status(200)
            .with_body("<html><body>Not a sitemap</body></html>")
            .expect(1)
            .create_async()
            .await;
        let working = xml_mock(&mut server, "/sitemap.xml", urlset_xml(&[format!("{}/ueber-uns", url)]), 1).await;
        let unused = xml_mock(&mut server, "/sitemapindex.xml", urlset_xml(&[]), 0).await;

        let base = BaseDomain::from_url(&url).unwrap();
        let pages = discovery().discover_pages(&base).await;

        assert_eq!(pages, vec![format!("{}/ueber-uns", url)]);
        broken.assert_async().await;
        working.assert_async().await;
        unused.assert_async().await;
    }
}
