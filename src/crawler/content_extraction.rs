//! Layered content extraction for fetched pages
//!
//! Strategies run in order and the first that produces text wins: structural
//! main-content containers, heading sections, then the whole document with
//! boilerplate removed. The same pass decides whether the page should be sent
//! to the rendering fallback.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::crawler::relevance::{PageCategory, category_for_label, classify};
use crate::crawler::{BaseDomain, CrawlerConfig};
use crate::summarize::normalize_whitespace;

/// Elements whose subtree never contributes text
const BOILERPLATE_TAGS: &[&str] = &[
    "script", "style", "noscript", "svg", "form", "input", "button", "iframe", "header", "nav",
    "aside", "footer", "template", "video", "picture", "canvas", "source", "img",
];

const MAIN_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role='main']",
    ".main-content",
    "#main-content",
    ".content",
    "#content",
    ".post-content",
    ".entry-content",
    ".page-content",
    ".site-main",
    ".site-content",
    ".container",
    ".elementor",
    ".elementor-section",
    ".elementor-container",
    ".elementor-widget",
    ".elementor-text-editor",
    ".elementor-heading-title",
    ".wp-block-post-content",
    ".wp-block-group",
    ".single-post",
    ".hentry",
    ".entry-title",
];

/// Empty client-side application mount points
const SPA_MOUNTS: &[&str] = &["#root", "#app", "#__next", "#__nuxt", "[data-reactroot]"];

/// Pages below this length whose `<noscript>` mentions JavaScript are rendered
const NOSCRIPT_TEXT_CEILING: usize = 800;

static BOILERPLATE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(^|[-_])(cookie|consent|banner|popup|modal|newsletter|subscribe|share|advert|ads|tracking|breadcrumb|comment|sidebar|offcanvas)([-_]|$)",
    )
    .expect("boilerplate pattern is valid")
});

/// Which strategy produced the text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    Structural,
    Headings,
    Document,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionSource::Structural => f.write_str("structural"),
            ExtractionSource::Headings => f.write_str("headings"),
            ExtractionSource::Document => f.write_str("document"),
        }
    }
}

/// Why a page should be re-fetched through the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderReason {
    /// Extracted text is below the render threshold
    LowText,
    /// The markup depends on script execution
    ScriptRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedContent {
    pub text: String,
    pub source: ExtractionSource,
}

/// Result of analyzing one HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAnalysis {
    pub content: Option<ExtractedContent>,
    pub render_reason: Option<RenderReason>,
}

impl PageAnalysis {
    pub fn needs_render(&self) -> bool {
        self.render_reason.is_some()
    }

    /// Character count of the extracted text, zero when nothing was found
    pub fn text_len(&self) -> usize {
        self.content
            .as_ref()
            .map(|c| c.text.chars().count())
            .unwrap_or(0)
    }
}

fn parse_selectors(patterns: &[&str]) -> Vec<Selector> {
    patterns
        .iter()
        .filter_map(|pattern| match Selector::parse(pattern) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Failed to parse selector '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

fn parse_selector(pattern: &str) -> Option<Selector> {
    parse_selectors(&[pattern]).into_iter().next()
}

fn is_boilerplate(element: ElementRef<'_>) -> bool {
    let value = element.value();
    match value.name() {
        "html" | "body" => return false,
        name if BOILERPLATE_TAGS.contains(&name) => return true,
        _ => {}
    }
    ["class", "id"]
        .iter()
        .filter_map(|attr| value.attr(attr))
        .flat_map(str::split_whitespace)
        .any(|token| BOILERPLATE_TOKEN.is_match(token))
}

fn inside_boilerplate(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(is_boilerplate)
}

/// Append the text of `element`, skipping boilerplate subtrees.
fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            out.push(' ');
        } else if let Some(child_element) = ElementRef::wrap(child) {
            if !is_boilerplate(child_element) {
                collect_text(child_element, out);
            }
        }
    }
}

fn clean_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    normalize_whitespace(&raw)
}

fn heading_level(element: ElementRef<'_>) -> Option<u8> {
    match element.value().name() {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// LinkedIn company and profile links found anywhere in the raw markup
pub fn extract_social_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(anchors) = parse_selector("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        let lowered = href.to_lowercase();
        if !(lowered.contains("linkedin.com/company/") || lowered.contains("linkedin.com/in/")) {
            continue;
        }
        let absolute = if let Some(rest) = href.strip_prefix("//") {
            format!("https://{}", rest)
        } else if lowered.starts_with("http://") || lowered.starts_with("https://") {
            href.to_string()
        } else {
            continue;
        };
        let clean = absolute
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        if seen.insert(clean.to_lowercase()) {
            links.push(clean);
        }
    }
    links
}

/// Same-domain links from navigation, header and footer whose label or path
/// names an organizational page.
pub fn extract_navigation_links(html: &str, base: &BaseDomain) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(anchors) = parse_selector("nav a[href], header a[href], footer a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(candidate) = classify(base, href) else {
            continue;
        };
        if candidate.is_foreign_language {
            continue;
        }
        let label = normalize_whitespace(&anchor.text().collect::<String>());
        let relevant = candidate.category != PageCategory::Other
            || category_for_label(&label) != PageCategory::Other;
        if relevant && seen.insert(candidate.url.clone()) {
            links.push(candidate.url);
        }
    }
    links
}

/// Compiled selectors and thresholds for page analysis
pub struct ContentExtractor {
    main_selectors: Vec<Selector>,
    spa_mounts: Vec<Selector>,
    headings: Option<Selector>,
    noscript: Option<Selector>,
    body: Option<Selector>,
    min_main_content_chars: usize,
    min_section_chars: usize,
    render_min_text_chars: usize,
}

impl ContentExtractor {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            main_selectors: parse_selectors(MAIN_SELECTORS),
            spa_mounts: parse_selectors(SPA_MOUNTS),
            headings: parse_selector("h1, h2, h3, h4, h5, h6"),
            noscript: parse_selector("noscript"),
            body: parse_selector("body"),
            min_main_content_chars: config.min_main_content_chars,
            min_section_chars: config.min_section_chars,
            render_min_text_chars: config.render_min_text_chars,
        }
    }

    /// Extract text and decide on rendering
    pub fn analyze(&self, html: &str) -> PageAnalysis {
        let document = Html::parse_document(html);
        let content = self.extract(&document);
        let text_len = content
            .as_ref()
            .map(|c| c.text.chars().count())
            .unwrap_or(0);

        let render_reason = if self.has_empty_app_mount(&document)
            || (text_len < NOSCRIPT_TEXT_CEILING && self.noscript_demands_javascript(&document))
        {
            Some(RenderReason::ScriptRequired)
        } else if text_len < self.render_min_text_chars {
            Some(RenderReason::LowText)
        } else {
            None
        };

        PageAnalysis {
            content,
            render_reason,
        }
    }

    /// Run the strategies in order on a parsed document
    pub fn extract(&self, document: &Html) -> Option<ExtractedContent> {
        if let Some(text) = self.structural(document) {
            return Some(ExtractedContent {
                text,
                source: ExtractionSource::Structural,
            });
        }
        if let Some(text) = self.heading_sections(document) {
            return Some(ExtractedContent {
                text,
                source: ExtractionSource::Headings,
            });
        }
        self.whole_document(document).map(|text| ExtractedContent {
            text,
            source: ExtractionSource::Document,
        })
    }

    fn structural(&self, document: &Html) -> Option<String> {
        for selector in &self.main_selectors {
            for element in document.select(selector) {
                if is_boilerplate(element) || inside_boilerplate(element) {
                    continue;
                }
                let text = clean_text(element);
                if text.chars().count() > self.min_main_content_chars {
                    debug!(chars = text.len(), "Main content container found");
                    return Some(text);
                }
            }
        }
        None
    }

    fn heading_sections(&self, document: &Html) -> Option<String> {
        let headings = self.headings.as_ref()?;
        let mut sections = Vec::new();

        for heading in document.select(headings) {
            if inside_boilerplate(heading) {
                continue;
            }
            let Some(level) = heading_level(heading) else {
                continue;
            };

            let mut raw = String::new();
            collect_text(heading, &mut raw);
            raw.push(' ');
            for sibling in heading.next_siblings() {
                if let Some(text) = sibling.value().as_text() {
                    raw.push_str(text);
                    raw.push(' ');
                    continue;
                }
                let Some(element) = ElementRef::wrap(sibling) else {
                    continue;
                };
                if heading_level(element).is_some_and(|l| l <= level) {
                    break;
                }
                if !is_boilerplate(element) {
                    collect_text(element, &mut raw);
                }
            }

            let section = normalize_whitespace(&raw);
            if section.chars().count() > self.min_section_chars {
                sections.push(section);
            }
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }

    fn whole_document(&self, document: &Html) -> Option<String> {
        let root = self
            .body
            .as_ref()
            .and_then(|body| document.select(body).next())
            .unwrap_or_else(|| document.root_element());
        let text = clean_text(root);
        if text.is_empty() { None } else { Some(text) }
    }

    fn has_empty_app_mount(&self, document: &Html) -> bool {
        self.spa_mounts.iter().any(|selector| {
            document
                .select(selector)
                .any(|mount| mount.text().all(|t| t.trim().is_empty()))
        })
    }

    fn noscript_demands_javascript(&self, document: &Html) -> bool {
        let Some(noscript) = &self.noscript else {
            return false;
        };
        document.select(noscript).any(|element| {
            element
                .text()
                .collect::<String>()
                .to_lowercase()
                .contains("javascript")
        })
    }
}

/// Append discovered social profile links to extracted text
pub fn append_social_links(text: &str, links: &[String]) -> String {
    if links.is_empty() {
        return text.to_string();
    }
    let list: Vec<String> = links.iter().map(|link| format!("- {}", link)).collect();
    format!("{}\n\nSocial media links:\n{}", text, list.join("\n"))
}
