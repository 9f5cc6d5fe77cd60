//! URL relevance filter
//!
//! Classifies discovered page URLs against a taxonomy of organizational page types
//! and keeps the best `K`. Foreign-language mirrors and off-domain URLs are dropped
//! before ranking. The homepage is always the first candidate.

use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::crawler::BaseDomain;

/// Score of the homepage, above any category/language combination
pub const HOMEPAGE_PRIORITY: i32 = 300;

const DOMESTIC_LOCALES: &[&str] = &["de", "de-de", "de-at", "de_at", "de-ch", "de_ch"];

/// Locale and country folders that are neither domestic nor excluded. Codes that double
/// as page names (`hr`, `it`, `id`) are left out.
const OTHER_LOCALES: &[&str] = &[
    "at", "ch", "li", "lu", "de-li", "de-lu", "fr-ch", "it-ch", "en-ch", "en-de", "cs", "cz",
    "da", "dk", "sv", "se", "nb", "no", "fi", "hu", "tr", "el", "sk", "sl", "ro", "bg", "lt",
    "lv", "et", "uk",
];

const FOREIGN_PREFIXES: &[&str] = &[
    "/en/", "/en-gb/", "/en-us/", "/fr/", "/fr-fr/", "/es/", "/es-es/", "/it/", "/it-it/",
    "/nl/", "/nl-nl/", "/pt/", "/pt-pt/", "/pt-br/", "/pl/", "/pl-pl/", "/ru/", "/ru-ru/",
    "/zh/", "/zh-cn/", "/zh-tw/", "/ja/", "/ja-jp/", "/ko/", "/ko-kr/",
];

const DOMESTIC_BONUS: i32 = 100;
const OTHER_LOCALE_BONUS: i32 = 75;

const LEGAL_KEYWORDS: &str = "impressum|imprint|legal-notice|legal|disclaimer|rechtliches|\
rechtliche-hinweise|agb|allgemeine-geschaeftsbedingungen|allgemeine-geschäftsbedingungen|terms|\
terms-of-service|terms-conditions|nutzungsbedingungen|geschaeftsbedingungen|geschäftsbedingungen";

const CONTACT_KEYWORDS: &str = "kontakt|kontaktformular|kontaktieren|anfrage|anfragen|erreichen|\
schreiben|nachricht|email|telefon|hotline|kundenservice|kundendienst|support|hilfe|beratung|\
service|contact|contact-us|get-in-touch|reach-us|write-us";

const TEAM_KEYWORDS: &str = "team|teams|mitarbeiter|mitglieder|kollegen|belegschaft|personal|\
führung|fuehrung|geschäftsleitung|geschaeftsleitung|geschaeftsfuehrung|geschäftsführung|\
führungsteam|fuehrungsteam|management|leitung|vorstand|organigramm|organisation|experten|\
fachkräfte|fachkraefte|crew|staff|partner|ansprechpartner|ansprechpersonen|kontaktpersonen|\
unser-team|our-team|who-is-who";

const ABOUT_KEYWORDS: &str = "ueber-uns|über-uns|uber-uns|unternehmen|historie|geschichte|\
philosophie|vision|mission|werte|leitbild|firma|betrieb|organisation|corporate|wir|portrait|\
porträt|about|about-us|who-we-are|company|profil|firmenprofil|unternehmensportraet|\
unternehmensportrait|firmengeschichte|firmenphilosophie";

const LOCATION_KEYWORDS: &str = "standorte|standort|büro|buero|office|offices|niederlassungen|\
filialen|zentrale|hauptsitz|hauptstandort|adresse|adressen|kontaktdaten|wo-finden-sie-uns|\
anfahrt|wegbeschreibung|locations|location|find-us|directions|map|maps|lageplan";

fn keyword_family(keywords: &str) -> Regex {
    Regex::new(&format!(r"(?i)^(?:{})(?:[-_][\w-]+)?$", keywords))
        .expect("keyword family pattern is valid")
}

/// Category patterns in detection order
static TAXONOMY: LazyLock<Vec<(PageCategory, Regex)>> = LazyLock::new(|| {
    vec![
        (PageCategory::Legal, keyword_family(LEGAL_KEYWORDS)),
        (PageCategory::Contact, keyword_family(CONTACT_KEYWORDS)),
        (PageCategory::Team, keyword_family(TEAM_KEYWORDS)),
        (PageCategory::About, keyword_family(ABOUT_KEYWORDS)),
        (PageCategory::Locations, keyword_family(LOCATION_KEYWORDS)),
    ]
});

/// Organizational page type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageCategory {
    Home,
    Legal,
    Contact,
    Team,
    About,
    Locations,
    Other,
}

impl PageCategory {
    /// Importance weight; imprint and contact highest, locations lowest
    pub fn weight(self) -> i32 {
        match self {
            PageCategory::Home => HOMEPAGE_PRIORITY,
            PageCategory::Legal | PageCategory::Contact => 95,
            PageCategory::Team | PageCategory::About => 90,
            PageCategory::Locations => 75,
            PageCategory::Other => 0,
        }
    }
}

/// A ranked page URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageCandidate {
    pub url: String,
    pub priority: i32,
    pub category: PageCategory,
    pub is_foreign_language: bool,
}

impl PageCandidate {
    fn homepage(base: &BaseDomain) -> Self {
        Self {
            url: base.homepage().to_string(),
            priority: HOMEPAGE_PRIORITY,
            category: PageCategory::Home,
            is_foreign_language: false,
        }
    }
}

/// Category of a single path segment or link label
pub fn category_for_segment(segment: &str) -> PageCategory {
    let segment = segment.trim().to_lowercase();
    let segment = segment
        .strip_suffix(".html")
        .or_else(|| segment.strip_suffix(".htm"))
        .unwrap_or(&segment);
    TAXONOMY
        .iter()
        .find(|(_, pattern)| pattern.is_match(segment))
        .map(|(category, _)| *category)
        .unwrap_or(PageCategory::Other)
}

/// Category of a navigation link label such as "Über uns"
pub fn category_for_label(label: &str) -> PageCategory {
    let slug = label.split_whitespace().collect::<Vec<_>>().join("-");
    category_for_segment(&slug)
}

fn is_foreign_path(path: &str) -> bool {
    let with_slash = format!("{}/", path.trim_end_matches('/'));
    FOREIGN_PREFIXES
        .iter()
        .any(|prefix| with_slash.starts_with(prefix))
}

/// Canonical form: base scheme, candidate host and port, path without trailing slash.
fn normalize(base: &BaseDomain, url: &Url) -> String {
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
    format!(
        "{}://{}{}{}",
        base.scheme(),
        host,
        port,
        url.path().trim_end_matches('/')
    )
}

/// Classify one discovered URL. `None` when it is unparseable or outside the domain.
pub fn classify(base: &BaseDomain, raw: &str) -> Option<PageCandidate> {
    let url = base.join(raw)?;
    if !base.contains(&url) {
        return None;
    }

    let path = urlencoding::decode(url.path())
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| url.path().to_string())
        .to_lowercase();

    if is_foreign_path(&path) {
        return Some(PageCandidate {
            url: normalize(base, &url),
            priority: 0,
            category: PageCategory::Other,
            is_foreign_language: true,
        });
    }

    let mut segments = path.split('/').filter(|s| !s.is_empty()).peekable();
    let mut language_bonus = DOMESTIC_BONUS;
    if let Some(&first) = segments.peek() {
        if DOMESTIC_LOCALES.contains(&first) {
            segments.next();
        } else if OTHER_LOCALES.contains(&first) {
            language_bonus = OTHER_LOCALE_BONUS;
            segments.next();
        }
    }

    let category = segments
        .next()
        .map(category_for_segment)
        .unwrap_or(PageCategory::Other);
    let priority = match category {
        PageCategory::Other => 0,
        matched => matched.weight() + language_bonus,
    };

    Some(PageCandidate {
        url: normalize(base, &url),
        priority,
        category,
        is_foreign_language: false,
    })
}

/// Top `k` candidates, homepage first, ties kept in discovery order.
pub fn filter_candidates(base: &BaseDomain, urls: &[String], k: usize) -> Vec<PageCandidate> {
    let homepage = PageCandidate::homepage(base);
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(homepage.url.clone());
    seen.insert(normalize(base, base.homepage()));

    let mut ranked = Vec::new();
    for raw in urls {
        let Some(candidate) = classify(base, raw) else {
            debug!(url = %raw, "Dropped: outside company domain");
            continue;
        };
        if candidate.is_foreign_language {
            debug!(url = %candidate.url, "Dropped: foreign-language page");
            continue;
        }
        if candidate.category == PageCategory::Other {
            continue;
        }
        if !seen.insert(candidate.url.clone()) {
            continue;
        }
        ranked.push(candidate);
    }

    ranked.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut selected = Vec::with_capacity(k.max(1));
    selected.push(homepage);
    selected.extend(ranked.into_iter().take(k.saturating_sub(1)));
    debug!(selected = selected.len(), "Relevance filter applied");
    selected
}
