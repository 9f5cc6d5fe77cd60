//! The canonical company domain a crawl is confined to.

use std::fmt;
use url::Url;

/// Normalized origin of the company website.
///
/// Built from a search hit it is always `https` on the default port. Built from an
/// explicit URL it keeps the given scheme and port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BaseDomain {
    homepage: Url,
}

impl BaseDomain {
    /// Normalize a search-result URL (scheme optional) to `https://host`.
    pub fn from_search_url(raw: &str) -> Option<Self> {
        let url = parse_lenient(raw)?;
        let host = url.host_str()?.to_ascii_lowercase();
        if host.is_empty() {
            return None;
        }
        let homepage = Url::parse(&format!("https://{}/", host)).ok()?;
        Some(Self { homepage })
    }

    /// Use an explicitly given URL's origin, keeping scheme and port.
    pub fn from_url(raw: &str) -> Result<Self, url::ParseError> {
        let mut homepage = parse_lenient(raw).ok_or(url::ParseError::EmptyHost)?;
        if homepage.host_str().is_none_or(str::is_empty) {
            return Err(url::ParseError::EmptyHost);
        }
        homepage.set_path("/");
        homepage.set_query(None);
        homepage.set_fragment(None);
        Ok(Self { homepage })
    }

    pub fn host(&self) -> &str {
        self.homepage.host_str().unwrap_or_default()
    }

    pub fn scheme(&self) -> &str {
        self.homepage.scheme()
    }

    /// `scheme://host[:port]` without a trailing slash
    pub fn origin(&self) -> String {
        self.homepage.as_str().trim_end_matches('/').to_string()
    }

    /// The homepage URL
    pub fn homepage(&self) -> &Url {
        &self.homepage
    }

    /// Resolve an absolute or site-relative reference against the homepage
    pub fn join(&self, reference: &str) -> Option<Url> {
        self.homepage.join(reference.trim()).ok()
    }

    /// Same-domain invariant: equal host or a subdomain of it, on the same port
    pub fn contains(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let base = self.host();
        let host_matches = host == base || host.ends_with(&format!(".{}", base));
        let port_matches = match self.homepage.port() {
            Some(port) => url.port() == Some(port),
            None => true,
        };
        host_matches && port_matches
    }

    /// Whether `url` is the homepage itself (any scheme, trailing slash ignored)
    pub fn is_homepage(&self, url: &Url) -> bool {
        url.host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(self.host()))
            && url.port() == self.homepage.port()
            && matches!(url.path(), "" | "/")
            && url.query().is_none()
    }
}

impl fmt::Display for BaseDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.origin())
    }
}

/// Parse a URL, assuming `https://` when no scheme is given.
pub(crate) fn parse_lenient(raw: &str) -> Option<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.contains("://") {
        Url::parse(raw).ok()
    } else {
        Url::parse(&format!("https://{}", raw)).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_urls_are_normalized_to_https_origin() {
        let base = BaseDomain::from_search_url("http://WWW.Acme.de/impressum?x=1#top").unwrap();
        assert_eq!(base.origin(), "https://www.acme.de");

        let bare = BaseDomain::from_search_url("acme.de/impressum").unwrap();
        assert_eq!(bare.origin(), "https://acme.de");
        assert_eq!(bare.homepage().as_str(), "https://acme.de/");

        assert!(BaseDomain::from_search_url("").is_none());
    }

    #[test]
    fn test_explicit_url_keeps_scheme_and_port() {
        let base = BaseDomain::from_url("http://127.0.0.1:4321/some/path").unwrap();
        assert_eq!(base.origin(), "http://127.0.0.1:4321");
        assert_eq!(base.join("/kontakt").unwrap().as_str(), "http://127.0.0.1:4321/kontakt");
    }

    #[test]
    fn test_same_domain_includes_subdomains_only() {
        let base = BaseDomain::from_search_url("acme.de").unwrap();

        assert!(base.contains(&Url::parse("https://acme.de/kontakt").unwrap()));
        assert!(base.contains(&Url::parse("http://karriere.acme.de/").unwrap()));
        assert!(!base.contains(&Url::parse("https://notacme.de/").unwrap()));
        assert!(!base.contains(&Url::parse("https://acme.de.evil.com/").unwrap()));
        assert!(!base.contains(&Url::parse("mailto:info@acme.de").unwrap()));
    }

    #[test]
    fn test_homepage_detection() {
        let base = BaseDomain::from_search_url("acme.de").unwrap();

        assert!(base.is_homepage(&Url::parse("https://acme.de").unwrap()));
        assert!(base.is_homepage(&Url::parse("http://ACME.de/").unwrap()));
        assert!(!base.is_homepage(&Url::parse("https://acme.de/kontakt").unwrap()));
    }
}
