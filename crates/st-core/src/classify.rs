//! URL classification: which pages are trackable and under which domain.

use url::{Host, Url};

use crate::types::Domain;

/// Schemes that belong to the browser itself rather than to a website.
const UNTRACKABLE_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-untrusted",
    "moz-extension",
    "edge",
    "devtools",
    "view-source",
    "file",
    "about",
    "data",
    "javascript",
    "blob",
];

/// Decides whether a URL is trackable and extracts its domain.
///
/// Classification is pure: malformed input yields `None`/`false`, never a panic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UrlClassifier {
    /// Reject `localhost`, loopback and private-network hosts.
    pub ignore_local_hosts: bool,
}

impl UrlClassifier {
    /// Creates a classifier.
    pub const fn new(ignore_local_hosts: bool) -> Self {
        Self { ignore_local_hosts }
    }

    /// Returns `true` if time spent on `url` should be accumulated.
    pub fn is_trackable(&self, url: &str) -> bool {
        self.domain_of(url).is_some()
    }

    /// Returns the hostname usage for `url` is accumulated under.
    pub fn domain_of(&self, url: &str) -> Option<Domain> {
        let parsed = Url::parse(url.trim()).ok()?;
        if UNTRACKABLE_SCHEMES.contains(&parsed.scheme()) {
            return None;
        }
        let host = parsed.host()?;
        if self.ignore_local_hosts && is_local_host(&host) {
            return None;
        }
        let name = parsed.host_str()?;
        Domain::new(name).ok()
    }
}

/// Classifies `url` with the default policy (local hosts are tracked).
pub fn is_trackable(url: &str) -> bool {
    UrlClassifier::default().is_trackable(url)
}

/// Extracts the domain of `url` with the default policy.
pub fn domain_of(url: &str) -> Option<Domain> {
    UrlClassifier::default().domain_of(url)
}

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => {
            let name = name.trim_end_matches('.');
            name == "localhost" || name.ends_with(".localhost") || name.ends_with(".local")
        }
        Host::Ipv4(addr) => {
            addr.is_loopback() || addr.is_private() || addr.is_link_local() || addr.is_unspecified()
        }
        Host::Ipv6(addr) => addr.is_loopback() || addr.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hostname_from_web_urls() {
        assert_eq!(
            domain_of("https://example.com/path?q=1").unwrap().as_str(),
            "example.com"
        );
        assert_eq!(
            domain_of("http://Sub.Example.COM:8080/").unwrap().as_str(),
            "sub.example.com"
        );
    }

    #[test]
    fn rejects_browser_internal_schemes() {
        for url in [
            "chrome://settings",
            "chrome-extension://abcdef/popup.html",
            "moz-extension://abcdef/options.html",
            "edge://flags",
            "file:///home/user/index.html",
            "about:blank",
            "view-source:https://example.com",
        ] {
            assert!(!is_trackable(url), "{url} should not be trackable");
            assert!(domain_of(url).is_none());
        }
    }

    #[test]
    fn rejects_malformed_input() {
        for url in ["", "   ", "not a url", "https://", "example.com"] {
            assert!(!is_trackable(url), "{url:?} should not be trackable");
        }
    }

    #[test]
    fn local_hosts_are_tracked_by_default() {
        assert!(is_trackable("http://localhost:3000/"));
        assert!(is_trackable("http://192.168.1.10/admin"));
    }

    #[test]
    fn local_hosts_can_be_ignored() {
        let classifier = UrlClassifier::new(true);
        assert!(!classifier.is_trackable("http://localhost:3000/"));
        assert!(!classifier.is_trackable("http://api.localhost/"));
        assert!(!classifier.is_trackable("http://127.0.0.1:8000/"));
        assert!(!classifier.is_trackable("http://10.0.0.4/"));
        assert!(!classifier.is_trackable("http://[::1]/"));
        assert!(classifier.is_trackable("https://github.com/"));
    }
}
