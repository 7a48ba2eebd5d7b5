//! Citation allow-list enforcement.
//!
//! Supporting references attached to a batch result must come from trusted
//! regulatory domains. URLs from anywhere else are dropped and reported as
//! warnings rather than failing the batch.

use serde::{Deserialize, Serialize};

/// A supporting reference attached to a batch result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Human-readable name of the source document.
    pub source: String,
    pub url: Option<String>,
}

/// Filters citations against a configured set of trusted domains.
///
/// A citation passes when its URL host equals an allowed domain or is a
/// subdomain of one. A leading `www.` on the host is ignored. Citations
/// without a URL pass unconditionally.
pub struct CitationValidator {
    allowed_domains: Vec<String>,
}

impl CitationValidator {
    pub fn new(allowed_domains: &[String]) -> Self {
        Self {
            allowed_domains: allowed_domains
                .iter()
                .map(|domain| domain.trim().to_lowercase())
                .filter(|domain| !domain.is_empty())
                .collect(),
        }
    }

    /// Split citations into the ones to keep and a warning per rejection.
    pub fn filter(&self, citations: Vec<Citation>) -> (Vec<Citation>, Vec<String>) {
        let mut valid = Vec::new();
        let mut warnings = Vec::new();

        for citation in citations {
            let Some(url) = &citation.url else {
                valid.push(citation);
                continue;
            };
            match host_domain(url) {
                Some(domain) if self.is_allowed(&domain) => valid.push(citation),
                Some(domain) => warnings.push(format!(
                    "Citation '{}' dropped: domain {} is not on the allow-list.",
                    citation.source, domain
                )),
                None => warnings.push(format!(
                    "Citation '{}' dropped: its URL has no recognizable host.",
                    citation.source
                )),
            }
        }

        (valid, warnings)
    }

    fn is_allowed(&self, domain: &str) -> bool {
        self.allowed_domains.iter().any(|allowed| {
            domain == allowed || domain.ends_with(&format!(".{}", allowed))
        })
    }
}

/// Extract the host from a URL and normalize it for comparison.
///
/// Scheme and userinfo are stripped if present, then everything from the
/// first `/`, `?`, `#`, or `:` onward is discarded. The result is
/// lowercased with any leading `www.` removed.
fn host_domain(url: &str) -> Option<String> {
    let rest = url.split_once("://").map_or(url.trim(), |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or("").trim().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(host.as_str());
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
