//! Ordered fallback ladder: resolver -> search-engine URL -> domain homepage.
//!
//! Ported from a chain object holding a shared resolver and trying three
//! strategies in order, stopping at the first that yields a URL. Unlike the
//! source this is layered on top of, every candidate URL is pushed through
//! the safety predicate before being accepted (see SPEC_FULL.md OQ-c): a
//! rung whose URL fails the predicate counts as that rung failing, not as
//! an unsafe URL escaping the process.

use crate::resolver::UrlResolver;
use crate::safety::is_safe_url;
use crate::types::{FallbackResult, FallbackRung, FallbackStatus, ResolutionStatus};
use crate::web_constants::lookup_common_domain;
use std::time::Instant;

pub struct FallbackChainConfig {
    pub enable_search_fallback: bool,
    pub enable_homepage_fallback: bool,
    pub search_engine_url_template: String,
}

impl Default for FallbackChainConfig {
    fn default() -> Self {
        Self {
            enable_search_fallback: true,
            enable_homepage_fallback: true,
            search_engine_url_template: "https://duckduckgo.com/?q={query}".to_string(),
        }
    }
}

pub async fn execute(resolver: &UrlResolver, query: &str, config: &FallbackChainConfig) -> FallbackResult {
    let start = Instant::now();
    let mut attempts_made = Vec::new();

    let resolution = resolver.resolve(query).await;
    if resolution.status == ResolutionStatus::Ok
        && resolution.resolved_url.is_some()
        && is_safe_url(resolution.resolved_url.as_deref())
    {
        return FallbackResult {
            status: FallbackStatus::Ok,
            final_url: resolution.resolved_url.clone(),
            fallback_used: FallbackRung::Resolution,
            attempts_made: vec!["resolution".to_string()],
            resolution_details: Some(resolution),
            elapsed_ms: start.elapsed().as_millis() as u64,
            error_message: None,
        };
    }
    attempts_made.push("resolution".to_string());

    if config.enable_search_fallback {
        if let Some(url) = search_fallback_url(query, &config.search_engine_url_template) {
            if is_safe_url(Some(&url)) {
                let mut made = attempts_made.clone();
                made.push("search".to_string());
                return FallbackResult {
                    status: FallbackStatus::Ok,
                    final_url: Some(url),
                    fallback_used: FallbackRung::Search,
                    attempts_made: made,
                    resolution_details: Some(resolution.clone()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    error_message: None,
                };
            }
        }
        attempts_made.push("search".to_string());
    }

    if config.enable_homepage_fallback {
        if !attempts_made.contains(&"search".to_string()) && config.enable_search_fallback {
            attempts_made.push("search".to_string());
        }

        if let Some(domain) = extract_domain(query) {
            let url = format!("https://{domain}");
            if is_safe_url(Some(&url)) {
                let mut made = attempts_made.clone();
                made.push("homepage".to_string());
                return FallbackResult {
                    status: FallbackStatus::Ok,
                    final_url: Some(url),
                    fallback_used: FallbackRung::Homepage,
                    attempts_made: made,
                    resolution_details: Some(resolution.clone()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    error_message: None,
                };
            }
        }
    }

    FallbackResult {
        status: FallbackStatus::AllFailed,
        final_url: None,
        fallback_used: FallbackRung::None,
        attempts_made,
        resolution_details: Some(resolution),
        elapsed_ms: start.elapsed().as_millis() as u64,
        error_message: Some("All fallback attempts exhausted".to_string()),
    }
}

fn search_fallback_url(query: &str, template: &str) -> Option<String> {
    let encoded = urlencoding::encode(query);
    Some(template.replace("{query}", &encoded))
}

/// Mirrors the homepage-fallback domain heuristic: known-domain table first,
/// else strip a trailing known TLD and require >=3 alphanumeric/hyphen chars.
fn extract_domain(query: &str) -> Option<String> {
    let lower = query.to_lowercase();
    let trimmed = lower.trim();
    let first_word = trimmed.split_whitespace().next().unwrap_or(trimmed);

    if let Some(host) = lookup_common_domain(first_word) {
        return Some(host.to_string());
    }

    let stripped = strip_known_tld(first_word);
    let looks_like_domain = !stripped.is_empty()
        && stripped.len() >= 3
        && stripped.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

    if looks_like_domain {
        Some(format!("{stripped}.com"))
    } else {
        None
    }
}

fn strip_known_tld(word: &str) -> &str {
    for tld in [".com", ".net", ".org", ".io", ".co"] {
        if let Some(stripped) = word.strip_suffix(tld) {
            return stripped;
        }
    }
    word
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn homepage_domain_extraction_known_and_generic() {
        assert_eq!(extract_domain("youtube").as_deref(), Some("www.youtube.com"));
        assert_eq!(extract_domain("gmail").as_deref(), Some("mail.google.com"));
        assert_eq!(extract_domain("example").as_deref(), Some("example.com"));
        assert_eq!(extract_domain("example.net").as_deref(), Some("example.com"));
        assert_eq!(extract_domain("youtube cats video").as_deref(), Some("www.youtube.com"));
    }

    #[test]
    fn homepage_domain_extraction_rejects_too_short() {
        assert_eq!(extract_domain("a"), None);
    }

    #[test]
    fn search_fallback_url_encodes_query() {
        let url = search_fallback_url("test query with spaces", "https://duckduckgo.com/?q={query}").unwrap();
        assert!(url.contains("test+query+with+spaces") || url.contains("test%20query%20with%20spaces"));
    }
}
