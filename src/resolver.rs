//! Headless-browser URL resolver: scans a page for the best-matching link
//! for an ambiguous web-target query ("youtube cats", "login to github").
//!
//! DOM extraction happens via one `Page::evaluate` call that returns raw
//! anchor data (href/text/aria-label) as JSON; candidate scoring and
//! relative-URL resolution both happen in-process afterward. Absolute-URL
//! resolution deliberately uses `url::Url::join` rather than asking the page
//! to evaluate `new URL(...)` itself, so a compromised page can't hand back
//! an arbitrary string dressed up as the "resolved" URL.

use crate::cache::UrlResolutionCache;
use crate::types::{ResolutionResult, ResolutionStatus};
use crate::web_constants::{
    lookup_common_domain, LOGIN_TERMS, SCORE_ARIA_LABEL_MATCH, SCORE_EXACT_TEXT_MATCH, SCORE_PER_TERM_MATCH,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

const RESOLVER_CACHE_TTL_SECS: u64 = 900;
const RESOLVER_CACHE_MAX_SIZE: usize = 100;
const MAX_ANCHORS_SCANNED: usize = 100;
const MAX_CANDIDATES: usize = 20;

#[derive(Debug, Clone)]
struct LinkCandidate {
    url: String,
    link_text: String,
    aria_label: Option<String>,
    position_score: f64,
}

#[derive(Debug, Deserialize)]
struct RawAnchor {
    href: Option<String>,
    text: Option<String>,
    aria_label: Option<String>,
}

const EXTRACT_ANCHORS_JS: &str = r#"
(() => {
  const anchors = Array.from(document.querySelectorAll('a[href]')).slice(0, 100);
  return anchors.map(a => ({
    href: a.getAttribute('href'),
    text: (a.innerText || '').trim(),
    aria_label: a.getAttribute('aria-label'),
  }));
})()
"#;

struct ResolverSession {
    browser: Browser,
    page: Page,
}

/// Separate profile from the persistent web executor; single reused page,
/// guarded so only one resolution runs at a time.
pub struct UrlResolver {
    session: AsyncMutex<Option<ResolverSession>>,
    cache: AsyncMutex<UrlResolutionCache>,
    profile_dir: std::path::PathBuf,
    navigation_timeout: Duration,
    search_engine_url_template: String,
}

impl UrlResolver {
    pub fn new(profile_dir: std::path::PathBuf, search_engine_url_template: String) -> Self {
        Self {
            session: AsyncMutex::new(None),
            cache: AsyncMutex::new(UrlResolutionCache::new(RESOLVER_CACHE_MAX_SIZE, RESOLVER_CACHE_TTL_SECS)),
            profile_dir,
            navigation_timeout: Duration::from_secs(30),
            search_engine_url_template,
        }
    }

    /// Eagerly launches the browser so the first real resolution doesn't
    /// pay the launch cost.
    pub async fn warmup(&self) -> Result<(), crate::error::WebExecutionError> {
        self.ensure_browser().await
    }

    pub async fn resolve(&self, query: &str) -> ResolutionResult {
        if let Some(cached) = self.cache.lock().await.get(query) {
            let mut cached = cached;
            cached.from_cache = true;
            return cached;
        }

        let start = Instant::now();
        let result = match self.resolve_uncached(query).await {
            Ok(result) => result,
            Err(message) => ResolutionResult {
                status: ResolutionStatus::Failed,
                resolved_url: None,
                search_query: query.to_string(),
                candidates_found: 0,
                selected_reason: None,
                elapsed_ms: start.elapsed().as_millis() as u64,
                error_message: Some(message),
                from_cache: false,
            },
        };

        self.cache.lock().await.put(query, result.clone());
        result
    }

    async fn resolve_uncached(&self, query: &str) -> Result<ResolutionResult, String> {
        let start = Instant::now();
        self.ensure_browser().await.map_err(|e| e.message)?;

        let initial_url = infer_initial_url(query, &self.search_engine_url_template);

        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or("resolver session not initialized")?;

        let nav = tokio::time::timeout(self.navigation_timeout, session.page.goto(&initial_url))
            .await
            .map_err(|_| "navigation timeout".to_string())?
            .map_err(|e| e.to_string())?;
        let _ = nav;
        let _ = tokio::time::timeout(self.navigation_timeout, session.page.wait_for_navigation())
            .await;

        let is_login_query = {
            let lower = query.to_lowercase();
            ["login", "log in", "sign in", "signin", "log-in", "sign-in"]
                .iter()
                .any(|t| lower.contains(t))
        };

        let anchors = extract_anchors(&session.page).await?;
        let base_url = session.page.url().await.map_err(|e| e.to_string())?.unwrap_or(initial_url.clone());

        if is_login_query {
            let login_candidates = collect_candidates(&anchors, &base_url, LOGIN_TERMS);
            if let Some(best) = rank_candidates(&login_candidates, "login") {
                return Ok(ResolutionResult {
                    status: ResolutionStatus::Ok,
                    resolved_url: Some(best.url.clone()),
                    search_query: query.to_string(),
                    candidates_found: login_candidates.len() as u32,
                    selected_reason: Some("text_match".to_string()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    error_message: None,
                    from_cache: false,
                });
            }
            // Network-probe fallback: click the most login-hint-y anchor (by
            // href substring) and see where it lands, in lieu of a real
            // request/response observer pass.
            if let Some(probed) = self.probe_login_via_click(session, &anchors, &base_url).await {
                return Ok(ResolutionResult {
                    status: ResolutionStatus::Ok,
                    resolved_url: Some(probed),
                    search_query: query.to_string(),
                    candidates_found: login_candidates.len() as u32,
                    selected_reason: Some("network_probe".to_string()),
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    error_message: None,
                    from_cache: false,
                });
            }
            // fall through to general search below
        }

        let terms_owned: Vec<String> = query.to_lowercase().split_whitespace().map(str::to_string).collect();
        let terms: Vec<&str> = terms_owned.iter().map(String::as_str).collect();
        let candidates = collect_candidates(&anchors, &base_url, &terms);
        let best = rank_candidates(&candidates, query);

        Ok(match best {
            Some(candidate) => ResolutionResult {
                status: ResolutionStatus::Ok,
                resolved_url: Some(candidate.url.clone()),
                search_query: query.to_string(),
                candidates_found: candidates.len() as u32,
                selected_reason: Some("text_match".to_string()),
                elapsed_ms: start.elapsed().as_millis() as u64,
                error_message: None,
                from_cache: false,
            },
            None => ResolutionResult {
                status: ResolutionStatus::Failed,
                resolved_url: None,
                search_query: query.to_string(),
                candidates_found: candidates.len() as u32,
                selected_reason: None,
                elapsed_ms: start.elapsed().as_millis() as u64,
                error_message: Some("No matching links found".to_string()),
                from_cache: false,
            },
        })
    }

    async fn probe_login_via_click(&self, session: &mut ResolverSession, anchors: &[RawAnchor], base_url: &str) -> Option<String> {
        let hint = anchors.iter().find(|a| {
            a.href.as_deref().map(|h| {
                LOGIN_TERMS.iter().any(|t| h.to_lowercase().contains(&t.replace(' ', "-")))
            }).unwrap_or(false)
        })?;
        let href = hint.href.as_deref()?;
        let absolute = Url::parse(base_url).ok()?.join(href).ok()?;
        let _ = tokio::time::timeout(Duration::from_secs(5), session.page.goto(absolute.as_str())).await;
        session.page.url().await.ok().flatten()
    }

    async fn ensure_browser(&self) -> Result<(), crate::error::WebExecutionError> {
        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.profile_dir).ok();

        let config = BrowserConfig::builder()
            .user_data_dir(&self.profile_dir)
            .build()
            .map_err(|e| crate::error::WebExecutionError::new(crate::error::WebErrorCode::RuntimeMissing, e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| crate::error::WebExecutionError::new(crate::error::WebErrorCode::RuntimeMissing, e.to_string()))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| crate::error::WebExecutionError::new(crate::error::WebErrorCode::RuntimeMissing, e.to_string()))?;

        *guard = Some(ResolverSession { browser, page });
        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            let _ = session.page.close().await;
            let _ = session.browser.close().await;
        }
    }
}

use futures::StreamExt;

async fn extract_anchors(page: &Page) -> Result<Vec<RawAnchor>, String> {
    let value = page
        .evaluate(EXTRACT_ANCHORS_JS)
        .await
        .map_err(|e| e.to_string())?
        .into_value::<Vec<RawAnchor>>()
        .map_err(|e| e.to_string())?;
    Ok(value)
}

fn collect_candidates(anchors: &[RawAnchor], base_url: &str, terms: &[&str]) -> Vec<LinkCandidate> {
    let base = Url::parse(base_url).ok();
    let max_links = anchors.len().min(MAX_ANCHORS_SCANNED);
    let mut candidates = Vec::new();

    for (i, anchor) in anchors.iter().take(max_links).enumerate() {
        let Some(href) = anchor.href.as_deref() else { continue };
        if href.starts_with('#') || href == "javascript:void(0)" {
            continue;
        }

        let link_text = anchor.text.clone().unwrap_or_default();
        let aria_label = anchor.aria_label.clone();
        if link_text.is_empty() && aria_label.is_none() {
            continue;
        }

        let search_text = format!("{} {}", link_text, aria_label.as_deref().unwrap_or("")).to_lowercase();
        if !terms.iter().any(|t| search_text.contains(t)) {
            continue;
        }

        let position_score = (1.0 - (i as f64 / max_links.max(1) as f64)).max(0.1);

        let resolved = match &base {
            Some(b) => b.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };

        candidates.push(LinkCandidate { url: resolved, link_text, aria_label, position_score });

        if candidates.len() >= MAX_CANDIDATES {
            break;
        }
    }

    candidates
}

fn rank_candidates<'a>(candidates: &'a [LinkCandidate], query: &str) -> Option<&'a LinkCandidate> {
    let query_lower = query.to_lowercase();
    let query_terms: Vec<&str> = query_lower.split_whitespace().collect();

    candidates
        .iter()
        .map(|c| {
            let mut score = 0.0;
            if c.link_text.to_lowercase().contains(&query_lower) {
                score += SCORE_EXACT_TEXT_MATCH;
            }
            if let Some(aria) = &c.aria_label {
                if aria.to_lowercase().contains(&query_lower) {
                    score += SCORE_ARIA_LABEL_MATCH;
                }
            }
            let search_text = format!("{} {}", c.link_text, c.aria_label.as_deref().unwrap_or("")).to_lowercase();
            let matching_terms = query_terms.iter().filter(|t| search_text.contains(**t)).count();
            score += matching_terms as f64 * SCORE_PER_TERM_MATCH;
            score += c.position_score;
            (score, c)
        })
        .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, c)| c)
}

/// Infers a navigation target from a raw query: full URL, known-domain
/// keyword, TLD-stripped first token + `.com`, or a search-engine template.
pub fn infer_initial_url(query: &str, search_engine_url_template: &str) -> String {
    let query_lower = query.to_lowercase();
    let trimmed = query_lower.trim();

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return query.trim().to_string();
    }

    let first_word = trimmed.split_whitespace().next().unwrap_or(trimmed);

    if let Some(host) = lookup_common_domain(first_word) {
        return format!("https://{host}");
    }

    let domain = strip_known_tld(first_word);
    if domain.contains('.') || domain.len() > 3 {
        return format!("https://{domain}.com");
    }

    let encoded = urlencoding::encode(query);
    search_engine_url_template.replace("{query}", &encoded)
}

fn strip_known_tld(word: &str) -> String {
    for tld in [".com", ".net", ".org", ".io", ".co"] {
        if let Some(stripped) = word.strip_suffix(tld) {
            return stripped.to_string();
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_full_url_passthrough() {
        assert_eq!(infer_initial_url("https://example.com/path", "https://duckduckgo.com/?q={query}"), "https://example.com/path");
    }

    #[test]
    fn infers_known_domain_from_first_word() {
        assert_eq!(infer_initial_url("youtube cats", "https://duckduckgo.com/?q={query}"), "https://www.youtube.com");
        assert_eq!(infer_initial_url("gmail inbox", "https://duckduckgo.com/?q={query}"), "https://mail.google.com");
    }

    #[test]
    fn strips_tld_before_appending_dot_com() {
        assert_eq!(infer_initial_url("example.net", "https://duckduckgo.com/?q={query}"), "https://example.com");
    }

    #[test]
    fn falls_back_to_search_engine_for_short_unknown_terms() {
        let url = infer_initial_url("a", "https://duckduckgo.com/?q={query}");
        assert_eq!(url, "https://duckduckgo.com/?q=a");
    }

    #[test]
    fn rank_candidates_prefers_exact_text_match_and_position() {
        let candidates = vec![
            LinkCandidate { url: "https://x.com/a".into(), link_text: "unrelated".into(), aria_label: None, position_score: 0.9 },
            LinkCandidate { url: "https://x.com/b".into(), link_text: "Cats compilation".into(), aria_label: None, position_score: 0.2 },
        ];
        let best = rank_candidates(&candidates, "cats").unwrap();
        assert_eq!(best.url, "https://x.com/b");
    }

    #[test]
    fn collect_candidates_skips_anchors_without_href_or_hash_links() {
        let anchors = vec![
            RawAnchor { href: None, text: Some("cats".into()), aria_label: None },
            RawAnchor { href: Some("#".into()), text: Some("cats".into()), aria_label: None },
            RawAnchor { href: Some("javascript:void(0)".into()), text: Some("cats".into()), aria_label: None },
            RawAnchor { href: Some("/cats".into()), text: Some("cats page".into()), aria_label: None },
        ];
        let candidates = collect_candidates(&anchors, "https://example.com/", &["cats"]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].url, "https://example.com/cats");
    }
}
