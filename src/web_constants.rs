//! Shared constants for web resolution, navigation, and fallback.

/// Common keyword -> canonical host mapping, consulted before falling back
/// to TLD-stripping heuristics.
pub const COMMON_DOMAINS: &[(&str, &str)] = &[
    ("youtube", "www.youtube.com"),
    ("gmail", "mail.google.com"),
    ("google", "www.google.com"),
    ("github", "github.com"),
    ("twitter", "twitter.com"),
    ("facebook", "www.facebook.com"),
    ("linkedin", "www.linkedin.com"),
    ("reddit", "www.reddit.com"),
    ("instagram", "www.instagram.com"),
    ("amazon", "www.amazon.com"),
];

pub fn lookup_common_domain(keyword: &str) -> Option<&'static str> {
    let lower = keyword.to_lowercase();
    COMMON_DOMAINS
        .iter()
        .find(|(k, _)| *k == lower)
        .map(|(_, v)| *v)
}

pub const SCORE_EXACT_TEXT_MATCH: f64 = 10.0;
pub const SCORE_ARIA_LABEL_MATCH: f64 = 5.0;
pub const SCORE_PER_TERM_MATCH: f64 = 2.0;

/// Search-URL templates tried, in order, on a login-chain origin when
/// flushing a deferred open whose query text hints at a search box.
pub const SEARCH_PATH_TEMPLATES: &[&str] = &["/search?q={q}", "/search?query={q}", "/results?search_query={q}", "/?q={q}"];

pub const LOGIN_TERMS: &[&str] = &["signin", "sign-in", "sign in", "login", "log-in", "log in", "account", "ap/signin"];

/// Ranked fallback selectors tried, in order, when a `type_text` step targets
/// a web page without specifying its own selector.
pub const COMMON_SEARCH_INPUT_SELECTORS: &[&str] = &[
    "input[type=\"search\"]",
    "input[name=\"q\"]",
    "textarea[name=\"q\"]",
    "[role=\"searchbox\"]",
    "input[type=\"text\"]",
    "textarea",
    "[contenteditable=\"true\"]",
];
