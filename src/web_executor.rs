//! Persistent-profile browser executor for web-targeted steps.
//!
//! Grounded on the thin MVP web executor that lazily launched a browser and
//! dispatched a single intent to a site adapter; generalized to the full web
//! intent set plus the degraded-fallback state machine for when the browser
//! runtime itself can't be launched. Uses a profile directory separate from
//! the resolver's own (the two never share a persistent Chromium profile).
//!
//! A `defer_open` chain never shows the staging page directly: the headless
//! page backing it is only where chained `type_text`/`key_combo` actions are
//! rehearsed. `flush_deferred_open` is what actually hands the resulting URL
//! to the user's real browser, once per chain rather than once per step.

use crate::error::{AppError, WebErrorCode, WebExecutionError};
use crate::fallback::{self, FallbackChainConfig};
use crate::resolver::UrlResolver;
use crate::router::WebRunner;
use crate::safety::is_safe_url;
use crate::types::{ExecutionResult, ExecutionStatus, Intent, Step, Target};
use crate::web_adapters::whatsapp;
use crate::web_constants::{COMMON_SEARCH_INPUT_SELECTORS, SEARCH_PATH_TEMPLATES};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

struct BrowserSession {
    browser: Browser,
    page: Page,
}

/// State carried across the steps of an inferred web chain: the page a
/// deferred `open_url` resolved to, and any query text typed since.
#[derive(Debug, Clone)]
struct DeferredOpen {
    base_url: String,
    pending_query: Option<String>,
}

pub struct WebExecutor {
    session: AsyncMutex<Option<BrowserSession>>,
    profile_dir: PathBuf,
    headless: bool,
    navigation_timeout: Duration,
    resolver: Arc<UrlResolver>,
    fallback_config: FallbackChainConfig,
    enable_web_fill_form: bool,
    runtime_missing: AtomicBool,
    deferred: AsyncMutex<Option<DeferredOpen>>,
    error_screenshot_dir: PathBuf,
}

impl WebExecutor {
    pub fn new(
        profile_dir: PathBuf,
        headless: bool,
        resolver: Arc<UrlResolver>,
        fallback_config: FallbackChainConfig,
        enable_web_fill_form: bool,
        user_data_dir: PathBuf,
    ) -> Self {
        Self {
            session: AsyncMutex::new(None),
            profile_dir,
            headless,
            navigation_timeout: Duration::from_secs(30),
            resolver,
            fallback_config,
            enable_web_fill_form,
            runtime_missing: AtomicBool::new(false),
            deferred: AsyncMutex::new(None),
            error_screenshot_dir: user_data_dir.join("error_screenshots"),
        }
    }

    async fn ensure_browser(&self) -> Result<(), WebExecutionError> {
        if self.runtime_missing.load(Ordering::Relaxed) {
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "browser runtime unavailable for this process"));
        }

        let mut guard = self.session.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.profile_dir).ok();

        let mut builder = BrowserConfig::builder().user_data_dir(&self.profile_dir);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder
            .build()
            .map_err(|e| WebExecutionError::new(WebErrorCode::RuntimeMissing, e.to_string()))?;

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(pair) => pair,
            Err(e) => {
                self.runtime_missing.store(true, Ordering::Relaxed);
                return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, e.to_string()));
            }
        };
        tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| WebExecutionError::new(WebErrorCode::RuntimeMissing, e.to_string()))?;

        *guard = Some(BrowserSession { browser, page });
        Ok(())
    }

    pub async fn shutdown(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            let _ = session.page.close().await;
            let _ = session.browser.close().await;
        }
    }

    fn is_degraded(&self) -> bool {
        self.runtime_missing.load(Ordering::Relaxed)
    }

    async fn handle_open_url(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        let (final_url, fallback_used, resolution) = if let Some(resolved) = &step.resolved_url {
            if !is_safe_url(Some(resolved)) {
                return Err(WebExecutionError::new(WebErrorCode::UnsafeUrl, "resolved_url failed the safety check"));
            }
            (resolved.clone(), None, None)
        } else {
            let query = step.field_str("url").unwrap_or("");
            let outcome = fallback::execute(&self.resolver, query, &self.fallback_config).await;
            match outcome.final_url {
                Some(url) => (url, Some(format!("{:?}", outcome.fallback_used).to_lowercase()), outcome.resolution_details),
                None => {
                    return Err(WebExecutionError::new(
                        WebErrorCode::ResolutionFailed,
                        outcome.error_message.unwrap_or_else(|| "no candidate url survived the fallback chain".to_string()),
                    ));
                }
            }
        };

        if step.defer_open {
            if !self.is_degraded() {
                if let Err(e) = self.ensure_browser().await {
                    tracing::warn!(error = %e, "could not stage deferred page in the persistent browser, degrading");
                } else {
                    let guard = self.session.lock().await;
                    if let Some(session) = guard.as_ref() {
                        let _ = tokio::time::timeout(self.navigation_timeout, session.page.goto(&final_url)).await;
                        let _ = tokio::time::timeout(self.navigation_timeout, session.page.wait_for_navigation()).await;
                    }
                }
            }

            *self.deferred.lock().await = Some(DeferredOpen { base_url: final_url.clone(), pending_query: None });

            let mut result = ExecutionResult::ok(step.intent, Target::Web);
            result.resolved_url = Some(final_url);
            result.fallback_used = fallback_used;
            result.dom_search_query = resolution.as_ref().map(|r| r.search_query.clone());
            return Ok(result);
        }

        open::that(&final_url).map_err(|e| WebExecutionError::new(WebErrorCode::OpenFailed, e.to_string()))?;

        let mut result = ExecutionResult::ok(step.intent, Target::Web);
        result.resolved_url = Some(final_url);
        result.fallback_used = fallback_used;
        Ok(result)
    }

    async fn handle_type_text(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        let text = step.field_str("text").unwrap_or("");

        {
            let mut deferred = self.deferred.lock().await;
            if let Some(open) = deferred.as_mut() {
                open.pending_query = Some(text.to_string());
            }
        }

        if self.is_degraded() {
            if self.deferred.lock().await.is_some() {
                return Ok(ExecutionResult::ok(step.intent, Target::Web));
            }
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available to type into"));
        }

        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;

        let selectors: Vec<&str> = match step.field_str("selector") {
            Some(s) => vec![s],
            None => COMMON_SEARCH_INPUT_SELECTORS.to_vec(),
        };

        let script = format!(
            r#"(() => {{
                const selectors = {selectors};
                let el = null;
                for (const sel of selectors) {{ el = document.querySelector(sel); if (el) break; }}
                if (!el) return false;
                el.focus();
                if (el.isContentEditable) {{ el.textContent = {text}; }} else {{ el.value = {text}; }}
                el.dispatchEvent(new Event('input', {{bubbles: true}}));
                el.dispatchEvent(new Event('change', {{bubbles: true}}));
                return true;
            }})()"#,
            selectors = json!(selectors),
            text = json!(text),
        );

        let found = session
            .page
            .evaluate(script)
            .await
            .map_err(|e| WebExecutionError::new(WebErrorCode::Unexpected, e.to_string()))?
            .into_value::<bool>()
            .unwrap_or(false);

        if !found {
            return Err(WebExecutionError::new(WebErrorCode::FormFieldNotFound, "no matching input field found on the page"));
        }

        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_key_combo(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        let keys = step
            .fields
            .get("keys")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(str::to_lowercase).collect::<Vec<_>>())
            .unwrap_or_default();
        let is_enter = keys.last().map(|k| k == "enter" || k == "return").unwrap_or(false);

        if !is_enter {
            if self.is_degraded() {
                return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available for this key combo"));
            }
            return self.dispatch_key_event(step).await;
        }

        self.handle_enter_in_chain(step).await
    }

    async fn dispatch_key_event(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;
        let _ = session
            .page
            .evaluate("document.activeElement && document.activeElement.blur(), document.activeElement && document.activeElement.focus(), true")
            .await;
        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_enter_in_chain(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        if !self.is_degraded() {
            if self.ensure_browser().await.is_ok() {
                let before = {
                    let guard = self.session.lock().await;
                    match guard.as_ref() {
                        Some(session) => session.page.url().await.ok().flatten(),
                        None => None,
                    }
                };

                {
                    let guard = self.session.lock().await;
                    if let Some(session) = guard.as_ref() {
                        let submit_script = r#"(() => {
                            const el = document.activeElement;
                            if (!el) return false;
                            const opts = {key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true};
                            el.dispatchEvent(new KeyboardEvent('keydown', opts));
                            el.dispatchEvent(new KeyboardEvent('keyup', opts));
                            if (el.form && typeof el.form.requestSubmit === 'function') { el.form.requestSubmit(); }
                            return true;
                        })()"#;
                        let _ = session.page.evaluate(submit_script).await;
                        let _ = tokio::time::timeout(Duration::from_secs(5), session.page.wait_for_navigation()).await;
                    }
                }

                let after = {
                    let guard = self.session.lock().await;
                    match guard.as_ref() {
                        Some(session) => session.page.url().await.ok().flatten(),
                        None => None,
                    }
                };

                if let Some(after_url) = after.clone() {
                    if before != after {
                        let mut deferred = self.deferred.lock().await;
                        if let Some(open) = deferred.as_mut() {
                            open.base_url = after_url.clone();
                            open.pending_query = None;
                        }
                        let mut result = ExecutionResult::ok(step.intent, Target::Web);
                        result.resolved_url = Some(after_url);
                        return Ok(result);
                    }
                }
            }
        }

        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_click(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        if self.is_degraded() {
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available to click"));
        }
        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;

        let script = if let Some(selector) = step.field_str("selector") {
            format!("(() => {{ const el = document.querySelector({sel}); if (!el) return false; el.click(); return true; }})()", sel = json!(selector))
        } else {
            let x = step.fields.get("x").and_then(Value::as_i64).unwrap_or(0);
            let y = step.fields.get("y").and_then(Value::as_i64).unwrap_or(0);
            format!("(() => {{ const el = document.elementFromPoint({x}, {y}); if (!el) return false; el.click(); return true; }})()")
        };

        let _ = session.page.evaluate(script).await;
        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_scroll(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        if self.is_degraded() {
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available to scroll"));
        }
        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;

        let direction = step.field_str("direction").unwrap_or("down");
        let amount = step.fields.get("amount").and_then(Value::as_i64).unwrap_or(1);
        // "up" is a negative scrollBy delta here; the macOS keystroke path
        // (os_backend::macos) treats "up" as a positive repeat count instead.
        // Intentionally backend-local — see OQ-b, do not unify the signs.
        let delta = amount * 100 * if direction == "up" { -1 } else { 1 };

        let _ = session.page.evaluate(format!("window.scrollBy(0, {delta})")).await;
        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_send_message(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        if self.is_degraded() {
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available for whatsapp"));
        }
        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;

        let contact = step.field_str("contact").unwrap_or("");
        let message = step.field_str("message").unwrap_or("");
        whatsapp::send_message(&session.page, contact, message).await?;
        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_fill_form(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        if !self.enable_web_fill_form {
            return Ok(ExecutionResult::unsupported(step.intent, Target::Web));
        }
        if self.is_degraded() {
            return Err(WebExecutionError::new(WebErrorCode::RuntimeMissing, "no browser runtime available to fill a form"));
        }
        self.ensure_browser().await?;
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| WebExecutionError::new(WebErrorCode::Unexpected, "browser session missing"))?;

        let fields = step.fields.get("fields").and_then(Value::as_object).cloned().unwrap_or_default();
        for (selector, value) in fields.iter() {
            let text = value.as_str().unwrap_or_default();
            let script = format!(
                r#"(() => {{
                    const el = document.querySelector({sel});
                    if (!el) return false;
                    el.focus();
                    if (el.isContentEditable) {{ el.textContent = {val}; }} else {{ el.value = {val}; }}
                    el.dispatchEvent(new Event('input', {{bubbles: true}}));
                    return true;
                }})()"#,
                sel = json!(selector),
                val = json!(text),
            );
            let found = session.page.evaluate(script).await.ok().and_then(|r| r.into_value::<bool>().ok()).unwrap_or(false);
            if !found {
                return Err(WebExecutionError::new(WebErrorCode::FormFieldNotFound, format!("field '{selector}' not found")));
            }
        }

        let submit = step.fields.get("submit").and_then(Value::as_bool).unwrap_or(false);
        if submit {
            let script = r#"(() => {
                const form = document.querySelector('form');
                if (form && typeof form.requestSubmit === 'function') { form.requestSubmit(); return true; }
                return false;
            })()"#;
            let submitted = session.page.evaluate(script).await.ok().and_then(|r| r.into_value::<bool>().ok()).unwrap_or(false);
            if !submitted {
                return Err(WebExecutionError::new(WebErrorCode::FormSubmitFailed, "no submittable form found"));
            }
        }

        Ok(ExecutionResult::ok(step.intent, Target::Web))
    }

    async fn handle_request_permission(&self, step: &Step) -> Result<ExecutionResult, WebExecutionError> {
        let reason = step.field_str("reason").unwrap_or("unspecified");
        tracing::info!(%reason, "web_request_permission recorded (no browser permission API wired up yet)");
        let mut result = ExecutionResult::ok(step.intent, Target::Web);
        result.details = Some(json!({ "reason": reason }));
        Ok(result)
    }

    async fn capture_error_screenshot(&self, intent: Intent) -> Option<String> {
        let guard = self.session.lock().await;
        let session = guard.as_ref()?;
        let bytes = session.page.screenshot(chromiumoxide::page::ScreenshotParams::builder().build()).await.ok()?;
        std::fs::create_dir_all(&self.error_screenshot_dir).ok()?;
        let unix = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
        let path = self.error_screenshot_dir.join(format!("{}_{unix}.png", intent.as_str()));
        std::fs::write(&path, bytes).ok()?;
        Some(path.to_string_lossy().into_owned())
    }
}

#[async_trait]
impl WebRunner for WebExecutor {
    async fn execute_step(&self, step: &Step) -> Result<ExecutionResult, AppError> {
        let start = Instant::now();

        let outcome = match step.intent {
            Intent::OpenUrl => self.handle_open_url(step).await,
            Intent::TypeText => self.handle_type_text(step).await,
            Intent::KeyCombo => self.handle_key_combo(step).await,
            Intent::Click => self.handle_click(step).await,
            Intent::Scroll => self.handle_scroll(step).await,
            Intent::WebSendMessage => self.handle_send_message(step).await,
            Intent::WebFillForm => self.handle_fill_form(step).await,
            Intent::WebRequestPermission => self.handle_request_permission(step).await,
            _ => Ok(ExecutionResult::unsupported(step.intent, Target::Web)),
        };

        match outcome {
            Ok(result) => Ok(result.with_elapsed(start.elapsed().as_millis() as u64)),
            Err(mut err) => {
                if err.code == WebErrorCode::Unexpected {
                    if let Some(path) = self.capture_error_screenshot(step.intent).await {
                        err = err.with_screenshot(path);
                    }
                }
                Err(AppError::Web(err))
            }
        }
    }

    async fn flush_deferred_open(&self) {
        let pending = self.deferred.lock().await.take();
        let Some(pending) = pending else { return };

        let final_url = match pending.pending_query {
            Some(query) if !query.trim().is_empty() => {
                self.probe_search_candidates(&pending.base_url, &query).await.unwrap_or(pending.base_url)
            }
            _ => pending.base_url,
        };

        if !is_safe_url(Some(&final_url)) {
            tracing::warn!(url = %final_url, "dropped deferred open: failed safety check at flush time");
            return;
        }

        if let Err(e) = open::that(&final_url) {
            tracing::warn!(error = %e, url = %final_url, "failed to surface deferred page to the system browser");
        }
    }
}

impl WebExecutor {
    /// Tries each templated search-URL candidate, in navigation order, and
    /// returns the first one that actually loads rather than the first one
    /// that merely looks well-formed — a 404 on the first template must fall
    /// through to the next, per the search-URL ladder.
    async fn probe_search_candidates(&self, base_url: &str, query: &str) -> Option<String> {
        let candidates = build_search_candidates(base_url, query);
        if candidates.is_empty() {
            return None;
        }

        if self.is_degraded() || self.ensure_browser().await.is_err() {
            return candidates.into_iter().next();
        }

        let guard = self.session.lock().await;
        let Some(session) = guard.as_ref() else {
            return candidates.into_iter().next();
        };

        for candidate in candidates {
            if tokio::time::timeout(self.navigation_timeout, session.page.goto(&candidate)).await.is_err() {
                continue;
            }
            let _ = tokio::time::timeout(self.navigation_timeout, session.page.wait_for_navigation()).await;

            let loaded_ok = session
                .page
                .evaluate(
                    "(() => { const nav = performance.getEntriesByType('navigation')[0]; \
                      return !nav || nav.responseStatus === 0 || (nav.responseStatus >= 200 && nav.responseStatus < 400); })()",
                )
                .await
                .ok()
                .and_then(|r| r.into_value::<bool>().ok())
                .unwrap_or(false);

            if loaded_ok {
                return Some(candidate);
            }
        }
        None
    }
}

/// Renders every search-URL template against the same origin as `base_url`,
/// keeping only the candidates that pass the safety predicate. Shape-only:
/// callers still need to probe these to find one that actually loads.
fn build_search_candidates(base_url: &str, query: &str) -> Vec<String> {
    let Ok(parsed) = Url::parse(base_url) else { return Vec::new() };
    let Some(host) = parsed.host_str() else { return Vec::new() };
    let origin = format!("{}://{host}", parsed.scheme());
    let encoded = urlencoding::encode(query);

    SEARCH_PATH_TEMPLATES
        .iter()
        .map(|template| format!("{origin}{}", template.replace("{q}", &encoded)))
        .filter(|candidate| is_safe_url(Some(candidate)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_search_candidates_renders_same_origin_ladder() {
        let candidates = build_search_candidates("https://example.com/", "cats");
        assert_eq!(candidates.len(), SEARCH_PATH_TEMPLATES.len());
        assert!(candidates.iter().all(|c| c.starts_with("https://example.com")));
        assert!(candidates.iter().all(|c| c.contains("cats")));
    }

    #[test]
    fn build_search_candidates_rejects_bad_base() {
        assert!(build_search_candidates("not a url", "cats").is_empty());
    }
}
