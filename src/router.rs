//! Dispatches validated steps to the OS or web backend, inferring web-chain
//! membership first.
//!
//! Grounded on the executor that owned both the OS router and the lazily
//! constructed web executor: a step list is first rewritten so that an
//! `open_app` step that is only there to get to a website gets promoted into
//! an `open_url{target: web}`, and steps that follow an `open_url{target:
//! web}` step get pulled into the same web chain as long as they're
//! chainable intents.

use crate::error::AppError;
use crate::os_backend::{OsExecutor, OsRouter};
use crate::types::{ExecutionResult, Intent, Step, Target};
use crate::web_constants::lookup_common_domain;
use async_trait::async_trait;

#[async_trait]
pub trait WebRunner: Send + Sync {
    async fn execute_step(&self, step: &Step) -> Result<ExecutionResult, AppError>;

    /// Called once after a batch of steps has executed, so a deferred
    /// `open_url` can finally navigate once its chained actions are known.
    async fn flush_deferred_open(&self) {}
}

pub struct CommandRouter {
    os: OsRouter,
    web: Box<dyn WebRunner>,
}

impl CommandRouter {
    pub fn new(web: Box<dyn WebRunner>) -> Self {
        Self { os: OsRouter::new(), web }
    }

    pub async fn execute_steps(&self, steps: Vec<Step>) -> Vec<ExecutionResult> {
        let steps = infer_web_targets(steps);
        let mut results = Vec::with_capacity(steps.len());

        for step in &steps {
            let result = if step.target_or_default() == Target::Web {
                self.execute_web_step(step).await
            } else {
                self.os.execute_step(step).await
            };
            results.push(result);
        }

        self.web.flush_deferred_open().await;
        results
    }

    async fn execute_web_step(&self, step: &Step) -> ExecutionResult {
        match self.web.execute_step(step).await {
            Ok(result) => result,
            Err(err) => {
                let mut details = serde_json::json!({ "reason": err.reason() });
                if let Some(code) = err.code() {
                    details["code"] = serde_json::Value::String(code.to_string());
                }
                if let Some(screenshot) = err.screenshot() {
                    details["screenshot_path"] = serde_json::Value::String(screenshot.to_string());
                }
                ExecutionResult::failed(step.intent, Target::Web, details)
            }
        }
    }
}

/// Intents that can ride along in a web chain once it has been opened.
fn is_web_chainable(intent: Intent) -> bool {
    intent.web_chainable()
}

/// Rewrites a step list so that `open_app` steps that only exist to reach a
/// website get promoted to `open_url{target: web}`, chainable intents
/// following a web-target `open_url` inherit `target: web`, and
/// `wait_for_url` steps inside a web chain are dropped (the web backend
/// handles page-load waiting natively).
pub fn infer_web_targets(steps: Vec<Step>) -> Vec<Step> {
    let mut out = Vec::with_capacity(steps.len());
    let mut in_web_chain = false;

    for (idx, step) in steps.iter().enumerate() {
        if step.intent == Intent::OpenApp {
            if should_promote_open_app(&steps, idx) {
                let app = step.field_str("app").unwrap_or("");
                if let Some(url) = app_to_url(app) {
                    let next_is_chainable = steps.get(idx + 1).map(|s| is_web_chainable(s.intent)).unwrap_or(false);
                    let web_step = Step {
                        intent: Intent::OpenUrl,
                        target: Some(Target::Web),
                        fields: serde_json::json!({ "url": url }),
                        resolved_url: None,
                        precomputed: false,
                        defer_open: next_is_chainable,
                    };
                    in_web_chain = true;
                    out.push(web_step);
                    continue;
                }
            }
        }

        if step.intent == Intent::OpenUrl && step.target == Some(Target::Web) {
            in_web_chain = true;
            let next_is_chainable = steps.get(idx + 1).map(|s| is_web_chainable(s.intent)).unwrap_or(false);
            let mut promoted = step.clone();
            if next_is_chainable {
                promoted.defer_open = true;
            }
            out.push(promoted);
            continue;
        }

        if in_web_chain {
            if step.intent == Intent::WaitForUrl {
                continue;
            }
            if is_web_chainable(step.intent) {
                let mut promoted = step.clone();
                promoted.target = Some(Target::Web);
                out.push(promoted);
                continue;
            }
            in_web_chain = false;
        }

        out.push(step.clone());
    }

    out
}

fn should_promote_open_app(steps: &[Step], idx: usize) -> bool {
    steps[idx + 1..]
        .iter()
        .any(|s| s.target == Some(Target::Web) || s.intent.starts_with_web())
}

pub(crate) fn app_to_url(app: &str) -> Option<String> {
    let key = app.trim().to_lowercase();
    if key.is_empty() {
        return None;
    }
    if let Some(host) = lookup_common_domain(&key) {
        return Some(format!("https://{host}"));
    }
    if key.contains(' ') {
        return None;
    }
    let slug: String = key.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if slug.is_empty() {
        return None;
    }
    Some(format!("https://{slug}.com"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(intent: Intent, target: Option<Target>, fields: serde_json::Value) -> Step {
        Step { intent, target, fields, resolved_url: None, precomputed: false, defer_open: false }
    }

    #[test]
    fn promotes_chainable_intents_after_web_open_url() {
        let steps = vec![
            step(Intent::OpenUrl, Some(Target::Web), json!({"url": "https://example.com"})),
            step(Intent::TypeText, None, json!({"text": "hi"})),
            step(Intent::Click, None, json!({"button": "left", "clicks": 1})),
        ];
        let out = infer_web_targets(steps);
        assert_eq!(out[1].target, Some(Target::Web));
        assert_eq!(out[2].target, Some(Target::Web));
        assert!(out[0].defer_open);
    }

    #[test]
    fn non_chainable_intent_breaks_the_chain() {
        let steps = vec![
            step(Intent::OpenUrl, Some(Target::Web), json!({"url": "https://example.com"})),
            step(Intent::OpenApp, None, json!({"app": "Finder"})),
        ];
        let out = infer_web_targets(steps);
        assert_eq!(out[1].target, None);
    }

    #[test]
    fn wait_for_url_is_dropped_inside_a_web_chain() {
        let steps = vec![
            step(Intent::OpenUrl, Some(Target::Web), json!({"url": "https://example.com"})),
            step(Intent::WaitForUrl, None, json!({"url": "https://example.com", "timeout_secs": 5.0, "interval_secs": 0.5})),
            step(Intent::Click, None, json!({"button": "left", "clicks": 1})),
        ];
        let out = infer_web_targets(steps);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].intent, Intent::Click);
    }

    #[test]
    fn promotes_open_app_that_precedes_a_web_step() {
        let steps = vec![
            step(Intent::OpenApp, None, json!({"app": "github"})),
            step(Intent::WebSendMessage, Some(Target::Web), json!({"contact": "x", "message": "y"})),
        ];
        let out = infer_web_targets(steps);
        assert_eq!(out[0].intent, Intent::OpenUrl);
        assert_eq!(out[0].target, Some(Target::Web));
        assert_eq!(out[0].field_str("url"), Some("https://github.com"));
    }

    #[test]
    fn leaves_open_app_alone_when_nothing_web_follows() {
        let steps = vec![step(Intent::OpenApp, None, json!({"app": "Calculator"}))];
        let out = infer_web_targets(steps);
        assert_eq!(out[0].intent, Intent::OpenApp);
    }
}
