//! Command interpretation and execution pipeline: text in, `CommandOutcome` out.
//!
//! Grounded on the engine that wired together the interpreter, executor,
//! confirmation store and logger: a shortcut path for trivial editing
//! commands, a JSON escape hatch for operator-authored payloads, the LLM as
//! a last resort, then validation, subject grouping, the confirmation gate,
//! and execution.

use crate::llm::LocalLlmInterpreter;
use crate::router::CommandRouter;
use crate::schema::{self, ValidationError};
use crate::types::{CommandOutcome, CommandSource, Intent, Step};
use crate::{confirmation, subject};
use regex::Regex;
use serde_json::Value;

const SENSITIVE_WORDS: &[&str] = &[
    "delete", "remove", "erase", "trash", "format", "wipe", "rm", "shutdown", "restart", "kill", "terminate", "uninstall",
];

fn sensitive_pattern() -> Regex {
    let alternation = SENSITIVE_WORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("static sensitive-word pattern is valid")
}

pub struct CommandEngine {
    interpreter: LocalLlmInterpreter,
    router: CommandRouter,
    sensitive: Regex,
}

impl CommandEngine {
    pub fn new(interpreter: LocalLlmInterpreter, router: CommandRouter) -> Self {
        Self { interpreter, router, sensitive: sensitive_pattern() }
    }

    pub async fn run(&self, source: CommandSource, text: &str, context: &Value) -> CommandOutcome {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return CommandOutcome::Ignored { reason: "empty".to_string() };
        }

        if let Some(steps) = shortcut_steps(trimmed) {
            return self.run_validated(source, trimmed, steps).await;
        }

        let payload = match self.parse_text(trimmed, context).await {
            Ok(p) => p,
            Err(reason) => return CommandOutcome::Error { reason, code: None, screenshot: None },
        };

        let raw_steps = schema::normalize_steps(&payload);
        let cleaned: Result<Vec<Step>, ValidationError> = raw_steps.iter().map(schema::validate).collect();
        let cleaned = match cleaned {
            Ok(s) => s,
            Err(e) => return CommandOutcome::Error { reason: e.0, code: None, screenshot: None },
        };

        self.run_validated(source, trimmed, cleaned).await
    }

    /// Used when a gesture is mapped directly to a canned, pre-validated step list.
    pub async fn run_steps(&self, source: CommandSource, text: &str, steps: Vec<Step>) -> CommandOutcome {
        self.run_validated(source, text, steps).await
    }

    async fn run_validated(&self, source: CommandSource, text: &str, cleaned: Vec<Step>) -> CommandOutcome {
        if cleaned.is_empty() {
            return CommandOutcome::Ignored { reason: "no_steps".to_string() };
        }

        let extraction = subject::extract(text, &cleaned);
        let subjects = if extraction.groups.len() > 1 { Some(extraction.groups) } else { None };

        if self.requires_confirmation(text, &cleaned) {
            let id = confirmation::create(
                source,
                text.to_string(),
                "Sensitive command requires confirmation".to_string(),
                cleaned,
            );
            return CommandOutcome::Pending { id };
        }

        let results = self.router.execute_steps(cleaned).await;
        CommandOutcome::Ok { results, subjects }
    }

    pub async fn approve(&self, id: &str) -> CommandOutcome {
        match confirmation::approve(id) {
            confirmation::ResolveOutcome::Approved(steps) => {
                let results = self.router.execute_steps(steps).await;
                CommandOutcome::Ok { results, subjects: None }
            }
            confirmation::ResolveOutcome::Denied => CommandOutcome::Denied,
            confirmation::ResolveOutcome::Missing => CommandOutcome::Missing,
        }
    }

    pub fn deny(&self, id: &str) -> CommandOutcome {
        match confirmation::deny(id) {
            confirmation::ResolveOutcome::Denied => CommandOutcome::Denied,
            confirmation::ResolveOutcome::Approved(_) => unreachable!("deny never approves"),
            confirmation::ResolveOutcome::Missing => CommandOutcome::Missing,
        }
    }

    pub fn list_pending(&self) -> Vec<crate::types::ConfirmationRecord> {
        confirmation::list_pending()
    }

    async fn parse_text(&self, text: &str, context: &Value) -> Result<Value, String> {
        if text.starts_with('{') || text.starts_with('[') {
            if let Ok(v) = serde_json::from_str::<Value>(text) {
                return Ok(v);
            }
        }
        self.interpreter.interpret(text, context).await.map_err(|e| e.to_string())
    }

    fn requires_confirmation(&self, text: &str, steps: &[Step]) -> bool {
        if self.sensitive.is_match(text) {
            return true;
        }
        for step in steps {
            if step.intent.always_confirm() {
                return true;
            }
            if step.intent == Intent::TypeText {
                if let Some(t) = step.field_str("text") {
                    if self.sensitive.is_match(t) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// Maps trivial editing phrasings straight to a `key_combo` step, bypassing
/// the LLM entirely.
fn shortcut_steps(text: &str) -> Option<Vec<Step>> {
    let words_only: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let key = match words_only.as_str() {
        "copy" => "c",
        "paste" => "v",
        "cut" => "x",
        "undo" => "z",
        "redo" | "redo that" => "y",
        "select all" => "a",
        _ => return None,
    };

    let modifier = if cfg!(target_os = "macos") { "command" } else { "control" };
    let raw = serde_json::json!({
        "intent": "key_combo",
        "keys": [modifier, key],
    });
    schema::validate(&raw).ok().map(|step| vec![step])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shortcut_recognizes_copy_paste_and_select_all() {
        assert!(shortcut_steps("copy").is_some());
        assert!(shortcut_steps("Paste").is_some());
        assert!(shortcut_steps("select all").is_some());
        assert!(shortcut_steps("open spotify").is_none());
    }

    #[test]
    fn sensitive_pattern_matches_whole_words_only() {
        let re = sensitive_pattern();
        assert!(re.is_match("please delete this file"));
        assert!(!re.is_match("formation of clouds"));
        assert!(re.is_match("format the drive"));
    }
}
