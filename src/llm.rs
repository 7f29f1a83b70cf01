//! Local LLM client that turns free text into the `{"steps": [...]}` payload
//! the schema validator expects.
//!
//! Grounded on a thin client wrapping an Ollama-style `/api/generate`
//! endpoint: one fixed prompt enumerating every supported intent with an
//! example, a JSON-brace-extraction fallback for chatty models that wrap
//! their answer in prose, and a `reqwest` client instead of the bundled
//! LLM gateway's hand-rolled retry/backoff loop (this dispatcher makes a
//! single request per command and treats failure as "ignore this command").

use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("local LLM unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("LLM did not return valid JSON")]
    InvalidJson,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

const SUPPORTED_INTENTS: &[&str] = &[
    "open_url",
    "wait_for_url",
    "open_app",
    "open_file",
    "key_combo",
    "type_text",
    "scroll",
    "mouse_move",
    "click",
    "web_send_message",
    "web_fill_form",
    "web_request_permission",
    "find_ui",
    "invoke_ui",
    "wait_for_window",
];

pub struct LocalLlmInterpreter {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl LocalLlmInterpreter {
    pub fn new(endpoint: String, model: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::builder().timeout(timeout).build().unwrap_or_default(),
            endpoint,
            model,
        }
    }

    pub async fn interpret(&self, text: &str, context: &Value) -> Result<Value, LlmError> {
        let prompt = build_prompt(text, context);
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": 0.2 },
        });

        let resp = self.http.post(&self.endpoint).json(&body).send().await?;
        let parsed: GenerateResponse = resp.json().await?;

        extract_json(&parsed.response).ok_or(LlmError::InvalidJson)
    }
}

fn build_prompt(text: &str, context: &Value) -> String {
    let intent_line = format!("Supported intents: {}\n", SUPPORTED_INTENTS.join(", "));
    format!(
        "You are a command intent parser. Convert the user request into JSON only. \
{intent_line}Use this schema:\n\
{{\n  \"steps\": [\n    {{\"intent\":\"open_url\",\"url\":\"https://...\",\"target\":\"web\"}},\n    \
{{\"intent\":\"type_text\",\"text\":\"hello\",\"target\":\"web\"}},\n    \
{{\"intent\":\"key_combo\",\"keys\":[\"cmd\",\"l\"]}},\n    \
{{\"intent\":\"web_send_message\",\"contact\":\"John Doe\",\"message\":\"Hello!\"}}\n  ]\n}}\n\
Rules:\n\
- Only output JSON. No markdown, no commentary.\n\
- Use the minimum number of steps that reliably complete the task.\n\
- If the request is ambiguous, return an empty steps list.\n\
- For copy/paste/cut/undo/redo/select all, use key_combo with cmd on macOS or ctrl on Windows.\n\
- Prefer find_ui/invoke_ui over pixel-based clicks when possible.\n\
- For sending messages on WhatsApp, use web_send_message with contact and message. Never decompose it into open_url + type_text + click.\n\
- When opening a URL for in-browser interaction, set \"target\":\"web\" on the open_url step; subsequent type_text/key_combo/click/scroll steps automatically run in the browser.\n\
- Do NOT emit wait_for_url steps when using target:\"web\".\n\
Context: {context}\n\
Request: {text}"
    )
}

fn extract_json(text: &str) -> Option<Value> {
    let object_re = Regex::new(r"(?s)\{.*\}").ok()?;
    if let Some(m) = object_re.find(text) {
        if let Ok(v) = serde_json::from_str(m.as_str()) {
            return Some(v);
        }
    }
    let array_re = Regex::new(r"(?s)\[.*\]").ok()?;
    if let Some(m) = array_re.find(text) {
        if let Ok(v) = serde_json::from_str(m.as_str()) {
            return Some(v);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_object_from_chatty_response() {
        let text = "Sure! Here you go:\n```json\n{\"steps\": [{\"intent\":\"open_app\",\"app\":\"Finder\"}]}\n```\nLet me know if that helps.";
        let parsed = extract_json(text).unwrap();
        assert_eq!(parsed["steps"][0]["intent"], "open_app");
    }

    #[test]
    fn extracts_bare_array() {
        let text = "[{\"intent\":\"open_app\",\"app\":\"Finder\"}]";
        let parsed = extract_json(text).unwrap();
        assert!(parsed.is_array());
    }

    #[test]
    fn returns_none_for_garbage() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn prompt_lists_every_supported_intent() {
        let prompt = build_prompt("open spotify", &json!({}));
        for intent in SUPPORTED_INTENTS {
            assert!(prompt.contains(intent), "missing {intent} in prompt");
        }
    }
}
