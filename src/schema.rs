//! Closed intent vocabulary, per-intent field contracts, and normalization.
//!
//! Mirrors the validation style of the action normalizer this crate grew out
//! of: a pure function on a raw JSON value that either rejects it with a
//! descriptive error or returns a canonical `Step`.

use crate::types::{Intent, Step, Target};
use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Parses the top-level LLM/operator payload into a raw step list.
/// Accepts a bare array, `{"steps": [...]}`, or anything else maps to empty.
pub fn normalize_steps(payload: &Value) -> Vec<Value> {
    match payload {
        Value::Array(items) => items.clone(),
        Value::Object(obj) => match obj.get("steps") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Validates and canonicalizes one raw step. Unknown fields are dropped
/// silently; missing/ill-typed required fields are a hard error.
pub fn validate(raw: &Value) -> Result<Step, ValidationError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ValidationError("step must be a JSON object".into()))?;

    let intent_str = obj
        .get("intent")
        .and_then(Value::as_str)
        .ok_or_else(|| ValidationError("step missing 'intent'".into()))?;

    let intent = Intent::from_str(intent_str)
        .ok_or_else(|| ValidationError(format!("unknown intent '{intent_str}'")))?;

    let fields = validate_fields(intent, obj)?;

    let target = match obj.get("target").and_then(Value::as_str) {
        Some("web") => Some(Target::Web),
        Some("os") => Some(Target::Os),
        _ if intent.starts_with_web() => Some(Target::Web),
        _ => None,
    };

    let resolved_url = obj.get("resolved_url").and_then(Value::as_str).map(str::to_string);
    let precomputed = obj.get("precomputed").and_then(Value::as_bool).unwrap_or(resolved_url.is_some());
    let defer_open = obj.get("defer_open").and_then(Value::as_bool).unwrap_or(false);

    Ok(Step {
        intent,
        target,
        fields,
        resolved_url,
        precomputed,
        defer_open,
    })
}

fn require_non_empty_str(obj: &Map<String, Value>, key: &str) -> Result<String, ValidationError> {
    let val = obj
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ValidationError(format!("'{key}' must be a non-empty string")))?;
    Ok(val.to_string())
}

fn validate_fields(intent: Intent, obj: &Map<String, Value>) -> Result<Value, ValidationError> {
    match intent {
        Intent::OpenUrl => {
            let url = require_non_empty_str(obj, "url")?;
            Ok(json!({ "url": url }))
        }
        Intent::WaitForUrl => {
            let url = require_non_empty_str(obj, "url")?;
            let timeout_secs = obj
                .get("timeout_secs")
                .and_then(Value::as_f64)
                .filter(|v| *v >= 0.0)
                .ok_or_else(|| ValidationError("'timeout_secs' must be a number >= 0".into()))?;
            let interval_secs = obj
                .get("interval_secs")
                .and_then(Value::as_f64)
                .filter(|v| *v > 0.0)
                .ok_or_else(|| ValidationError("'interval_secs' must be a number > 0".into()))?;
            Ok(json!({ "url": url, "timeout_secs": timeout_secs, "interval_secs": interval_secs }))
        }
        Intent::OpenApp => {
            let app = require_non_empty_str(obj, "app")?;
            Ok(json!({ "app": app }))
        }
        Intent::OpenFile => {
            let path = require_non_empty_str(obj, "path")?;
            Ok(json!({ "path": path }))
        }
        Intent::KeyCombo => {
            let keys = parse_keys(obj)?;
            Ok(json!({ "keys": keys }))
        }
        Intent::TypeText => {
            let text = require_non_empty_str(obj, "text")?;
            let mut map = json!({ "text": text });
            copy_optional_str(obj, "selector", &mut map);
            Ok(map)
        }
        Intent::Scroll => {
            let direction = obj
                .get("direction")
                .and_then(Value::as_str)
                .filter(|d| *d == "up" || *d == "down")
                .ok_or_else(|| ValidationError("'direction' must be 'up' or 'down'".into()))?;
            let amount = obj
                .get("amount")
                .and_then(Value::as_i64)
                .filter(|v| *v >= 1)
                .ok_or_else(|| ValidationError("'amount' must be an integer >= 1".into()))?;
            Ok(json!({ "direction": direction, "amount": amount }))
        }
        Intent::MouseMove => {
            let x = obj.get("x").and_then(Value::as_i64).ok_or_else(|| ValidationError("'x' must be an integer".into()))?;
            let y = obj.get("y").and_then(Value::as_i64).ok_or_else(|| ValidationError("'y' must be an integer".into()))?;
            Ok(json!({ "x": x, "y": y }))
        }
        Intent::Click => {
            let button = obj
                .get("button")
                .and_then(Value::as_str)
                .filter(|b| matches!(*b, "left" | "right" | "middle"))
                .unwrap_or("left");
            let clicks = obj
                .get("clicks")
                .and_then(Value::as_i64)
                .filter(|v| *v >= 1)
                .unwrap_or(1);
            let mut map = json!({ "button": button, "clicks": clicks });
            copy_optional_str(obj, "selector", &mut map);
            copy_optional_i64(obj, "x", &mut map);
            copy_optional_i64(obj, "y", &mut map);
            Ok(map)
        }
        Intent::WebSendMessage => {
            let contact = require_non_empty_str(obj, "contact")?;
            let message = require_non_empty_str(obj, "message")?;
            Ok(json!({ "contact": contact, "message": message }))
        }
        Intent::WebFillForm => {
            let fields = obj
                .get("fields")
                .and_then(Value::as_object)
                .filter(|m| !m.is_empty())
                .ok_or_else(|| ValidationError("'fields' must be a non-empty object".into()))?;
            let submit = obj.get("submit").and_then(Value::as_bool).unwrap_or(false);
            Ok(json!({ "fields": fields, "submit": submit }))
        }
        Intent::WebRequestPermission => {
            let reason = require_non_empty_str(obj, "reason")?;
            Ok(json!({ "reason": reason }))
        }
        Intent::FindUi => {
            let selector = obj
                .get("selector")
                .and_then(Value::as_object)
                .filter(|m| {
                    ["app", "window_title", "role", "name", "contains", "automation_id"]
                        .iter()
                        .any(|k| m.contains_key(*k))
                })
                .ok_or_else(|| ValidationError("'selector' must set at least one recognized key".into()))?;
            Ok(json!({ "selector": selector }))
        }
        Intent::InvokeUi => {
            if let Some(id) = obj.get("element_id").and_then(Value::as_str).filter(|s| !s.is_empty()) {
                return Ok(json!({ "element_id": id }));
            }
            if let Some(selector) = obj.get("selector").and_then(Value::as_object).filter(|m| !m.is_empty()) {
                return Ok(json!({ "selector": selector }));
            }
            Err(ValidationError("'invoke_ui' requires 'element_id' or 'selector'".into()))
        }
        Intent::WaitForWindow => {
            let window_title = require_non_empty_str(obj, "window_title")?;
            let timeout_secs = obj
                .get("timeout_secs")
                .and_then(Value::as_f64)
                .filter(|v| *v >= 0.0)
                .ok_or_else(|| ValidationError("'timeout_secs' must be a number >= 0".into()))?;
            let mut map = json!({ "window_title": window_title, "timeout_secs": timeout_secs });
            copy_optional_str(obj, "app", &mut map);
            Ok(map)
        }
    }
}

fn copy_optional_str(obj: &Map<String, Value>, key: &str, into: &mut Value) {
    if let Some(v) = obj.get(key).and_then(Value::as_str) {
        into[key] = Value::String(v.to_string());
    }
}

fn copy_optional_i64(obj: &Map<String, Value>, key: &str, into: &mut Value) {
    if let Some(v) = obj.get(key).and_then(Value::as_i64) {
        into[key] = json!(v);
    }
}

const KEY_ALIASES: &[(&str, &str)] = &[
    ("cmd", "command"),
    ("ctrl", "control"),
    ("opt", "alt"),
    ("option", "alt"),
    ("return", "enter"),
    ("escape", "esc"),
];

fn resolve_key_alias(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    for (alias, canonical) in KEY_ALIASES {
        if lower == *alias {
            return canonical.to_string();
        }
    }
    lower
}

/// Accepts either a JSON array of key tokens or the `"a+b"` string shorthand.
fn parse_keys(obj: &Map<String, Value>) -> Result<Vec<String>, ValidationError> {
    let keys: Vec<String> = match obj.get("keys") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(resolve_key_alias)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split('+')
            .map(resolve_key_alias)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    if keys.is_empty() {
        return Err(ValidationError("'keys' must be a non-empty sequence of key tokens".into()));
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_open_url() {
        let step = validate(&json!({"intent": "open_url", "url": "https://example.com"})).unwrap();
        assert_eq!(step.field_str("url"), Some("https://example.com"));
    }

    #[test]
    fn rejects_unknown_intent() {
        assert!(validate(&json!({"intent": "nonexistent"})).is_err());
    }

    #[test]
    fn rejects_missing_required_field() {
        assert!(validate(&json!({"intent": "open_app"})).is_err());
    }

    #[test]
    fn key_combo_accepts_plus_string_and_resolves_aliases() {
        let step = validate(&json!({"intent": "key_combo", "keys": "cmd+c"})).unwrap();
        let keys = step.fields.get("keys").unwrap().as_array().unwrap();
        assert_eq!(keys, &[json!("command"), json!("c")]);
    }

    #[test]
    fn web_send_message_is_tagged_web_target() {
        let step = validate(&json!({"intent": "web_send_message", "contact": "Alice", "message": "hi"})).unwrap();
        assert_eq!(step.target, Some(Target::Web));
    }

    #[test]
    fn unknown_fields_are_dropped_not_rejected() {
        let step = validate(&json!({"intent": "open_app", "app": "Spotify", "bogus": 42})).unwrap();
        assert!(step.fields.get("bogus").is_none());
    }

    #[test]
    fn normalize_steps_accepts_bare_array_and_steps_key() {
        assert_eq!(normalize_steps(&json!([{"a":1}])).len(), 1);
        assert_eq!(normalize_steps(&json!({"steps": [{"a":1}, {"a":2}]})).len(), 2);
        assert_eq!(normalize_steps(&json!("garbage")).len(), 0);
    }

    #[test]
    fn normalization_is_idempotent_under_reserialization() {
        let raw = json!({"intent": "scroll", "direction": "down", "amount": 3});
        let step = validate(&raw).unwrap();
        let reserialized = serde_json::to_value(&step).unwrap();
        let step2 = validate(&reserialized).unwrap();
        assert_eq!(step.fields, step2.fields);
    }
}
