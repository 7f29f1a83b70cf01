//! macOS backend: `open` for launching, AppleScript/System Events for input.
//!
//! Scripts run via detached `osascript` spawns rather than waited-on ones —
//! launching an app or typing a keystroke should not block the caller on
//! the child process's lifetime.

use super::{failed, ok, unsupported, OsExecutor};
use crate::types::{ExecutionResult, Step};
use async_trait::async_trait;
use std::process::{Command, Stdio};
use std::time::Instant;

pub struct MacosExecutor;

const KEY_ALIASES: &[(&str, &str)] = &[("cmd", "command"), ("option", "alt")];

fn normalize_key(key: &str) -> String {
    let lower = key.to_lowercase();
    for (from, to) in KEY_ALIASES {
        if lower == *from {
            return (*to).to_string();
        }
    }
    lower
}

fn spawn_detached(program: &str, args: &[&str]) -> std::io::Result<()> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

fn hotkey_script(keys: &[String]) -> Option<String> {
    let modifier_map: &[(&str, &str)] = &[
        ("command", "command down"),
        ("control", "control down"),
        ("alt", "option down"),
        ("shift", "shift down"),
    ];

    let mut modifiers = Vec::new();
    let mut key_to_press = None;
    for key in keys {
        let normalized = normalize_key(key);
        if let Some((_, phrase)) = modifier_map.iter().find(|(name, _)| *name == normalized) {
            modifiers.push(*phrase);
        } else {
            key_to_press = Some(normalized);
        }
    }

    let key_to_press = key_to_press?;
    if modifiers.is_empty() {
        Some(format!(r#"tell application "System Events" to keystroke "{key_to_press}""#))
    } else {
        Some(format!(
            r#"tell application "System Events" to keystroke "{key_to_press}" using {{{}}}"#,
            modifiers.join(", ")
        ))
    }
}

#[async_trait]
impl OsExecutor for MacosExecutor {
    async fn execute_step(&self, step: &Step) -> ExecutionResult {
        let start = Instant::now();
        let intent = step.intent;
        let target = step.target_or_default();

        match intent {
            crate::types::Intent::OpenUrl => {
                let Some(url) = step.field_str("url") else {
                    return failed(intent, target, "missing url", start);
                };
                // `--` ends option parsing so a url starting with "-" can't be
                // misread as a flag by `open`.
                match spawn_detached("open", &["--", url]) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::OpenApp => {
                let Some(app) = step.field_str("app") else {
                    return failed(intent, target, "missing app", start);
                };
                match spawn_detached("open", &["-a", app, "--"]) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::OpenFile => {
                let Some(path) = step.field_str("path") else {
                    return failed(intent, target, "missing path", start);
                };
                match spawn_detached("open", &["--", path]) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::KeyCombo => {
                let keys: Vec<String> = step
                    .fields
                    .get("keys")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                match hotkey_script(&keys) {
                    Some(script) => match spawn_detached("osascript", &["-e", &script]) {
                        Ok(()) => ok(intent, target, start),
                        Err(e) => failed(intent, target, e.to_string(), start),
                    },
                    None => ok(intent, target, start),
                }
            }
            crate::types::Intent::TypeText => {
                let text = step.field_str("text").unwrap_or("");
                let escaped = text.replace('\\', "\\\\").replace('"', "\\\"");
                let script = format!(r#"tell application "System Events" to keystroke "{escaped}""#);
                match spawn_detached("osascript", &["-e", &script]) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::Scroll => {
                let direction = step.field_str("direction").unwrap_or("down");
                let amount = step.fields.get("amount").and_then(|v| v.as_i64()).unwrap_or(1).max(1);
                // Page Up/Down repeated `amount` times. Up maps to a positive
                // repeat count here; the web wheel-event path (web_executor)
                // treats "up" as a negative scrollBy delta. Backend-local by
                // design — do not unify, see OQ-b.
                let key_code = if direction == "up" { 116 } else { 121 };
                let script = format!(
                    r#"tell application "System Events"
                        repeat {amount} times
                            key code {key_code}
                        end repeat
                    end tell"#
                );
                match spawn_detached("osascript", &["-e", &script]) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::WaitForUrl => unsupported(intent, target, "wait_for_url removed; use target:web", start),
            crate::types::Intent::FindUi => unsupported(intent, target, "find_ui not implemented", start),
            crate::types::Intent::InvokeUi => unsupported(intent, target, "invoke_ui not implemented", start),
            crate::types::Intent::WaitForWindow => unsupported(intent, target, "wait_for_window not implemented", start),
            _ => unsupported(intent, target, "unsupported intent", start),
        }
    }
}
