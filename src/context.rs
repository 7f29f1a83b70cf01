//! Gathers a snapshot of the active window, foreground app, browser URL, and
//! text selection before a command is interpreted, so the LLM prompt (and
//! subject grouping) can disambiguate "it"/"this" style references.
//!
//! Grounded on the clipboard-preserving selection read this crate's ancestor
//! used: snapshot the clipboard, send a copy keystroke, wait briefly, read
//! the clipboard again, and only report a change — restoring the original
//! contents if the keystroke didn't actually alter the selection. Window
//! title and browser URL come from the kept AppleScript helper on macOS;
//! other platforms report `None` for those fields, matching the ancestor's
//! own graceful degradation when its optional dependencies were absent.

use crate::types::UiContext;
use std::process::{Command, Stdio};
use std::time::Duration;

pub async fn gather(read_selection: bool) -> UiContext {
    let (active_window_title, active_app, browser_url) = window_context();

    let selection = if read_selection { read_selection_text().await } else { None };

    UiContext {
        active_window_title,
        active_app,
        browser_url,
        cursor_position: None,
        selection,
    }
}

#[cfg(target_os = "macos")]
fn window_context() -> (Option<String>, Option<String>, Option<String>) {
    match crate::applescript::get_active_window_context() {
        Ok((title, url)) => {
            let title = if title.is_empty() { None } else { Some(title) };
            let url = if url.is_empty() { None } else { Some(url) };
            (title, None, url)
        }
        Err(_) => (None, None, None),
    }
}

#[cfg(not(target_os = "macos"))]
fn window_context() -> (Option<String>, Option<String>, Option<String>) {
    (None, None, None)
}

async fn read_selection_text() -> Option<String> {
    let before = read_clipboard().await;
    if !copy_selection().await {
        return before;
    }
    tokio::time::sleep(Duration::from_millis(60)).await;
    let after = read_clipboard().await;

    if let (Some(before), Some(after)) = (&before, &after) {
        if before != after {
            write_clipboard(before).await;
        }
    }
    after
}

#[cfg(target_os = "macos")]
async fn copy_selection() -> bool {
    tokio::task::spawn_blocking(|| crate::applescript::run(r#"tell application "System Events" to keystroke "c" using {command down}"#).is_ok())
        .await
        .unwrap_or(false)
}

#[cfg(not(target_os = "macos"))]
async fn copy_selection() -> bool {
    false
}

#[cfg(target_os = "macos")]
async fn read_clipboard() -> Option<String> {
    run_clipboard_cmd("pbpaste", &[], None).await
}

#[cfg(target_os = "windows")]
async fn read_clipboard() -> Option<String> {
    run_clipboard_cmd("powershell", &["-NoProfile", "-Command", "Get-Clipboard"], None).await
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
async fn read_clipboard() -> Option<String> {
    run_clipboard_cmd("xclip", &["-selection", "clipboard", "-o"], None).await
}

#[cfg(target_os = "macos")]
async fn write_clipboard(text: &str) {
    run_clipboard_cmd("pbcopy", &[], Some(text.to_string())).await;
}

#[cfg(target_os = "windows")]
async fn write_clipboard(text: &str) {
    let script = format!("Set-Clipboard -Value @'\n{text}\n'@");
    run_clipboard_cmd("powershell", &["-NoProfile", "-Command", &script], None).await;
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
async fn write_clipboard(text: &str) {
    run_clipboard_cmd("xclip", &["-selection", "clipboard"], Some(text.to_string())).await;
}

async fn run_clipboard_cmd(program: &str, args: &[&str], input: Option<String>) -> Option<String> {
    use std::io::Write;

    let program = program.to_string();
    let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();

    tokio::task::spawn_blocking(move || {
        let mut cmd = Command::new(&program);
        cmd.args(&args).stdout(Stdio::piped()).stderr(Stdio::null());
        if input.is_some() {
            cmd.stdin(Stdio::piped());
        } else {
            cmd.stdin(Stdio::null());
        }

        let mut child = cmd.spawn().ok()?;
        if let Some(text) = &input {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(text.as_bytes());
            }
        }
        let output = child.wait_with_output().ok()?;
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            None
        } else {
            Some(stdout)
        }
    })
    .await
    .ok()
    .flatten()
}
