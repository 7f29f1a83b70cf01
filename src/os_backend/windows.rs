//! Windows backend: `cmd /c start` for launching. No native input automation,
//! so everything past open/app/file falls through to `unsupported` and the
//! router retries on the generic backend.

use super::{failed, ok, unsupported, OsExecutor};
use crate::router::app_to_url;
use crate::types::{ExecutionResult, Step};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

pub struct WindowsExecutor;

fn start_detached(target: &str) -> std::io::Result<()> {
    Command::new("cmd")
        .args(["/c", "start", "", target])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map(|_| ())
}

/// Start Menu shortcut directories for the current user and all users, the
/// same two locations the shell itself indexes for its app launcher search.
fn start_menu_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(program_data) = std::env::var("PROGRAMDATA") {
        dirs.push(PathBuf::from(program_data).join(r"Microsoft\Windows\Start Menu\Programs"));
    }
    if let Ok(app_data) = std::env::var("APPDATA") {
        dirs.push(PathBuf::from(app_data).join(r"Microsoft\Windows\Start Menu\Programs"));
    }
    dirs
}

/// Looks for a shortcut whose file stem matches `app` (case-insensitively)
/// anywhere under the Start Menu program directories.
fn probe_start_menu(app: &str) -> Option<PathBuf> {
    let target = app.trim().to_lowercase();
    if target.is_empty() {
        return None;
    }
    start_menu_dirs().iter().find_map(|dir| search_dir(dir, &target, 0))
}

fn search_dir(dir: &Path, target: &str, depth: u8) -> Option<PathBuf> {
    if depth > 4 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = search_dir(&path, target, depth + 1) {
                return Some(found);
            }
            continue;
        }
        let is_shortcut = path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("lnk")).unwrap_or(false);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("").to_lowercase();
        if is_shortcut && stem == target {
            return Some(path);
        }
    }
    None
}

#[async_trait]
impl OsExecutor for WindowsExecutor {
    async fn execute_step(&self, step: &Step) -> ExecutionResult {
        let start = Instant::now();
        let intent = step.intent;
        let target = step.target_or_default();

        match intent {
            crate::types::Intent::OpenUrl => {
                let Some(url) = step.field_str("url") else {
                    return failed(intent, target, "missing url", start);
                };
                match start_detached(url) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::OpenApp => {
                let Some(app) = step.field_str("app") else {
                    return failed(intent, target, "missing app", start);
                };

                // Probe the Start Menu catalog first; a bare `start app` call
                // only works when `app` happens to be on PATH or registered
                // as an App Path, which most installed apps aren't.
                if let Some(shortcut) = probe_start_menu(app) {
                    return match start_detached(&shortcut.to_string_lossy()) {
                        Ok(()) => ok(intent, target, start),
                        Err(e) => failed(intent, target, e.to_string(), start),
                    };
                }

                match app_to_url(app) {
                    Some(url) => match start_detached(&url) {
                        Ok(()) => ok(intent, target, start),
                        Err(e) => failed(intent, target, e.to_string(), start),
                    },
                    None => failed(intent, target, "app not found in start menu catalog and no url heuristic match", start),
                }
            }
            crate::types::Intent::OpenFile => {
                let Some(path) = step.field_str("path") else {
                    return failed(intent, target, "missing path", start);
                };
                match start_detached(path) {
                    Ok(()) => ok(intent, target, start),
                    Err(e) => failed(intent, target, e.to_string(), start),
                }
            }
            crate::types::Intent::FindUi | crate::types::Intent::InvokeUi | crate::types::Intent::WaitForWindow => {
                unsupported(intent, target, "UI automation not implemented", start)
            }
            _ => unsupported(intent, target, "unsupported intent", start),
        }
    }
}
