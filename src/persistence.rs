//! Atomic JSON persistence for the two on-disk gesture-mapping files.
//!
//! Both documents are rewritten by writing to a sibling temp file and
//! renaming it over the target, so a crash mid-write never leaves a
//! half-written document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// `gesture_label -> hotkey`, optional per-gesture override.
pub type GestureHotkeyMap = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GestureCommand {
    pub command_text: String,
    #[serde(default)]
    pub validated_steps: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub resolved_base_url: Option<String>,
}

/// `gesture_label -> canned command`.
pub type GestureCommandMap = HashMap<String, GestureCommand>;

pub fn gesture_hotkeys_path(user_data_dir: &Path) -> PathBuf {
    user_data_dir.join("gesture_hotkeys.json")
}

pub fn gesture_commands_path(user_data_dir: &Path) -> PathBuf {
    user_data_dir.join("gesture_commands.json")
}

pub fn load_gesture_hotkeys(path: &Path) -> io::Result<GestureHotkeyMap> {
    load_json_or_default(path)
}

pub fn load_gesture_commands(path: &Path) -> io::Result<GestureCommandMap> {
    load_json_or_default(path)
}

pub fn save_gesture_hotkeys(path: &Path, map: &GestureHotkeyMap) -> io::Result<()> {
    write_atomic(path, map)
}

pub fn save_gesture_commands(path: &Path, map: &GestureCommandMap) -> io::Result<()> {
    write_atomic(path, map)
}

fn load_json_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> io::Result<T> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_default()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e),
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    std::fs::write(&tmp_path, body)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty_default() {
        let dir = std::env::temp_dir().join(format!("persistence-test-missing-{}", std::process::id()));
        let path = dir.join("gesture_hotkeys.json");
        let loaded: GestureHotkeyMap = load_gesture_hotkeys(&path).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn round_trips_atomically() {
        let dir = std::env::temp_dir().join(format!("persistence-test-roundtrip-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gesture_commands.json");

        let mut map = GestureCommandMap::new();
        map.insert(
            "swipe_left".to_string(),
            GestureCommand { command_text: "open spotify".to_string(), validated_steps: None, resolved_url: None, resolved_base_url: None },
        );
        save_gesture_commands(&path, &map).unwrap();

        let loaded = load_gesture_commands(&path).unwrap();
        assert_eq!(loaded.get("swipe_left").unwrap().command_text, "open spotify");

        std::fs::remove_dir_all(&dir).ok();
    }
}
