//! Process-wide store of commands awaiting explicit approval.
//!
//! Grounded in the same singleton-map-behind-a-mutex shape the browser
//! automation module uses for its own process-wide state, but keyed by a
//! UUID so a caller can reference a specific pending command later.

use crate::types::{CommandSource, ConfirmationRecord, Step};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

static PENDING: Lazy<Mutex<HashMap<String, ConfirmationRecord>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub enum ResolveOutcome {
    Approved(Vec<Step>),
    Denied,
    Missing,
}

/// Creates a confirmation record and returns its id.
pub fn create(source: CommandSource, raw_text: String, reason: String, steps: Vec<Step>) -> String {
    let id = Uuid::new_v4().to_string();
    let created_at_unix_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let record = ConfirmationRecord {
        id: id.clone(),
        source,
        raw_text,
        reason,
        steps,
        created_at_unix_ms,
    };

    PENDING.lock().unwrap().insert(id.clone(), record);
    id
}

/// Removes and returns the record's step list, or `Denied`/`Missing`.
pub fn approve(id: &str) -> ResolveOutcome {
    match PENDING.lock().unwrap().remove(id) {
        Some(record) => ResolveOutcome::Approved(record.steps),
        None => ResolveOutcome::Missing,
    }
}

pub fn deny(id: &str) -> ResolveOutcome {
    match PENDING.lock().unwrap().remove(id) {
        Some(_) => ResolveOutcome::Denied,
        None => ResolveOutcome::Missing,
    }
}

/// Snapshot of all outstanding confirmations, for a UI to render.
pub fn list_pending() -> Vec<ConfirmationRecord> {
    PENDING.lock().unwrap().values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step() -> Step {
        crate::schema::validate(&serde_json::json!({"intent": "open_app", "app": "Finder"})).unwrap()
    }

    #[test]
    fn approve_returns_stored_steps_and_clears_record() {
        let id = create(CommandSource::Voice, "delete everything".into(), "sensitive_regex".into(), vec![step()]);
        match approve(&id) {
            ResolveOutcome::Approved(steps) => assert_eq!(steps.len(), 1),
            _ => panic!("expected approved"),
        }
        assert!(matches!(approve(&id), ResolveOutcome::Missing));
    }

    #[test]
    fn deny_clears_record_without_returning_steps() {
        let id = create(CommandSource::Gesture, "wipe drive".into(), "sensitive_regex".into(), vec![step()]);
        assert!(matches!(deny(&id), ResolveOutcome::Denied));
        assert!(matches!(deny(&id), ResolveOutcome::Missing));
    }

    #[test]
    fn unknown_id_is_missing() {
        assert!(matches!(approve("not-a-real-id"), ResolveOutcome::Missing));
    }
}
