//! Bounded FIFO event queue, single worker, per-command wall-clock timeout.
//!
//! Grounded on the thin controller that owned an executor and forwarded
//! gesture/voice events to it, generalized per the concurrency model: events
//! now flow through a bounded `tokio::sync::mpsc` channel serviced by one
//! long-running worker task, and each engine call races a hard timeout so a
//! stuck browser or keystroke call can never wedge the queue.

use crate::context;
use crate::engine::CommandEngine;
use crate::persistence::GestureCommandMap;
use crate::types::{CommandOutcome, CommandSource};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Instrument;

#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub source: CommandSource,
    pub action: String,
    pub payload: serde_json::Value,
}

pub struct Controller {
    sender: mpsc::Sender<InboundEvent>,
    last_result: Arc<Mutex<Option<CommandOutcome>>>,
}

impl Controller {
    pub fn spawn(engine: Arc<CommandEngine>, gestures: GestureCommandMap, queue_capacity: usize, command_timeout: Option<Duration>) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let last_result = Arc::new(Mutex::new(None));

        tokio::spawn(worker_loop(engine, gestures, receiver, last_result.clone(), command_timeout));

        Self { sender, last_result }
    }

    /// Non-blocking enqueue; drops and logs on a full queue.
    pub fn handle_event(&self, event: InboundEvent) {
        if let Err(err) = self.sender.try_send(event) {
            tracing::warn!(?err, "controller queue full, dropping event");
        }
    }

    pub fn last_result(&self) -> Option<CommandOutcome> {
        self.last_result.lock().unwrap().clone()
    }
}

/// Opens a span scoping one command's full lifetime so its log lines (across
/// parsing, execution, and any chained web steps) can be correlated by id.
fn command_span(source: CommandSource, id: &uuid::Uuid) -> tracing::Span {
    tracing::info_span!("command", ?source, %id)
}

async fn worker_loop(
    engine: Arc<CommandEngine>,
    gestures: GestureCommandMap,
    mut receiver: mpsc::Receiver<InboundEvent>,
    last_result: Arc<Mutex<Option<CommandOutcome>>>,
    command_timeout: Option<Duration>,
) {
    tracing::info!("command controller ready");

    while let Some(event) = receiver.recv().await {
        let command_id = uuid::Uuid::new_v4();
        let span = command_span(event.source, &command_id);
        span.in_scope(|| tracing::info!(source = ?event.source, action = %event.action, "received event"));

        let text = resolve_event_text(&event, &gestures);
        let preconfigured_steps = validated_steps_for(&event, &gestures);
        let engine = engine.clone();
        let source = event.source;
        let task_span = span.clone();

        // Spawned onto its own task so a timeout below can race the
        // `JoinHandle` instead of the bare future: dropping a `Timeout<F>`
        // drops `F` itself, which would cancel an in-flight engine/browser
        // call at its next await point. Dropping a `JoinHandle` does not
        // abort the task it points to, so an elapsed command keeps running
        // to completion off to the side instead of being cut off mid-step.
        let handle = tokio::spawn(async move { run_engine(&engine, source, &text, preconfigured_steps).await }.instrument(task_span));

        let outcome = match command_timeout {
            None => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => CommandOutcome::Error { reason: format!("command task failed: {e}"), code: None, screenshot: None },
            },
            Some(timeout) => match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => CommandOutcome::Error { reason: format!("command task failed: {e}"), code: None, screenshot: None },
                Err(_) => CommandOutcome::Timeout { message: format!("command timed out after {}ms", timeout.as_millis()) },
            },
        };

        span.in_scope(|| tracing::info!(action = %event.action, "completed"));
        *last_result.lock().unwrap() = Some(outcome);
    }
}

async fn run_engine(engine: &CommandEngine, source: CommandSource, text: &str, preconfigured_steps: Option<Vec<serde_json::Value>>) -> CommandOutcome {
    if let Some(raw_steps) = preconfigured_steps {
        let parsed: Result<Vec<crate::types::Step>, _> = raw_steps.iter().map(crate::schema::validate).collect();
        return match parsed {
            Ok(steps) => engine.run_steps(source, text, steps).await,
            Err(e) => CommandOutcome::Error { reason: e.0, code: None, screenshot: None },
        };
    }

    let is_shortcut_candidate = is_trivial_shortcut_phrase(text) || text.trim_start().starts_with('{') || text.trim_start().starts_with('[');
    let context_value = if is_shortcut_candidate {
        serde_json::json!({})
    } else {
        let ui_context = context::gather(true).await;
        serde_json::to_value(ui_context).unwrap_or(serde_json::json!({}))
    };

    engine.run(source, text, &context_value).await
}

fn validated_steps_for(event: &InboundEvent, gestures: &GestureCommandMap) -> Option<Vec<serde_json::Value>> {
    if event.source != CommandSource::Gesture {
        return None;
    }
    gestures.get(&event.action).and_then(|g| g.validated_steps.clone())
}

fn is_trivial_shortcut_phrase(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "copy" | "paste" | "cut" | "undo" | "redo" | "select all"
    )
}

fn resolve_event_text(event: &InboundEvent, gestures: &GestureCommandMap) -> String {
    if event.source == CommandSource::Gesture {
        if let Some(mapped) = gestures.get(&event.action) {
            return mapped.command_text.clone();
        }
    }
    event
        .payload
        .get("text")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| event.action.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_gesture_text_from_mapping() {
        let mut gestures = GestureCommandMap::new();
        gestures.insert(
            "swipe_left".to_string(),
            crate::persistence::GestureCommand {
                command_text: "open spotify".to_string(),
                validated_steps: None,
                resolved_url: None,
                resolved_base_url: None,
            },
        );
        let event = InboundEvent { source: CommandSource::Gesture, action: "swipe_left".to_string(), payload: serde_json::json!({}) };
        assert_eq!(resolve_event_text(&event, &gestures), "open spotify");
    }

    #[test]
    fn falls_back_to_payload_text_for_voice_events() {
        let event = InboundEvent {
            source: CommandSource::Voice,
            action: "voice_command".to_string(),
            payload: serde_json::json!({"text": "open gmail"}),
        };
        assert_eq!(resolve_event_text(&event, &GestureCommandMap::new()), "open gmail");
    }

    #[test]
    fn shortcut_phrases_skip_context_gathering() {
        assert!(is_trivial_shortcut_phrase("Copy"));
        assert!(is_trivial_shortcut_phrase("select all"));
        assert!(!is_trivial_shortcut_phrase("open spotify and play jazz"));
    }
}
