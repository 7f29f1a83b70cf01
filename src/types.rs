use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// The closed vocabulary of step kinds. Unknown tags are rejected by the
/// validator before a `Step` is ever constructed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    OpenUrl,
    WaitForUrl,
    OpenApp,
    OpenFile,
    KeyCombo,
    TypeText,
    Scroll,
    MouseMove,
    Click,
    WebSendMessage,
    WebFillForm,
    WebRequestPermission,
    FindUi,
    InvokeUi,
    WaitForWindow,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::OpenUrl => "open_url",
            Intent::WaitForUrl => "wait_for_url",
            Intent::OpenApp => "open_app",
            Intent::OpenFile => "open_file",
            Intent::KeyCombo => "key_combo",
            Intent::TypeText => "type_text",
            Intent::Scroll => "scroll",
            Intent::MouseMove => "mouse_move",
            Intent::Click => "click",
            Intent::WebSendMessage => "web_send_message",
            Intent::WebFillForm => "web_fill_form",
            Intent::WebRequestPermission => "web_request_permission",
            Intent::FindUi => "find_ui",
            Intent::InvokeUi => "invoke_ui",
            Intent::WaitForWindow => "wait_for_window",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "open_url" => Intent::OpenUrl,
            "wait_for_url" => Intent::WaitForUrl,
            "open_app" => Intent::OpenApp,
            "open_file" => Intent::OpenFile,
            "key_combo" => Intent::KeyCombo,
            "type_text" => Intent::TypeText,
            "scroll" => Intent::Scroll,
            "mouse_move" => Intent::MouseMove,
            "click" => Intent::Click,
            "web_send_message" => Intent::WebSendMessage,
            "web_fill_form" => Intent::WebFillForm,
            "web_request_permission" => Intent::WebRequestPermission,
            "find_ui" => Intent::FindUi,
            "invoke_ui" => Intent::InvokeUi,
            "wait_for_window" => Intent::WaitForWindow,
            _ => return None,
        })
    }

    /// Intents that are always gated behind confirmation regardless of wording.
    pub fn always_confirm(&self) -> bool {
        matches!(self, Intent::WebSendMessage)
    }

    /// Intents the router promotes into the browser context when they follow
    /// an `open_url{target: web}` step.
    pub fn web_chainable(&self) -> bool {
        matches!(self, Intent::TypeText | Intent::KeyCombo | Intent::Click | Intent::Scroll)
    }

    pub fn starts_with_web(&self) -> bool {
        self.as_str().starts_with("web_")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Os,
    Web,
}

/// A validated unit of work. `fields` carries the intent-specific payload as
/// already-normalized JSON (see schema::validate) so downstream components
/// don't need to know every intent's exact shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub intent: Intent,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(flatten)]
    pub fields: Value,
    #[serde(default)]
    pub resolved_url: Option<String>,
    #[serde(default)]
    pub precomputed: bool,
    #[serde(default)]
    pub defer_open: bool,
}

impl Step {
    pub fn target_or_default(&self) -> Target {
        self.target.unwrap_or(Target::Os)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Ok,
    Failed,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub intent: Intent,
    pub status: ExecutionStatus,
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_search_query: Option<String>,
}

impl ExecutionResult {
    pub fn ok(intent: Intent, target: Target) -> Self {
        Self {
            intent,
            status: ExecutionStatus::Ok,
            target,
            details: None,
            elapsed_ms: None,
            resolved_url: None,
            fallback_used: None,
            navigation_time_ms: None,
            dom_search_query: None,
        }
    }

    pub fn failed(intent: Intent, target: Target, details: Value) -> Self {
        Self {
            intent,
            status: ExecutionStatus::Failed,
            target,
            details: Some(details),
            elapsed_ms: None,
            resolved_url: None,
            fallback_used: None,
            navigation_time_ms: None,
            dom_search_query: None,
        }
    }

    pub fn unsupported(intent: Intent, target: Target) -> Self {
        Self {
            intent,
            status: ExecutionStatus::Unsupported,
            target,
            details: None,
            elapsed_ms: None,
            resolved_url: None,
            fallback_used: None,
            navigation_time_ms: None,
            dom_search_query: None,
        }
    }

    pub fn with_elapsed(mut self, ms: u64) -> Self {
        self.elapsed_ms = Some(ms);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandSource {
    Gesture,
    Voice,
}

/// Immutable snapshot of a command awaiting approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationRecord {
    pub id: String,
    pub source: CommandSource,
    pub raw_text: String,
    pub reason: String,
    pub steps: Vec<Step>,
    pub created_at_unix_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Ok,
    Failed,
    Timeout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub status: ResolutionStatus,
    #[serde(default)]
    pub resolved_url: Option<String>,
    pub search_query: String,
    pub candidates_found: u32,
    #[serde(default)]
    pub selected_reason: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStatus {
    Ok,
    AllFailed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FallbackRung {
    Resolution,
    Search,
    Homepage,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackResult {
    pub status: FallbackStatus,
    pub final_url: Option<String>,
    pub fallback_used: FallbackRung,
    pub attempts_made: Vec<String>,
    pub resolution_details: Option<ResolutionResult>,
    pub elapsed_ms: u64,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// A run of steps sharing an inferred subject (app name, url host, or file
/// name), ordered by the index of the step that introduced the subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectGroup {
    pub subject: String,
    pub start_index: usize,
    pub member_indices: Vec<usize>,
}

/// UI context snapshot gathered by the controller before invoking the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiContext {
    pub active_window_title: Option<String>,
    pub active_app: Option<String>,
    pub browser_url: Option<String>,
    pub cursor_position: Option<(i32, i32)>,
    pub selection: Option<String>,
}

/// Outcome variants of a single command, mirrored onto the last-result slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommandOutcome {
    Ok {
        results: Vec<ExecutionResult>,
        #[serde(skip_serializing_if = "Option::is_none")]
        subjects: Option<Vec<SubjectGroup>>,
    },
    Pending {
        id: String,
    },
    Error {
        reason: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        screenshot: Option<String>,
    },
    Timeout {
        message: String,
    },
    Ignored {
        reason: String,
    },
    Denied,
    Missing,
}

pub type SlotMap = HashMap<String, String>;
