use thiserror::Error;

/// Structured web-execution failure codes, surfaced to the last-result slot
/// verbatim so a caller can match on them instead of parsing strings.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebErrorCode {
    #[error("WEB_UNSAFE_URL")]
    UnsafeUrl,
    #[error("WEB_OPEN_TIMEOUT")]
    OpenTimeout,
    #[error("WEB_OPEN_FAILED")]
    OpenFailed,
    #[error("WEB_RESOLUTION_FAILED")]
    ResolutionFailed,
    #[error("WEB_PLAYWRIGHT_MISSING")]
    RuntimeMissing,
    #[error("WEB_FORM_FIELD_NOT_FOUND")]
    FormFieldNotFound,
    #[error("WEB_FORM_SUBMIT_FAILED")]
    FormSubmitFailed,
    #[error("WEB_UNEXPECTED")]
    Unexpected,
    #[error("WA_MISSING_CONTACT")]
    AdapterMissingContact,
    #[error("WA_MISSING_MESSAGE")]
    AdapterMissingMessage,
    #[error("WA_NOT_LOGGED_IN")]
    AdapterNotLoggedIn,
    #[error("WA_CONTACT_NOT_FOUND")]
    AdapterContactNotFound,
    #[error("WA_CHAT_NOT_READY")]
    AdapterChatNotReady,
}

impl WebErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebErrorCode::UnsafeUrl => "WEB_UNSAFE_URL",
            WebErrorCode::OpenTimeout => "WEB_OPEN_TIMEOUT",
            WebErrorCode::OpenFailed => "WEB_OPEN_FAILED",
            WebErrorCode::ResolutionFailed => "WEB_RESOLUTION_FAILED",
            WebErrorCode::RuntimeMissing => "WEB_PLAYWRIGHT_MISSING",
            WebErrorCode::FormFieldNotFound => "WEB_FORM_FIELD_NOT_FOUND",
            WebErrorCode::FormSubmitFailed => "WEB_FORM_SUBMIT_FAILED",
            WebErrorCode::Unexpected => "WEB_UNEXPECTED",
            WebErrorCode::AdapterMissingContact => "WA_MISSING_CONTACT",
            WebErrorCode::AdapterMissingMessage => "WA_MISSING_MESSAGE",
            WebErrorCode::AdapterNotLoggedIn => "WA_NOT_LOGGED_IN",
            WebErrorCode::AdapterContactNotFound => "WA_CONTACT_NOT_FOUND",
            WebErrorCode::AdapterChatNotReady => "WA_CHAT_NOT_READY",
        }
    }
}

/// A structured web-execution failure. Carries an optional screenshot path
/// captured at the moment of failure (see web_executor's error-screenshot policy).
#[derive(Error, Debug, Clone)]
#[error("{code}: {message}")]
pub struct WebExecutionError {
    pub code: WebErrorCode,
    pub message: String,
    pub screenshot_path: Option<String>,
}

impl WebExecutionError {
    pub fn new(code: WebErrorCode, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), screenshot_path: None }
    }

    pub fn with_screenshot(mut self, path: impl Into<String>) -> Self {
        self.screenshot_path = Some(path.into());
        self
    }
}

/// Crate-wide error taxonomy backing the error handling design: each variant
/// maps to one of the tags a command result can surface.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("llm error: {0}")]
    Llm(String),

    #[error("command timed out")]
    Timeout,

    #[error(transparent)]
    Web(#[from] WebExecutionError),

    #[error("os backend error: {0}")]
    Os(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl AppError {
    /// Reason string for the `{status: error, reason}` wire shape.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Structured code, when this error carries one (web errors only).
    pub fn code(&self) -> Option<&'static str> {
        match self {
            AppError::Web(e) => Some(e.code.as_str()),
            _ => None,
        }
    }

    pub fn screenshot(&self) -> Option<&str> {
        match self {
            AppError::Web(e) => e.screenshot_path.as_deref(),
            _ => None,
        }
    }
}
