use std::path::PathBuf;
use thiserror::Error;

/// The central error type for Lectern.
///
/// Every layer (HTTP client, session store, test engine, editors) has its own
/// enum; they all fold into this one so the CLI can pick an exit code.
#[derive(Error, Debug)]
pub enum LecternError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Test session error: {0}")]
    Engine(#[from] EngineError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A failed request. The web client only knew "request failed"; the split here
/// lets callers tell a dead session from a missing record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Request timed out")]
    Timeout,

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Map a non-2xx status and its `{"error": ...}` message to a variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            _ => ApiError::HttpStatus { status, message },
        }
    }

    /// True when the server rejected the token itself.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account {email} is disabled")]
    AccountDisabled { email: String },

    #[error("Not logged in. Run `lectern login` first")]
    NotLoggedIn,

    #[error("Route {route} requires the {required} role")]
    WrongRole { route: String, required: String },
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Storage error at {path}: {message}")]
    Storage { path: PathBuf, message: String },

    #[error("Stored session is corrupted: {0}")]
    Corrupted(String),
}

/// Test-taking state machine violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Cannot {operation}: the test is already finished")]
    AlreadyFinished { operation: String },

    #[error("Cannot restart: the test is still in progress")]
    NotFinished,

    #[error("Question index {index} out of range (test has {count} questions)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("Unknown question '{0}'")]
    UnknownQuestion(String),

    #[error("Answer does not fit a {expected} question")]
    AnswerKindMismatch { expected: String },

    #[error("Test has no questions")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Required field '{field}' is empty")]
    MissingField { field: &'static str },

    #[error("Field '{field}' is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("No item with id '{0}' in this list")]
    UnknownItem(String),
}

pub type Result<T> = std::result::Result<T, LecternError>;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_AUTH_ERROR: u8 = 3;
pub const EXIT_API_ERROR: u8 = 4;
pub const EXIT_VALIDATION_ERROR: u8 = 5;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if let Some(err) = e.downcast_ref::<LecternError>() {
        return match err {
            LecternError::Config(_) => EXIT_CONFIG_ERROR,
            LecternError::Auth(_) => EXIT_AUTH_ERROR,
            LecternError::Api(api) if api.is_auth_failure() => EXIT_AUTH_ERROR,
            LecternError::Api(_) => EXIT_API_ERROR,
            LecternError::Editor(_) | LecternError::Engine(_) => EXIT_VALIDATION_ERROR,
            _ => EXIT_ERROR,
        };
    }

    // Direct enum fallbacks for errors that skipped the wrapper
    if let Some(api) = e.downcast_ref::<ApiError>() {
        return if api.is_auth_failure() {
            EXIT_AUTH_ERROR
        } else {
            EXIT_API_ERROR
        };
    }
    if e.downcast_ref::<AuthError>().is_some() {
        return EXIT_AUTH_ERROR;
    }
    if e.downcast_ref::<EditorError>().is_some() || e.downcast_ref::<EngineError>().is_some() {
        return EXIT_VALIDATION_ERROR;
    }

    EXIT_ERROR
}
