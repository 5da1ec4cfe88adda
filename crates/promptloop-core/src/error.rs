//! Core error type for promptloop.
//!
//! `AutomationError` is used by the store, the bridge and the engine. The
//! engine never lets a dispatch error escape a step: it is recorded on the
//! step and reported to the observer instead.

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("A workflow is already running")]
    AlreadyRunning,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Desktop automation error: {0}")]
    Desktop(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AutomationError {
    fn from(e: serde_json::Error) -> Self {
        AutomationError::Parse(e.to_string())
    }
}

impl From<serde_yaml::Error> for AutomationError {
    fn from(e: serde_yaml::Error) -> Self {
        AutomationError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AutomationError>;
