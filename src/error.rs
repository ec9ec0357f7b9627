use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the harness library.
///
/// Most lifecycle failures never reach callers as errors; they are logged and
/// swallowed by the coordinator. The variants here are the ones a caller can
/// act on.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("no running device found for '{name}' within {waited_secs}s")]
    DeviceNotFound { name: String, waited_secs: u64 },

    #[error("adb is not available: {0}")]
    AdbUnavailable(String),

    #[error("command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("session error: {0}")]
    Session(String),

    #[error("screenshot already exists: {}", .0.display())]
    ScreenshotExists(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("report error: {0}")]
    Report(String),

    #[error("install error: {0}")]
    Install(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    pub fn session(err: impl std::fmt::Display) -> Self {
        HarnessError::Session(err.to_string())
    }
}
