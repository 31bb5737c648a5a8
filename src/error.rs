//! Centralized error types for gmail-attachments.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the gmail-attachments library.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Invalid configuration (bad pattern, bad date, unreadable file).
    /// Fatal: reported once before the pipeline starts.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No valid session could be obtained, or the backend rejected it.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The backend is temporarily unavailable (rate limit, 5xx, network).
    #[error("Temporary backend failure: {0}")]
    Transient(String),

    /// The message or attachment no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend returned an error that retrying will not fix.
    #[error("Mail API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The backend returned a payload we could not decode.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// PDF generation failed for a message body.
    #[error("Render error: {0}")]
    Render(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, FetchError>`.
pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Auth(_))
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (rare, prefer `FetchError::io`).
impl From<std::io::Error> for FetchError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}

/// Map a transport failure to the error taxonomy.
///
/// Anything that never produced an HTTP status (connect, timeout, reset)
/// is treated as transient.
impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::Decode(e.to_string());
        }
        match e.status() {
            Some(status) => Self::from_status(status.as_u16(), e.to_string()),
            None => Self::Transient(e.to_string()),
        }
    }
}

impl FetchError {
    /// Classify an HTTP error status returned by the mail or token backend.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::Auth(message),
            404 | 410 => Self::NotFound(message),
            408 | 429 => Self::Transient(message),
            s if s >= 500 => Self::Transient(message),
            s => Self::Api { status: s, message },
        }
    }
}
