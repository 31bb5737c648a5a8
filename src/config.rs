//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$GMAIL_ATTACHMENTS_CONFIG` (environment variable)
//! 2. `~/.config/gmail-attachments/config.toml` (Linux/macOS)
//!    `%APPDATA%\gmail-attachments\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags (and their environment variables) are applied on
//! top by the binary.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mailbox search settings.
    pub gmail: GmailConfig,
    /// Client-side filters.
    pub filter: FilterConfig,
    /// On-disk layout.
    pub output: OutputConfig,
    /// Credential and token locations.
    pub auth: AuthConfig,
    /// Retry policy for backend calls.
    pub retry: RetryConfig,
    /// Logging.
    pub general: GeneralConfig,
}

/// Mailbox search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// Server-side search query (Gmail search syntax).
    pub search_query: String,
    /// Maximum number of messages to enumerate.
    pub max_messages: usize,
    /// Base URL of the Gmail REST API.
    pub api_base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Client-side filters. Absent values disable the filter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Earliest accepted date, `YYYY/MM/DD`.
    pub date_from: Option<String>,
    /// Latest accepted date (whole day included), `YYYY/MM/DD`.
    pub date_to: Option<String>,
    /// Regular expression matched case-insensitively against the subject.
    pub subject_pattern: Option<String>,
    /// Regular expression matched case-insensitively against each attachment filename.
    pub filename_pattern: Option<String>,
}

/// On-disk layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for downloaded files.
    pub download_path: PathBuf,
    /// Put each message's files in `{subject}_{id}/`.
    pub create_subject_folders: bool,
    /// Render the body to PDF when no attachment survives the filters.
    pub convert_body_if_no_attachment: bool,
}

/// Credential and token locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth2 client secrets downloaded from the Google Cloud console.
    pub credentials_file: PathBuf,
    /// Persisted access/refresh token.
    pub token_file: PathBuf,
    /// Allow the browser consent flow when no usable token exists.
    pub interactive: bool,
}

/// Retry policy for backend calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call (1 = no retry).
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further attempt.
    pub base_delay_ms: u64,
    /// Upper bound for a single delay.
    pub max_delay_ms: u64,
}

/// Logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Shortcut for `log_level = "debug"`.
    pub verbose_logging: bool,
    /// Directory for the log file. Defaults to the user cache directory.
    pub log_dir: Option<PathBuf>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            search_query: "has:attachment".to_string(),
            max_messages: 100,
            api_base_url: "https://gmail.googleapis.com".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("./downloads"),
            create_subject_folders: true,
            convert_body_if_no_attachment: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            interactive: true,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verbose_logging: false,
            log_dir: None,
        }
    }
}

impl GeneralConfig {
    /// Effective log level after applying `verbose_logging`.
    pub fn effective_level(&self) -> &str {
        if self.verbose_logging {
            "debug"
        } else {
            self.log_level.as_str()
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration.
///
/// An explicitly given file must exist and parse. The default location is
/// optional: a missing file yields the built-in defaults, but a file that
/// exists and fails to parse is still an error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let (path, required) = match explicit {
        Some(p) => (Some(p.to_path_buf()), true),
        None => (config_file_path(), false),
    };

    let Some(path) = path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        if required {
            return Err(FetchError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|e| FetchError::Config(format!("cannot read {}: {e}", path.display())))?;
    let cfg = toml::from_str::<Config>(&contents)
        .map_err(|e| FetchError::Config(format!("cannot parse {}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("GMAIL_ATTACHMENTS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("gmail-attachments").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gmail-attachments")
}
