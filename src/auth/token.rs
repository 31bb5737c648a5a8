//! Persisted OAuth2 token.
//!
//! Stored as JSON with 0600 permissions. Writes go to a temp file that is
//! renamed into place, so a crash never leaves a truncated token.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FetchError, Result};

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_SLACK_SECS: i64 = 60;

/// Access/refresh token pair as persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Expiration timestamp (Unix seconds).
    #[serde(default)]
    pub expires_at: Option<i64>,

    /// Space-separated scopes granted by the server.
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl StoredToken {
    /// Whether the access token is expired or about to expire.
    ///
    /// Tokens without expiry information are assumed valid.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at - EXPIRY_SLACK_SECS,
            None => false,
        }
    }
}

/// Location of the persisted token.
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the token, or `None` if the file does not exist.
    ///
    /// A corrupt file is reported as `None` with a warning so the consent
    /// flow can replace it.
    pub fn load(&self) -> Result<Option<StoredToken>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path).map_err(|e| FetchError::io(&self.path, e))?;
        match serde_json::from_str(&json) {
            Ok(token) => {
                debug!(path = %self.path.display(), "Loaded token");
                Ok(Some(token))
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    /// Persist the token with owner-only permissions.
    pub fn store(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(token)
            .map_err(|e| FetchError::Decode(format!("cannot serialize token: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        // A leftover temp file would keep its old mode through a truncate.
        let _ = fs::remove_file(&tmp_path);
        open_owner_only(&tmp_path)
            .and_then(|mut f| {
                f.write_all(json.as_bytes())?;
                f.sync_all()
            })
            .map_err(|e| FetchError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| FetchError::io(&self.path, e))?;

        debug!(path = %self.path.display(), "Stored token");
        Ok(())
    }
}

/// Create a new file that is readable only by its owner from the start.
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
