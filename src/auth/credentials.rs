//! OAuth2 client secrets as downloaded from the Google Cloud console.

use std::path::Path;

use serde::Deserialize;

use crate::error::{FetchError, Result};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Client identity used for consent and token refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The console wraps the secrets in `installed` (desktop) or `web`.
#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parse a client secrets document.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)
            .map_err(|e| FetchError::Config(format!("invalid client secrets: {e}")))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| {
                FetchError::Config(
                    "client secrets contain neither an 'installed' nor a 'web' section".into(),
                )
            })
    }

    /// Read and parse a client secrets file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            FetchError::Config(format!("cannot read credentials file {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_installed_section() {
        let json = r#"{"installed":{"client_id":"id.apps.googleusercontent.com",
            "client_secret":"s3cr3t","redirect_uris":["http://localhost"]}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.client_id, "id.apps.googleusercontent.com");
        assert_eq!(secrets.token_uri, DEFAULT_TOKEN_URI);
        assert_eq!(secrets.redirect_uris, vec!["http://localhost"]);
    }

    #[test]
    fn test_web_section_with_custom_token_uri() {
        let json = r#"{"web":{"client_id":"a","client_secret":"b",
            "token_uri":"http://127.0.0.1:9/token"}}"#;
        let secrets = ClientSecrets::from_json(json).unwrap();
        assert_eq!(secrets.token_uri, "http://127.0.0.1:9/token");
    }

    #[test]
    fn test_missing_section_is_config_error() {
        assert!(matches!(
            ClientSecrets::from_json("{}"),
            Err(FetchError::Config(_))
        ));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        assert!(matches!(
            ClientSecrets::load(Path::new("/nonexistent/credentials.json")),
            Err(FetchError::Config(_))
        ));
    }
}
