//! Token-file backed session provider with refresh and consent fallback.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::{FetchError, Result};

use super::consent;
use super::credentials::ClientSecrets;
use super::token::{StoredToken, TokenFile};
use super::{SessionHandle, SessionProvider};

/// Successful token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

/// Error body returned by the token endpoint.
#[derive(Debug, Default, Deserialize)]
struct TokenError {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Session provider backed by a client secrets file and a token file.
///
/// Order of attempts: stored unexpired token, refresh with the stored
/// refresh token, then (if allowed) the interactive consent flow. Every
/// acquired token is persisted for the next run.
#[derive(Debug)]
pub struct OAuthSession {
    credentials_path: PathBuf,
    token_file: TokenFile,
    interactive: bool,
    http: reqwest::blocking::Client,
}

impl OAuthSession {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>, interactive: bool) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_file: TokenFile::new(token_path),
            interactive,
            http: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            &config.credentials_file,
            &config.token_file,
            config.interactive,
        )
    }

    pub fn token_path(&self) -> &Path {
        self.token_file.path()
    }

    /// Run the consent flow unconditionally and persist the new token.
    pub fn authorize(&self) -> Result<StoredToken> {
        let secrets = ClientSecrets::load(&self.credentials_path)?;
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|e| FetchError::Auth(format!("cannot open loopback listener: {e}")))?;
        let port = listener
            .local_addr()
            .map_err(|e| FetchError::Auth(format!("loopback address: {e}")))?
            .port();
        let request = consent::prepare(&secrets, &format!("http://127.0.0.1:{port}"))?;

        info!(port, "Starting OAuth2 consent flow");
        eprintln!(
            "\nOpen this URL in your browser to grant read-only Gmail access:\n\n  {}\n",
            request.authorize_url
        );

        let code = consent::wait_for_code(&listener, &request.state)?;
        let token = self.token_request(
            &secrets.token_uri,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", request.redirect_uri.as_str()),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("code_verifier", request.pkce_verifier.as_str()),
            ],
            None,
        )?;
        self.persist(&token);
        Ok(token)
    }

    /// Exchange a refresh token for a new access token.
    pub fn refresh(&self, refresh_token: &str) -> Result<StoredToken> {
        let secrets = ClientSecrets::load(&self.credentials_path)?;
        info!("Refreshing expired credentials");
        let token = self.token_request(
            &secrets.token_uri,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
            ],
            Some(refresh_token),
        )?;
        self.persist(&token);
        Ok(token)
    }

    /// POST a form to the token endpoint. `previous_refresh` is kept when
    /// the server does not rotate the refresh token.
    fn token_request(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
        previous_refresh: Option<&str>,
    ) -> Result<StoredToken> {
        let response = self
            .http
            .post(token_uri)
            .form(form)
            .send()
            .map_err(|e| FetchError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body: TokenError = response.json().unwrap_or_default();
            let detail = body.error_description.unwrap_or(body.error);
            return Err(FetchError::Auth(format!(
                "token request rejected ({status}): {detail}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| FetchError::Auth(format!("unreadable token response: {e}")))?;
        let now = chrono::Utc::now().timestamp();
        Ok(StoredToken {
            access_token: body.access_token,
            refresh_token: body
                .refresh_token
                .or_else(|| previous_refresh.map(String::from)),
            token_type: body.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at: body.expires_in.map(|secs| now + secs),
            scope: body.scope,
        })
    }

    /// Persisting is best-effort: a run can proceed with an in-memory token.
    fn persist(&self, token: &StoredToken) {
        if let Err(e) = self.token_file.store(token) {
            warn!(path = %self.token_file.path().display(), error = %e, "Could not save token");
        }
    }
}

impl SessionProvider for OAuthSession {
    fn get_session(&self) -> Result<SessionHandle> {
        let stored = self
            .token_file
            .load()
            .map_err(|e| FetchError::Auth(format!("cannot read token: {e}")))?;

        if let Some(token) = &stored {
            if !token.is_expired() {
                return Ok(SessionHandle::new(&token.access_token));
            }
        }

        if let Some(refresh_token) = stored.as_ref().and_then(|t| t.refresh_token.as_deref()) {
            match self.refresh(refresh_token) {
                Ok(token) => return Ok(SessionHandle::new(token.access_token)),
                Err(e @ FetchError::Config(_)) => return Err(e),
                Err(e) if self.interactive => {
                    warn!(error = %e, "Token refresh failed, falling back to consent");
                }
                Err(e) => return Err(e),
            }
        }

        if !self.interactive {
            return Err(FetchError::Auth(format!(
                "no usable token at {} and interactive consent is disabled",
                self.token_file.path().display()
            )));
        }

        let token = self.authorize()?;
        Ok(SessionHandle::new(token.access_token))
    }
}
