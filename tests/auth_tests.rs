//! Session acquisition from stored tokens, with a mocked token endpoint.

use assert_fs::prelude::*;
use assert_fs::TempDir;
use mockito::{Matcher, Server};

use gmail_attachments::auth::oauth::OAuthSession;
use gmail_attachments::auth::token::{StoredToken, TokenFile};
use gmail_attachments::auth::SessionProvider;
use gmail_attachments::error::FetchError;

fn token(access: &str, refresh: Option<&str>, expires_at: Option<i64>) -> StoredToken {
    StoredToken {
        access_token: access.to_string(),
        refresh_token: refresh.map(String::from),
        token_type: "Bearer".to_string(),
        expires_at,
        scope: Some("https://www.googleapis.com/auth/gmail.readonly".to_string()),
    }
}

fn write_secrets(dir: &TempDir, token_uri: &str) -> std::path::PathBuf {
    let file = dir.child("credentials.json");
    file.write_str(&format!(
        r#"{{"installed": {{"client_id": "cid.apps.googleusercontent.com",
            "client_secret": "shh", "token_uri": "{token_uri}",
            "redirect_uris": ["http://localhost"]}}}}"#
    ))
    .unwrap();
    file.path().to_path_buf()
}

#[test]
fn test_unexpired_token_is_used_as_is() {
    let dir = TempDir::new().unwrap();
    let token_path = dir.child("token.json");
    let future = chrono::Utc::now().timestamp() + 3600;
    TokenFile::new(token_path.path())
        .store(&token("still-good", Some("r1"), Some(future)))
        .unwrap();

    // No credentials file: a refresh attempt would fail with a config error.
    let session = OAuthSession::new(dir.child("missing.json").path(), token_path.path(), false);
    let handle = session.get_session().unwrap();
    assert_eq!(handle.access_token(), "still-good");
}

#[test]
fn test_expired_token_is_refreshed_and_persisted() {
    let mut server = Server::new();
    let mock = server
        .mock("POST", "/token")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            Matcher::UrlEncoded("refresh_token".into(), "r1".into()),
            Matcher::UrlEncoded("client_id".into(), "cid.apps.googleusercontent.com".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token": "fresh", "expires_in": 3600, "token_type": "Bearer"}"#)
        .create();

    let dir = TempDir::new().unwrap();
    let credentials = write_secrets(&dir, &format!("{}/token", server.url()));
    let token_path = dir.child("token.json");
    let past = chrono::Utc::now().timestamp() - 10;
    TokenFile::new(token_path.path())
        .store(&token("stale", Some("r1"), Some(past)))
        .unwrap();

    let session = OAuthSession::new(&credentials, token_path.path(), false);
    let handle = session.get_session().unwrap();
    assert_eq!(handle.access_token(), "fresh");
    mock.assert();

    let saved = TokenFile::new(token_path.path()).load().unwrap().unwrap();
    assert_eq!(saved.access_token, "fresh");
    assert_eq!(saved.refresh_token.as_deref(), Some("r1"));
    assert!(!saved.is_expired());
}

#[test]
fn test_rejected_refresh_is_auth_error_when_non_interactive() {
    let mut server = Server::new();
    let _mock = server
        .mock("POST", "/token")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "invalid_grant", "error_description": "Token has been expired or revoked."}"#)
        .create();

    let dir = TempDir::new().unwrap();
    let credentials = write_secrets(&dir, &format!("{}/token", server.url()));
    let token_path = dir.child("token.json");
    TokenFile::new(token_path.path())
        .store(&token("stale", Some("revoked"), Some(0)))
        .unwrap();

    let err = OAuthSession::new(&credentials, token_path.path(), false)
        .get_session()
        .unwrap_err();
    match err {
        FetchError::Auth(msg) => assert!(msg.contains("expired or revoked"), "{msg}"),
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[test]
fn test_no_token_and_no_consent_is_auth_error() {
    let dir = TempDir::new().unwrap();
    let session = OAuthSession::new(
        dir.child("credentials.json").path(),
        dir.child("token.json").path(),
        false,
    );
    let err = session.get_session().unwrap_err();
    assert!(matches!(err, FetchError::Auth(_)), "{err:?}");
    assert!(err.is_fatal());
}

#[test]
fn test_refresh_without_credentials_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let token_path = dir.child("token.json");
    TokenFile::new(token_path.path())
        .store(&token("stale", Some("r1"), Some(0)))
        .unwrap();

    let err = OAuthSession::new(dir.child("absent.json").path(), token_path.path(), true)
        .get_session()
        .unwrap_err();
    assert!(matches!(err, FetchError::Config(_)), "{err:?}");
}
