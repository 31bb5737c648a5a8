//! Interactive consent via a loopback redirect.
//!
//! The user opens the authorization URL in a browser; Google redirects to
//! `http://127.0.0.1:<port>/?code=…&state=…`, which a one-shot local
//! listener captures. PKCE (S256) and a random `state` protect the flow.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use rand::Rng;
use reqwest::Url;
use tracing::debug;

use crate::error::{FetchError, Result};

use super::credentials::ClientSecrets;
use super::GMAIL_READONLY_SCOPE;

/// Per-attempt secrets of one consent flow.
#[derive(Debug, Clone)]
pub struct ConsentRequest {
    pub authorize_url: String,
    pub redirect_uri: String,
    pub state: String,
    pub pkce_verifier: String,
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a PKCE code verifier (43-128 character URL-safe string).
pub fn generate_pkce_verifier() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    base64_url_encode(&bytes)
}

/// Compute the S256 PKCE challenge for `verifier`.
pub fn pkce_challenge(verifier: &str) -> String {
    use sha2::Digest;
    base64_url_encode(&sha2::Sha256::digest(verifier.as_bytes()))
}

fn base64_url_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Build the authorization URL and remember the flow secrets.
pub fn prepare(secrets: &ClientSecrets, redirect_uri: &str) -> Result<ConsentRequest> {
    let state = generate_state();
    let pkce_verifier = generate_pkce_verifier();
    let challenge = pkce_challenge(&pkce_verifier);

    let url = Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", GMAIL_READONLY_SCOPE),
            ("state", state.as_str()),
            ("code_challenge", challenge.as_str()),
            ("code_challenge_method", "S256"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| FetchError::Config(format!("invalid auth_uri '{}': {e}", secrets.auth_uri)))?;

    Ok(ConsentRequest {
        authorize_url: url.to_string(),
        redirect_uri: redirect_uri.to_string(),
        state,
        pkce_verifier,
    })
}

/// Outcome of inspecting one HTTP request line on the loopback listener.
#[derive(Debug, PartialEq, Eq)]
pub enum Callback {
    /// Authorization code with a matching state.
    Code(String),
    /// Not the redirect (e.g. `/favicon.ico`); keep listening.
    Ignored,
}

/// Interpret a request line such as `GET /?code=abc&state=xyz HTTP/1.1`.
pub fn parse_callback(request_line: &str, expected_state: &str) -> Result<Callback> {
    let Some(target) = request_line.split_whitespace().nth(1) else {
        return Ok(Callback::Ignored);
    };
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| FetchError::Auth(format!("malformed redirect: {e}")))?;

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(FetchError::Auth(format!("consent denied: {value}")));
            }
            _ => {}
        }
    }

    match (code, state) {
        (Some(code), Some(state)) if state == expected_state => Ok(Callback::Code(code)),
        (Some(_), _) => Err(FetchError::Auth(
            "state parameter mismatch in redirect".into(),
        )),
        (None, _) => Ok(Callback::Ignored),
    }
}

/// Block until the browser redirect arrives and return the authorization code.
pub fn wait_for_code(listener: &TcpListener, expected_state: &str) -> Result<String> {
    for stream in listener.incoming() {
        let mut stream = stream.map_err(|e| FetchError::Auth(format!("loopback accept: {e}")))?;
        let line = read_request_line(&stream)?;
        debug!(request = line.trim(), "Loopback request");

        let outcome = parse_callback(&line, expected_state);
        let (status, text) = match &outcome {
            Ok(Callback::Code(_)) => ("200 OK", "Authorization complete. You can close this window."),
            Ok(Callback::Ignored) => ("404 Not Found", "Not found."),
            Err(_) => ("400 Bad Request", "Authorization failed. Check the terminal."),
        };
        let _ = write!(
            stream,
            "HTTP/1.1 {status}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{text}",
            text.len()
        );

        match outcome? {
            Callback::Code(code) => return Ok(code),
            Callback::Ignored => continue,
        }
    }
    Err(FetchError::Auth("loopback listener closed".into()))
}

/// Read the request line and drain the headers that follow it.
fn read_request_line(stream: &TcpStream) -> Result<String> {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .map_err(|e| FetchError::Auth(format!("loopback read: {e}")))?;

    let mut header = String::new();
    loop {
        header.clear();
        match reader.read_line(&mut header) {
            Ok(0) | Err(_) => break,
            Ok(_) if header.trim().is_empty() => break,
            Ok(_) => {}
        }
    }
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets::from_json(
            r#"{"installed":{"client_id":"cid","client_secret":"cs"}}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_state_and_verifier_shape() {
        let state = generate_state();
        assert_eq!(state.len(), 64);
        assert_ne!(state, generate_state());
        let verifier = generate_pkce_verifier();
        assert!((43..=128).contains(&verifier.len()));
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_prepare_builds_url() {
        let req = prepare(&secrets(), "http://127.0.0.1:5555").unwrap();
        let url = Url::parse(&req.authorize_url).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |k: &str| pairs.iter().find(|(key, _)| key == k).map(|(_, v)| v.clone());
        assert_eq!(get("client_id").as_deref(), Some("cid"));
        assert_eq!(get("scope").as_deref(), Some(GMAIL_READONLY_SCOPE));
        assert_eq!(get("state"), Some(req.state.clone()));
        assert_eq!(get("code_challenge_method").as_deref(), Some("S256"));
        assert_eq!(get("redirect_uri").as_deref(), Some("http://127.0.0.1:5555"));
    }

    #[test]
    fn test_parse_callback_code() {
        let got = parse_callback("GET /?state=abc&code=4%2F0Ax HTTP/1.1", "abc").unwrap();
        assert_eq!(got, Callback::Code("4/0Ax".into()));
    }

    #[test]
    fn test_parse_callback_state_mismatch() {
        assert!(matches!(
            parse_callback("GET /?state=evil&code=x HTTP/1.1", "abc"),
            Err(FetchError::Auth(_))
        ));
    }

    #[test]
    fn test_parse_callback_denied_and_ignored() {
        assert!(matches!(
            parse_callback("GET /?error=access_denied&state=abc HTTP/1.1", "abc"),
            Err(FetchError::Auth(_))
        ));
        assert_eq!(
            parse_callback("GET /favicon.ico HTTP/1.1", "abc").unwrap(),
            Callback::Ignored
        );
    }

    #[test]
    fn test_wait_for_code_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::thread::spawn(move || {
            let mut s = std::net::TcpStream::connect(addr).unwrap();
            s.write_all(b"GET /?code=the-code&state=st HTTP/1.1\r\nHost: x\r\n\r\n")
                .unwrap();
            let mut resp = String::new();
            std::io::Read::read_to_string(&mut s, &mut resp).unwrap();
            resp
        });
        assert_eq!(wait_for_code(&listener, "st").unwrap(), "the-code");
        let resp = client.join().unwrap();
        assert!(resp.starts_with("HTTP/1.1 200 OK"));
    }
}
