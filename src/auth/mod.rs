//! Authenticated session supply for the mail client.
//!
//! The pipeline never touches credential or token files itself; it asks a
//! [`SessionProvider`] for a [`SessionHandle`] once at startup.

pub mod consent;
pub mod credentials;
pub mod oauth;
pub mod token;

use crate::error::Result;

/// Gmail read-only scope, the only one requested.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

/// A bearer credential accepted by the mail API.
#[derive(Clone)]
pub struct SessionHandle {
    access_token: String,
}

impl SessionHandle {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// Bearer token for the `Authorization` header.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Supplies a valid session, failing with [`crate::error::FetchError::Auth`].
pub trait SessionProvider {
    fn get_session(&self) -> Result<SessionHandle>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let handle = SessionHandle::new("ya29.secret");
        let shown = format!("{handle:?}");
        assert!(!shown.contains("ya29"));
        assert!(shown.contains("redacted"));
    }
}
