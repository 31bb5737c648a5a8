//! Gmail REST client over blocking `reqwest`.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use crate::auth::SessionHandle;
use crate::config::GmailConfig;
use crate::error::{FetchError, Result};
use crate::model::message::Message;

use super::api::{ErrorEnvelope, GmailMessage, ListMessagesResponse, MessagePartBody};
use super::convert::{decode_base64url, message_from_api};
use super::{IdPage, MailClient};

/// Authenticated Gmail API client for the `me` user.
#[derive(Debug, Clone)]
pub struct GmailClient {
    http: Client,
    base_url: String,
    session: SessionHandle,
}

impl GmailClient {
    /// Client for the public API endpoint.
    pub fn new(session: SessionHandle) -> Result<Self> {
        Self::from_config(&GmailConfig::default(), session)
    }

    /// Client using the endpoint and timeout from `config`.
    pub fn from_config(config: &GmailConfig, session: SessionHandle) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("gmail-attachments/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/gmail/v1/users/me/messages", self.base_url)
    }

    /// GET `url` with bearer auth and decode a JSON body.
    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)], what: &str) -> Result<T> {
        trace!(url, "GET");
        let response = self
            .http
            .get(url)
            .bearer_auth(self.session.access_token())
            .query(query)
            .send()?;
        let response = check_status(response, what)?;
        response
            .json::<T>()
            .map_err(|e| FetchError::Decode(format!("{what}: {e}")))
    }
}

/// Turn a non-success response into the matching error variant.
fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let envelope = response.json::<ErrorEnvelope>().unwrap_or_default();
    let detail = Some(envelope.error.message.as_str())
        .filter(|m| !m.is_empty())
        .or(status.canonical_reason())
        .unwrap_or("no details");
    let message = format!("{what}: {detail}");

    // Per-user quota errors arrive as 403 but clear up on their own.
    let rate_limited = envelope.error.status.as_deref() == Some("RESOURCE_EXHAUSTED")
        || detail.to_ascii_lowercase().contains("rate limit");
    if status.as_u16() == 403 && rate_limited {
        return Err(FetchError::Transient(message));
    }
    Err(FetchError::from_status(status.as_u16(), message))
}

impl MailClient for GmailClient {
    fn list_page(&self, query: &str, page_token: Option<&str>, page_size: usize) -> Result<IdPage> {
        let mut params = vec![("q", query.to_string()), ("maxResults", page_size.to_string())];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        let page: ListMessagesResponse =
            self.get_json(&self.messages_url(), &params, "list messages")?;
        debug!(
            returned = page.messages.len(),
            estimate = page.result_size_estimate.unwrap_or(0),
            "Listed messages"
        );
        Ok(IdPage {
            ids: page.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: page.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    fn fetch_message(&self, id: &str) -> Result<Message> {
        let url = format!("{}/{}", self.messages_url(), id);
        let msg: GmailMessage = self.get_json(
            &url,
            &[("format", "full".to_string())],
            &format!("message {id}"),
        )?;
        message_from_api(msg)
    }

    fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/{}/attachments/{}",
            self.messages_url(),
            message_id,
            attachment_id
        );
        let body: MessagePartBody =
            self.get_json(&url, &[], &format!("attachment of message {message_id}"))?;
        let data = body.data.ok_or_else(|| {
            FetchError::Decode(format!("attachment of message {message_id} has no data"))
        })?;
        decode_base64url(&data)
    }
}
