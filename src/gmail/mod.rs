//! Mail client adapter: message search, full fetch, attachment fetch.
//!
//! [`MailClient`] is the seam between the pipeline and the backend.
//! [`GmailClient`] talks to the Gmail REST API; tests substitute an
//! in-memory implementation.

pub mod api;
pub mod client;
pub mod convert;
pub mod retry;

pub use client::GmailClient;
pub use retry::RetryPolicy;

use tracing::debug;

use crate::error::Result;
use crate::model::message::Message;
use crate::model::part::{Attachment, AttachmentSource};

/// Largest page the Gmail API will return.
pub const MAX_PAGE_SIZE: usize = 500;

/// One page of a message search.
#[derive(Debug, Clone, Default)]
pub struct IdPage {
    pub ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// Backend operations the pipeline needs.
pub trait MailClient {
    /// Fetch one page of message ids matching `query`.
    fn list_page(&self, query: &str, page_token: Option<&str>, page_size: usize) -> Result<IdPage>;

    /// Fetch a full message. Fails with `NotFound` if the id no longer
    /// resolves and `Transient` if the backend is temporarily unavailable.
    fn fetch_message(&self, id: &str) -> Result<Message>;

    /// Fetch a non-embedded attachment payload by its backend reference.
    fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>>;

    /// Attachment bytes, whether embedded in the message or stored remotely.
    fn fetch_attachment_bytes(&self, message_id: &str, attachment: &Attachment) -> Result<Vec<u8>> {
        match &attachment.source {
            AttachmentSource::Inline(bytes) => Ok(bytes.clone()),
            AttachmentSource::Remote(id) => self.download_attachment(message_id, id),
        }
    }
}

impl<C: MailClient + ?Sized> MailClient for &C {
    fn list_page(&self, query: &str, page_token: Option<&str>, page_size: usize) -> Result<IdPage> {
        (**self).list_page(query, page_token, page_size)
    }

    fn fetch_message(&self, id: &str) -> Result<Message> {
        (**self).fetch_message(id)
    }

    fn download_attachment(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        (**self).download_attachment(message_id, attachment_id)
    }
}

/// Lazy, finite, non-restartable sequence of candidate message ids.
///
/// Pages are requested on demand, each with the retry policy applied.
/// Iteration stops after `max` ids, when the backend has no further page,
/// or after the first error (which is yielded once).
pub struct CandidateIds<'a, C: MailClient + ?Sized> {
    client: &'a C,
    query: &'a str,
    retry: &'a RetryPolicy,
    remaining: usize,
    buffer: std::vec::IntoIter<String>,
    next_token: Option<String>,
    exhausted: bool,
}

/// Enumerate up to `max` message ids matching `query`.
pub fn list_candidate_ids<'a, C: MailClient + ?Sized>(
    client: &'a C,
    query: &'a str,
    max: usize,
    retry: &'a RetryPolicy,
) -> CandidateIds<'a, C> {
    CandidateIds {
        client,
        query,
        retry,
        remaining: max,
        buffer: Vec::new().into_iter(),
        next_token: None,
        exhausted: max == 0,
    }
}

impl<C: MailClient + ?Sized> CandidateIds<'_, C> {
    fn fetch_next_page(&mut self) -> Result<()> {
        let page_size = self.remaining.min(MAX_PAGE_SIZE);
        let token = self.next_token.take();
        let page = self.retry.run("list messages", || {
            self.client
                .list_page(self.query, token.as_deref(), page_size)
        })?;
        debug!(
            count = page.ids.len(),
            has_more = page.next_page_token.is_some(),
            "Fetched message id page"
        );
        self.next_token = page.next_page_token;
        if self.next_token.is_none() || page.ids.is_empty() {
            self.exhausted = true;
        }
        self.buffer = page.ids.into_iter();
        Ok(())
    }
}

impl<C: MailClient + ?Sized> Iterator for CandidateIds<'_, C> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == 0 {
                return None;
            }
            if let Some(id) = self.buffer.next() {
                self.remaining -= 1;
                return Some(Ok(id));
            }
            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_next_page() {
                self.exhausted = true;
                self.remaining = 0;
                return Some(Err(e));
            }
        }
    }
}
