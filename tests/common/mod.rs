//! Shared fixtures: an in-memory mailbox implementing `MailClient`.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};

use gmail_attachments::error::{FetchError, Result};
use gmail_attachments::gmail::{IdPage, MailClient};
use gmail_attachments::model::message::Message;
use gmail_attachments::model::part::Part;

/// Mailbox served from memory, with scripted failures.
#[derive(Default)]
pub struct FakeMailbox {
    /// Listing order.
    pub ids: Vec<String>,
    pub messages: HashMap<String, Message>,
    /// Remote attachment payloads by attachment id.
    pub remote: HashMap<String, Vec<u8>>,
    /// Errors returned by `fetch_message` before it succeeds, per id.
    pub fetch_failures: RefCell<HashMap<String, Vec<FetchError>>>,
    /// Errors returned by `list_page` before it succeeds.
    pub list_failures: RefCell<Vec<FetchError>>,
    /// Page size of the fake backend.
    pub page_size: usize,
    pub list_calls: RefCell<usize>,
    pub fetch_calls: RefCell<Vec<String>>,
    pub download_calls: RefCell<Vec<String>>,
}

impl FakeMailbox {
    pub fn new() -> Self {
        Self {
            page_size: 2,
            ..Self::default()
        }
    }

    pub fn with(mut self, message: Message) -> Self {
        self.ids.push(message.id.clone());
        self.messages.insert(message.id.clone(), message);
        self
    }

    /// List an id that cannot be fetched.
    pub fn with_vanished(mut self, id: &str) -> Self {
        self.ids.push(id.to_string());
        self
    }

    pub fn with_remote(mut self, attachment_id: &str, bytes: &[u8]) -> Self {
        self.remote.insert(attachment_id.to_string(), bytes.to_vec());
        self
    }

    pub fn fail_fetch(self, id: &str, errors: Vec<FetchError>) -> Self {
        self.fetch_failures.borrow_mut().insert(id.to_string(), errors);
        self
    }

    pub fn fail_listing(self, errors: Vec<FetchError>) -> Self {
        *self.list_failures.borrow_mut() = errors;
        self
    }
}

impl MailClient for FakeMailbox {
    fn list_page(&self, _query: &str, page_token: Option<&str>, page_size: usize) -> Result<IdPage> {
        *self.list_calls.borrow_mut() += 1;
        {
            let mut failures = self.list_failures.borrow_mut();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }
        let start: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let size = page_size.min(self.page_size.max(1));
        let end = (start + size).min(self.ids.len());
        Ok(IdPage {
            ids: self.ids[start.min(end)..end].to_vec(),
            next_page_token: (end < self.ids.len()).then(|| end.to_string()),
        })
    }

    fn fetch_message(&self, id: &str) -> Result<Message> {
        self.fetch_calls.borrow_mut().push(id.to_string());
        {
            let mut failures = self.fetch_failures.borrow_mut();
            if let Some(errors) = failures.get_mut(id) {
                if !errors.is_empty() {
                    return Err(errors.remove(0));
                }
            }
        }
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("message {id}")))
    }

    fn download_attachment(&self, _message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        self.download_calls.borrow_mut().push(attachment_id.to_string());
        self.remote
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(format!("attachment {attachment_id}")))
    }
}

pub fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap()
}

pub fn message(id: &str, subject: Option<&str>, timestamp: Option<DateTime<Utc>>, parts: Vec<Part>) -> Message {
    Message {
        id: id.to_string(),
        subject: subject.map(String::from),
        sender: Some("Billing <billing@example.com>".to_string()),
        timestamp,
        payload: Part::multipart("mixed", parts),
    }
}

/// Leaf whose payload must be downloaded by reference.
pub fn remote_part(mime: &str, filename: &str, attachment_id: &str, size: u64) -> Part {
    let mut part = Part::leaf(mime, Some(filename), b"");
    part.body.data = None;
    part.body.size = size;
    part.body.attachment_id = Some(attachment_id.to_string());
    part
}

pub fn html_body(html: &str) -> Part {
    Part::leaf("text/html", None, html.as_bytes())
}

pub fn plain_body(text: &str) -> Part {
    Part::leaf("text/plain", None, text.as_bytes())
}
