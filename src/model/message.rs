//! A fetched mailbox message.

use chrono::{DateTime, Utc};

use super::part::Part;

/// One mailbox entry, owned for the duration of a single pipeline iteration.
///
/// Built by the mail client from the full API payload. Never cached
/// across runs.
#[derive(Debug, Clone)]
pub struct Message {
    /// Opaque identifier, unique per mailbox.
    pub id: String,

    /// Decoded `Subject:` header, if present.
    pub subject: Option<String>,

    /// Raw `From:` header value, if present.
    pub sender: Option<String>,

    /// Server-side receive time (`internalDate`), falling back to the
    /// `Date:` header. `None` when neither could be read.
    pub timestamp: Option<DateTime<Utc>>,

    /// Root of the MIME part tree.
    pub payload: Part,
}

impl Message {
    /// Subject for filtering purposes: an absent subject is the empty string.
    pub fn subject_or_empty(&self) -> &str {
        self.subject.as_deref().unwrap_or("")
    }
}
