//! MIME part tree and the flattened attachment/body types.
//!
//! The tree mirrors the nesting reported by the mail API. Binary payloads
//! are either embedded (`data`) or must be fetched separately by
//! reference; the extractor and the mail client hide that distinction.

/// A node in a message's content tree.
#[derive(Debug, Clone, Default)]
pub struct Part {
    /// MIME type, lowercased (e.g. `"multipart/mixed"`, `"text/html"`).
    pub mime_type: String,

    /// Filename from the part headers. Empty names are stored as `None`.
    pub filename: Option<String>,

    /// `charset` parameter of the `Content-Type` header, if any.
    pub charset: Option<String>,

    /// Part body: embedded data or a reference to fetch it.
    pub body: PartBody,

    /// Nested parts (only multipart containers have children).
    pub children: Vec<Part>,
}

/// Body of a single part.
#[derive(Debug, Clone, Default)]
pub struct PartBody {
    /// Decoded size in bytes as reported by the backend.
    pub size: u64,

    /// Embedded, already decoded payload.
    pub data: Option<Vec<u8>>,

    /// Backend reference for payloads that were not embedded.
    pub attachment_id: Option<String>,
}

/// Where an attachment's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Bytes were embedded in the message payload.
    Inline(Vec<u8>),
    /// Bytes must be fetched with this backend reference.
    Remote(String),
}

/// A named binary part selected by the extractor.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// Original (unsanitized) filename.
    pub filename: String,

    /// MIME type (e.g. `"application/pdf"`).
    pub mime_type: String,

    /// Size in bytes as reported by the backend.
    pub size: u64,

    /// How to obtain the payload.
    pub source: AttachmentSource,
}

/// Kind of textual body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Html,
    Plain,
}

/// The single logical body chosen for a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub kind: BodyKind,
    pub text: String,
}

impl Part {
    /// Convenience constructor for a leaf part with embedded data.
    pub fn leaf(mime_type: &str, filename: Option<&str>, data: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_ascii_lowercase(),
            filename: filename.filter(|f| !f.is_empty()).map(String::from),
            charset: None,
            body: PartBody {
                size: data.len() as u64,
                data: Some(data.to_vec()),
                attachment_id: None,
            },
            children: Vec::new(),
        }
    }

    /// Convenience constructor for a multipart container.
    pub fn multipart(subtype: &str, children: Vec<Part>) -> Self {
        Self {
            mime_type: format!("multipart/{}", subtype.to_ascii_lowercase()),
            children,
            ..Self::default()
        }
    }

    /// `true` when the part carries a non-empty filename.
    pub fn has_filename(&self) -> bool {
        self.filename.as_deref().is_some_and(|f| !f.trim().is_empty())
    }
}
