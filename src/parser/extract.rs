//! Flatten a message's part tree into attachments plus one logical body.
//!
//! Traversal is depth-first in tree order with an explicit stack, so
//! arbitrarily deep nesting cannot overflow the call stack.

use crate::model::part::{Attachment, AttachmentSource, Body, BodyKind, Part};

use super::header::decode_charset;

/// What a single node of the part tree contributes.
#[derive(Debug)]
pub enum PartKind {
    /// Named binary part.
    Attachment(Attachment),
    /// Inline textual body candidate.
    Body(Body),
    /// Containers, signatures, unknown types, or attachment-less parts
    /// whose payload was not embedded.
    Unrecognized,
}

/// Result of flattening a part tree.
#[derive(Debug, Default)]
pub struct Extracted {
    /// Attachments in tree order.
    pub attachments: Vec<Attachment>,
    /// First HTML body, else first plain-text body.
    pub body: Option<Body>,
}

/// Classify a single node without looking at its children.
pub fn classify(part: &Part) -> PartKind {
    if part.has_filename() {
        let source = match (&part.body.attachment_id, &part.body.data) {
            (Some(id), _) => AttachmentSource::Remote(id.clone()),
            (None, Some(data)) => AttachmentSource::Inline(data.clone()),
            (None, None) => AttachmentSource::Inline(Vec::new()),
        };
        return PartKind::Attachment(Attachment {
            filename: part.filename.clone().unwrap_or_default(),
            mime_type: part.mime_type.clone(),
            size: part.body.size,
            source,
        });
    }

    let kind = match part.mime_type.as_str() {
        "text/html" => BodyKind::Html,
        "text/plain" => BodyKind::Plain,
        _ => return PartKind::Unrecognized,
    };
    match &part.body.data {
        Some(data) => PartKind::Body(Body {
            kind,
            text: decode_charset(part.charset.as_deref(), data),
        }),
        None => PartKind::Unrecognized,
    }
}

/// Walk the tree rooted at `root` and collect attachments and the body.
///
/// An attachment node is not descended into (a forwarded message with a
/// filename is saved whole).
pub fn extract_parts(root: &Part) -> Extracted {
    let mut out = Extracted::default();
    let mut first_plain: Option<Body> = None;
    let mut stack: Vec<&Part> = vec![root];

    while let Some(part) = stack.pop() {
        match classify(part) {
            PartKind::Attachment(att) => {
                out.attachments.push(att);
                continue;
            }
            PartKind::Body(body) => match body.kind {
                BodyKind::Html if out.body.is_none() => out.body = Some(body),
                BodyKind::Plain if first_plain.is_none() => first_plain = Some(body),
                _ => {}
            },
            PartKind::Unrecognized => {}
        }
        // Reverse so the first child is popped first.
        stack.extend(part.children.iter().rev());
    }

    if out.body.is_none() {
        out.body = first_plain;
    }
    out
}
